use crate::dbopt::DbOpt;
use crate::models::{Character, Publisher, SyncLog, SyncStatus};
use crate::schema::character_issues::dsl as ci;
use anyhow::Result;
use diesel::dsl::count_star;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use std::collections::HashMap;

/// List known characters (in compact format).
#[derive(clap::Parser)]
pub struct Args {
    #[clap(flatten)]
    db: DbOpt,
}

impl Args {
    pub async fn run(self) -> Result<()> {
        use crate::schema::characters::dsl as c;
        let mut db = self.db.get_db().await?;
        let characters: Vec<Character> = c::characters
            .order((c::publisher, c::slug))
            .load(&mut db)
            .await?;
        let counts: HashMap<i32, i64> = ci::character_issues
            .group_by(ci::character_id)
            .select((ci::character_id, count_star()))
            .load::<(i32, i64)>(&mut db)
            .await?
            .into_iter()
            .collect();

        let mut publisher = 0;
        for character in characters {
            if character.publisher != publisher {
                publisher = character.publisher;
                match Publisher::from_id(publisher) {
                    Some(p) => println!("# {p}"),
                    None => println!("# publisher {publisher}"),
                }
            }
            let status = SyncLog::latest_for(character.id, &mut db)
                .await?
                .and_then(|log| SyncStatus::from_id(log.status))
                .map(SyncStatus::name)
                .unwrap_or("never synced");
            println!(
                "- {:30} {:5} issues, {}{}",
                character.slug,
                counts.get(&character.id).copied().unwrap_or(0),
                status,
                if character.disabled { " (disabled)" } else { "" },
            );
        }
        Ok(())
    }
}
