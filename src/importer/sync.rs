use crate::cache::{AppearanceCache, CacheOpt, Category};
use crate::dbopt::DbOpt;
use crate::models::{AppearanceType, Character, SyncLog, SyncType};
use anyhow::{Result, bail};
use chrono::{Datelike, NaiveDate, Utc};
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use std::collections::BTreeMap;
use tracing::{info, warn};

/// Recompute cached per-year appearance counts, without importing.
#[derive(clap::Parser)]
pub struct Args {
    #[clap(flatten)]
    db: DbOpt,

    #[clap(flatten)]
    cache: CacheOpt,

    /// Character slugs to sync (default: all enabled characters).
    slugs: Vec<String>,
}

impl Args {
    pub async fn run(self) -> Result<()> {
        let mut db = self.db.get_db().await?;
        let cache = self.cache.get_cache().await?;
        let characters = if self.slugs.is_empty() {
            Character::all_enabled(&mut db).await?
        } else {
            Character::by_slugs(&self.slugs, false, &mut db).await?
        };
        if characters.is_empty() {
            bail!("No matching characters to sync");
        }

        // Same batch bookkeeping as a full import: all logs pending up
        // front, and a guard so a signal can't leave one in progress.
        let mut logs = Vec::with_capacity(characters.len());
        for character in &characters {
            logs.push(
                SyncLog::create(character.id, SyncType::YearlyAppearances, &mut db)
                    .await?,
            );
        }
        super::spawn_interrupt_guard(self.db.clone(), logs.iter().map(|l| l.id).collect());

        for (character, mut log) in characters.into_iter().zip(logs) {
            log.start(&mut db).await;
            match sync_appearances(&mut db, &cache, &character).await {
                Ok(total) => {
                    info!("Synced {total} appearances for {character}");
                    log.succeed(total, &mut db).await;
                }
                Err(err) => {
                    warn!("Appearance sync for {character} failed: {err:#}");
                    log.fail("", &mut db).await;
                }
            }
        }
        Ok(())
    }
}

/// Roll a character's appearance counts from the database into the
/// cache. Returns the combined total, for the sync log.
///
/// The whole view is recomputed from the link rows each time; there is
/// no delta tracking, the zadd upsert makes rewriting cheap and
/// idempotent.
pub async fn sync_appearances(
    db: &mut AsyncPgConnection,
    cache: &AppearanceCache,
    character: &Character,
) -> Result<i64> {
    use crate::schema::character_issues::dsl as ci;
    use crate::schema::issues::dsl as i;
    let rows: Vec<(i16, NaiveDate)> = ci::character_issues
        .inner_join(i::issues)
        .filter(ci::character_id.eq(character.id))
        .select((ci::appearance_type, i::sale_date))
        .load(db)
        .await?;

    let mut main = BTreeMap::new();
    let mut alt = BTreeMap::new();
    let mut combined = BTreeMap::new();
    for (bits, sale_date) in rows {
        let year = sale_date.year();
        if year <= 1 {
            continue;
        }
        let kind = AppearanceType::from_bits(bits);
        if kind.has_any(AppearanceType::MAIN) {
            *main.entry(year).or_insert(0) += 1;
        }
        if kind.has_any(AppearanceType::ALTERNATE) {
            *alt.entry(year).or_insert(0) += 1;
        }
        *combined.entry(year).or_insert(0) += 1;
    }

    let this_year = Utc::now().year();
    // Every series spans from the character's first appearance in any
    // continuity, so the main and alternate years line up. A category
    // with nothing at all is skipped rather than clobbering a
    // previously synced series with an artificial run of zeroes.
    if let Some(&first) = combined.keys().next() {
        if !main.is_empty() {
            cache
                .put_yearly(
                    &character.slug,
                    Category::Main,
                    &fill_years(&main, first, this_year),
                )
                .await?;
        }
        if !alt.is_empty() {
            cache
                .put_yearly(
                    &character.slug,
                    Category::Alternate,
                    &fill_years(&alt, first, this_year),
                )
                .await?;
        }
    }
    // Combined is never cached, it only provides the audit total.
    Ok(combined.values().sum())
}

/// Stretch a sparse year-count map into a dense series from `first`
/// through `last`, filling the gap years with zero.
fn fill_years(counts: &BTreeMap<i32, i64>, first: i32, last: i32) -> Vec<(i32, i64)> {
    (first..=last.max(first))
        .map(|year| (year, counts.get(&year).copied().unwrap_or(0)))
        .collect()
}
