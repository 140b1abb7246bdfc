//! The character issue import pipeline.
//!
//! One run imports a batch of characters strictly in sequence; the wiki
//! is rate-sensitive and concurrent character imports have triggered
//! soft-bans before. Concurrency lives inside a character instead, in
//! the bounded issue fetcher.

mod classify;
mod fetch;
mod retry;
pub mod sync;

use crate::cache::{AppearanceCache, CacheOpt};
use crate::dbopt::DbOpt;
use crate::models::{
    AppearanceType, Character, CharacterIssue, CharacterSource, Issue, SyncLog,
    SyncType, VendorType,
};
use crate::vendor::{FanWikiClient, SourceClient};
use anyhow::{Result, bail};
use diesel_async::AsyncPgConnection;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal::unix::{SignalKind, signal};
use tracing::{debug, error, info, warn};

/// Import character issues and appearances from fan wiki sources.
#[derive(clap::Parser)]
pub struct Args {
    #[clap(flatten)]
    db: DbOpt,

    #[clap(flatten)]
    cache: CacheOpt,

    /// Remove the characters' existing appearance links first, so the
    /// run rebuilds them from scratch.
    #[clap(long)]
    reset: bool,

    /// Concurrent issue fetches within one character.
    #[clap(long, default_value_t = fetch::DEFAULT_WORKERS)]
    workers: usize,

    /// Seconds to wait before retrying a connection error.
    #[clap(long, default_value_t = 5)]
    retry_delay: u64,

    /// Character slugs to import (default: all enabled characters).
    slugs: Vec<String>,
}

impl Args {
    pub async fn run(self) -> Result<()> {
        let mut db = self.db.get_db().await?;
        let cache = self.cache.get_cache().await?;
        let characters = if self.slugs.is_empty() {
            Character::all_enabled(&mut db).await?
        } else {
            Character::by_slugs(&self.slugs, true, &mut db).await?
        };
        if characters.is_empty() {
            bail!("No matching characters to import");
        }

        // All logs are created pending up front; if one can't be
        // created there would be no trail to mark failed later, so
        // that aborts the run before any fetching starts.
        let mut logs = Vec::with_capacity(characters.len());
        for character in &characters {
            logs.push(
                SyncLog::create(character.id, SyncType::YearlyAppearances, &mut db)
                    .await?,
            );
        }
        spawn_interrupt_guard(self.db.clone(), logs.iter().map(|l| l.id).collect());

        let importer = CharacterIssueImporter {
            client: Arc::new(FanWikiClient::new()),
            workers: self.workers,
            retry_delay: Duration::from_secs(self.retry_delay),
            reset: self.reset,
        };
        for (character, mut log) in characters.into_iter().zip(logs) {
            log.start(&mut db).await;
            match importer.import_issues(&character, &mut db, &cache).await {
                Ok(total) => {
                    info!("Imported {character}: {total} appearances synced");
                    log.succeed(total, &mut db).await;
                }
                Err(err) => {
                    // One bad character never aborts its siblings.
                    warn!("Import of {character} failed: {err:#}");
                    log.fail("", &mut db).await;
                }
            }
        }
        Ok(())
    }
}

/// On sigint or sigterm, fail every log of the batch that hasn't
/// reached a terminal state and exit.
///
/// The guard opens its own database connection: the run's connection is
/// busy with the import it was interrupted in.
fn spawn_interrupt_guard(db: DbOpt, log_ids: Vec<i32>) {
    tokio::spawn(async move {
        let (Ok(mut int), Ok(mut term)) = (
            signal(SignalKind::interrupt()),
            signal(SignalKind::terminate()),
        ) else {
            error!("Failed to install signal handlers, interrupt guard disabled");
            return;
        };
        tokio::select! {
            _ = int.recv() => (),
            _ = term.recv() => (),
        }
        warn!("Interrupted, failing unfinished sync logs");
        match db.get_db().await {
            Ok(mut db) => {
                match SyncLog::fail_unfinished(&log_ids, "interrupted by signal", &mut db)
                    .await
                {
                    Ok(n) => warn!("Marked {n} sync logs failed"),
                    Err(err) => error!("Failed to mark sync logs failed: {err}"),
                }
            }
            Err(err) => error!("No db connection for interrupt cleanup: {err}"),
        }
        std::process::exit(1);
    });
}

struct CharacterIssueImporter {
    client: Arc<dyn SourceClient>,
    workers: usize,
    retry_delay: Duration,
    reset: bool,
}

impl CharacterIssueImporter {
    /// One import pass for one character.
    ///
    /// Returns the total appearance count synced to the cache, which
    /// the batch driver stores on the sync log.
    async fn import_issues(
        &self,
        character: &Character,
        db: &mut AsyncPgConnection,
        cache: &AppearanceCache,
    ) -> Result<i64> {
        if character.disabled {
            bail!("Character {} is disabled", character.slug);
        }
        if self.reset {
            let n = CharacterIssue::clear_for(character.id, db).await?;
            info!("Reset {character}: removed {n} appearance links");
        }

        let sources = character.sources(VendorType::FanWiki, db).await?;
        let info =
            classify::classify(self.client.as_ref(), &sources, self.retry_delay)
                .await?;
        for url in &info.other_identity_links {
            CharacterSource::register(character.id, url, VendorType::FanWiki, false, db)
                .await?;
        }

        // Issues some earlier run already fetched (possibly for another
        // character) only need their links backfilled.
        let all_ids: Vec<String> = info.vendor_ids.keys().cloned().collect();
        let known = Issue::by_vendor_ids(VendorType::FanWiki, &all_ids, db).await?;
        for (issue, kind) in backfill_links(character, &info, &known) {
            if let Some(link) = CharacterIssue::link(character.id, issue.id, kind, db).await? {
                debug!("Backfilled {issue} (issue {}) as {}", link.issue_id, link.kind());
            }
        }
        let missing = unfetched_urls(&info, &known);
        info!(
            "{}: {} issues known, fetching {}",
            character.slug,
            known.len(),
            missing.len(),
        );

        let fetched = fetch::fetch_all(
            Arc::clone(&self.client),
            missing,
            self.workers,
            self.retry_delay,
        )
        .await;
        // Issues are stored one at a time as they come in, not in one
        // transaction: an interrupted run must keep what it already
        // fetched, re-fetching thousands of pages is expensive.
        for parsed in fetched {
            if parsed.is_blank() {
                debug!("Skipping a failed issue fetch for {}", character.slug);
                continue;
            }
            let issue = Issue::get_or_create(&parsed, VendorType::FanWiki, db).await?;
            if issue.counts_for(character) {
                if let Some(link) = CharacterIssue::link(
                    character.id,
                    issue.id,
                    info.appearance_type(&issue.vendor_id),
                    db,
                )
                .await?
                {
                    debug!("Stored {issue} (issue {}) as {}", link.issue_id, link.kind());
                }
            }
        }

        sync::sync_appearances(db, cache, character).await
    }
}

/// The links to create for already-stored issues: everything that
/// counts as an appearance for this character, with the appearance type
/// its profiles gave it.
fn backfill_links<'a>(
    character: &Character,
    info: &classify::VendorInfo,
    known: &'a [Issue],
) -> Vec<(&'a Issue, AppearanceType)> {
    known
        .iter()
        .filter(|issue| issue.counts_for(character))
        .map(|issue| (issue, info.appearance_type(&issue.vendor_id)))
        .collect()
}

/// The links that still have to be fetched: classified vendor ids with
/// no stored issue at all. Known non-counting issues are deliberately
/// absent from both lists; re-fetching a variant won't change its
/// flags.
fn unfetched_urls(info: &classify::VendorInfo, known: &[Issue]) -> Vec<String> {
    let known_ids: HashSet<&str> =
        known.iter().map(|issue| issue.vendor_id.as_str()).collect();
    info.vendor_ids
        .iter()
        .filter(|(id, _)| !known_ids.contains(id.as_str()))
        .map(|(_, url)| url.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Format, Publisher};
    use chrono::NaiveDate;
    use std::collections::HashMap;

    fn character() -> Character {
        Character {
            id: 1,
            name: "Night Owl".into(),
            slug: "night-owl".into(),
            publisher: Publisher::MARVEL_ID,
            disabled: false,
        }
    }

    fn stored(id: i32, vendor_id: &str, format: Format, is_variant: bool) -> Issue {
        Issue {
            id,
            vendor_type: VendorType::FAN_WIKI_ID,
            vendor_id: vendor_id.into(),
            series: "Night Owl".into(),
            number_str: id.to_string(),
            publisher: Publisher::MARVEL_ID,
            publication_date: NaiveDate::from_ymd_opt(1984, 3, 1).unwrap(),
            sale_date: NaiveDate::from_ymd_opt(1984, 1, 10).unwrap(),
            format: format.id(),
            is_variant,
            is_reprint: false,
            month_uncertain: false,
        }
    }

    fn profile_info(ids: &[&str]) -> classify::VendorInfo {
        classify::VendorInfo {
            vendor_ids: ids
                .iter()
                .map(|id| (id.to_string(), format!("/issue/night-owl-{id}")))
                .collect(),
            main_sources: ids.iter().map(|id| id.to_string()).collect(),
            alt_sources: Default::default(),
            other_identity_links: Vec::new(),
        }
    }

    #[test]
    fn stored_counting_issues_are_backfilled_not_refetched() {
        let character = character();
        let info = profile_info(&["101", "102", "103", "104"]);
        // 101 was stored by an earlier run and counts; 102 is a stored
        // variant; 103 and 104 were never fetched.
        let known = vec![
            stored(1, "101", Format::Standard, false),
            stored(2, "102", Format::Standard, true),
        ];

        let backfills = backfill_links(&character, &info, &known);
        assert_eq!(backfills.len(), 1);
        assert_eq!(backfills[0].0.vendor_id, "101");
        assert_eq!(backfills[0].1, AppearanceType::MAIN);

        let mut missing = unfetched_urls(&info, &known);
        missing.sort();
        assert_eq!(
            missing,
            vec!["/issue/night-owl-103", "/issue/night-owl-104"],
        );
    }

    #[test]
    fn wrong_publisher_is_not_backfilled() {
        let character = character();
        let info = profile_info(&["201"]);
        let mut crossover = stored(3, "201", Format::Standard, false);
        crossover.publisher = Publisher::DC_ID;
        let known = [crossover];
        // Stored, so not refetched, but it never becomes a link either.
        assert!(backfill_links(&character, &info, &known).is_empty());
        assert!(unfetched_urls(&info, &known).is_empty());
    }

    #[test]
    fn both_continuities_keep_both_bits() {
        let character = character();
        let mut info = profile_info(&["301"]);
        info.alt_sources.insert("301".into());
        let known = vec![stored(4, "301", Format::OneShot, false)];
        let backfills = backfill_links(&character, &info, &known);
        assert_eq!(backfills[0].1, AppearanceType::MAIN | AppearanceType::ALTERNATE);
    }

    #[test]
    fn empty_profiles_plan_nothing() {
        let info = classify::VendorInfo {
            vendor_ids: HashMap::new(),
            main_sources: Default::default(),
            alt_sources: Default::default(),
            other_identity_links: Vec::new(),
        };
        assert!(backfill_links(&character(), &info, &[]).is_empty());
        assert!(unfetched_urls(&info, &[]).is_empty());
    }
}
