use super::retry::retry;
use crate::models::{AppearanceType, CharacterSource};
use crate::vendor::{SourceClient, VendorError, vendor_id_of};
use anyhow::{Result, ensure};
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tracing::{debug, warn};

/// Everything the wiki knows about where a character appears, keyed by
/// vendor id.
///
/// An id can legitimately be in both source sets: the classification is
/// per (character, issue), and the same issue can be linked from a main
/// profile and from an alternate-universe profile.
#[derive(Debug, Default)]
pub struct VendorInfo {
    /// Vendor id to the canonical issue link.
    pub vendor_ids: HashMap<String, String>,
    /// Ids seen on a main-tagged profile.
    pub main_sources: HashSet<String>,
    /// Ids seen on an alternate-tagged profile.
    pub alt_sources: HashSet<String>,
    /// Profile links of the character's other identities, for source
    /// registration.
    pub other_identity_links: Vec<String>,
}

impl VendorInfo {
    pub fn appearance_type(&self, vendor_id: &str) -> AppearanceType {
        let main = self.main_sources.contains(vendor_id);
        let alt = self.alt_sources.contains(vendor_id);
        match (main, alt) {
            (true, true) => AppearanceType::MAIN | AppearanceType::ALTERNATE,
            (true, false) => AppearanceType::MAIN,
            _ => AppearanceType::ALTERNATE,
        }
    }
}

/// Fetch every supplied profile page and classify the issue links on
/// them.
///
/// A page that fails permanently is logged and skipped rather than
/// aborting the whole character, but being handed zero sources is a
/// caller bug and an error.
pub async fn classify(
    client: &dyn SourceClient,
    sources: &[CharacterSource],
    retry_delay: Duration,
) -> Result<VendorInfo> {
    ensure!(!sources.is_empty(), "No sources to classify");
    let mut info = VendorInfo::default();
    let mut seen_identities = HashSet::new();
    for source in sources {
        let page = match retry(
            || client.fetch_character_page(&source.url),
            VendorError::is_transient,
            retry_delay,
        )
        .await
        {
            Ok(page) => page,
            Err(err) => {
                warn!("Skipping source {} ({}): {}", source.id, source.url, err);
                continue;
            }
        };
        for link in &page.issue_links {
            let Some(id) = vendor_id_of(link) else {
                debug!("Ignoring unrecognized issue link {link}");
                continue;
            };
            info.vendor_ids.insert(id.to_string(), link.clone());
            if source.is_main {
                info.main_sources.insert(id.to_string());
            } else {
                info.alt_sources.insert(id.to_string());
            }
        }
        for link in page.other_identity_links {
            if seen_identities.insert(link.clone()) {
                info.other_identity_links.push(link);
            }
        }
    }
    Ok(info)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vendor::CharacterPage;
    use crate::vendor::mock::MockSource;

    fn source(id: i32, url: &str, is_main: bool) -> CharacterSource {
        CharacterSource {
            id,
            url: url.to_string(),
            is_main,
        }
    }

    fn page(links: &[&str]) -> CharacterPage {
        CharacterPage {
            issue_links: links.iter().map(|s| s.to_string()).collect(),
            other_identity_links: vec![],
        }
    }

    #[tokio::test]
    async fn classifies_main_alt_and_both() {
        let client = MockSource::default()
            .with_page("/main", page(&["/comics/a-1", "/comics/b-2"]))
            .with_page("/alt", page(&["/comics/b-2", "/comics/c-3"]));
        let sources = [source(1, "/main", true), source(2, "/alt", false)];
        let info = classify(&client, &sources, Duration::from_millis(1))
            .await
            .unwrap();

        assert_eq!(info.vendor_ids.len(), 3);
        assert_eq!(info.appearance_type("1"), AppearanceType::MAIN);
        assert_eq!(
            info.appearance_type("2"),
            AppearanceType::MAIN | AppearanceType::ALTERNATE,
        );
        assert_eq!(info.appearance_type("3"), AppearanceType::ALTERNATE);
        // An id never seen at all defaults to alternate.
        assert_eq!(info.appearance_type("99"), AppearanceType::ALTERNATE);
    }

    #[tokio::test]
    async fn failed_source_is_skipped_not_fatal() {
        let client =
            MockSource::default().with_page("/main", page(&["/comics/a-1"]));
        let sources = [source(1, "/main", true), source(2, "/gone", false)];
        let info = classify(&client, &sources, Duration::from_millis(1))
            .await
            .unwrap();
        assert_eq!(info.vendor_ids.len(), 1);
        assert!(info.main_sources.contains("1"));
    }

    #[tokio::test]
    async fn zero_sources_is_an_error() {
        let client = MockSource::default();
        assert!(
            classify(&client, &[], Duration::from_millis(1))
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn other_identities_are_collected_once() {
        let mut p = page(&["/comics/a-1"]);
        p.other_identity_links = vec!["/chars/x-616".into(), "/chars/x-1610".into()];
        let mut p2 = page(&["/comics/b-2"]);
        p2.other_identity_links = vec!["/chars/x-616".into()];
        let client = MockSource::default()
            .with_page("/main", p)
            .with_page("/alt", p2);
        let sources = [source(1, "/main", true), source(2, "/alt", false)];
        let info = classify(&client, &sources, Duration::from_millis(1))
            .await
            .unwrap();
        assert_eq!(
            info.other_identity_links,
            vec!["/chars/x-616".to_string(), "/chars/x-1610".to_string()],
        );
    }
}
