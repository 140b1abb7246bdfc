use diesel::prelude::*;
use diesel::result::Error;
use diesel_async::{AsyncPgConnection, RunQueryDsl};

/// Where a character profile or an issue record comes from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VendorType {
    /// The publisher's own api.
    PublisherApi,
    /// The fan-curated wiki that tags main and alternate continuities.
    FanWiki,
}

impl VendorType {
    pub const PUBLISHER_API_ID: i16 = 1;
    pub const FAN_WIKI_ID: i16 = 2;

    pub fn id(self) -> i16 {
        match self {
            VendorType::PublisherApi => VendorType::PUBLISHER_API_ID,
            VendorType::FanWiki => VendorType::FAN_WIKI_ID,
        }
    }
}

/// A character profile url, as the classifier needs it.
#[derive(Debug, Queryable)]
pub struct CharacterSource {
    pub id: i32,
    pub url: String,
    pub is_main: bool,
}

impl CharacterSource {
    /// Record a newly discovered profile url for a character.
    ///
    /// A url already known for the character is left as it is, so
    /// repeated imports do not flip tags set by the normalizer.
    pub async fn register(
        character_id: i32,
        url: &str,
        vendor: VendorType,
        is_main: bool,
        db: &mut AsyncPgConnection,
    ) -> Result<usize, Error> {
        use crate::schema::character_sources::dsl as s;
        diesel::insert_into(s::character_sources)
            .values((
                s::character_id.eq(character_id),
                s::url.eq(url),
                s::vendor_type.eq(vendor.id()),
                s::is_main.eq(is_main),
                s::is_disabled.eq(false),
            ))
            .on_conflict((s::character_id, s::url))
            .do_nothing()
            .execute(db)
            .await
    }
}
