use super::{CharacterSource, VendorType};
use diesel::prelude::*;
use diesel::result::Error;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use std::fmt;

/// The publishers whose characters are indexed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Publisher {
    Marvel,
    Dc,
}

impl Publisher {
    pub const MARVEL_ID: i16 = 1;
    pub const DC_ID: i16 = 2;

    pub fn from_id(id: i16) -> Option<Publisher> {
        match id {
            Publisher::MARVEL_ID => Some(Publisher::Marvel),
            Publisher::DC_ID => Some(Publisher::Dc),
            _ => None,
        }
    }

    pub fn id(self) -> i16 {
        match self {
            Publisher::Marvel => Publisher::MARVEL_ID,
            Publisher::Dc => Publisher::DC_ID,
        }
    }
}

impl fmt::Display for Publisher {
    fn fmt(&self, out: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Publisher::Marvel => write!(out, "Marvel"),
            Publisher::Dc => write!(out, "DC"),
        }
    }
}

#[derive(Debug, Queryable)]
pub struct Character {
    pub id: i32,
    pub name: String,
    pub slug: String,
    pub publisher: i16,
    pub disabled: bool,
}

impl Character {
    pub async fn by_slugs(
        slugs: &[String],
        include_disabled: bool,
        db: &mut AsyncPgConnection,
    ) -> Result<Vec<Character>, Error> {
        use crate::schema::characters::dsl as c;
        let query = c::characters.filter(c::slug.eq_any(slugs)).into_boxed();
        let query = if include_disabled {
            query
        } else {
            query.filter(c::disabled.eq(false))
        };
        query.order(c::slug).load(db).await
    }

    pub async fn all_enabled(
        db: &mut AsyncPgConnection,
    ) -> Result<Vec<Character>, Error> {
        use crate::schema::characters::dsl as c;
        c::characters
            .filter(c::disabled.eq(false))
            .order(c::slug)
            .load(db)
            .await
    }

    /// The enabled source urls of one vendor for this character.
    pub async fn sources(
        &self,
        vendor: VendorType,
        db: &mut AsyncPgConnection,
    ) -> Result<Vec<CharacterSource>, Error> {
        use crate::schema::character_sources::dsl as s;
        s::character_sources
            .filter(s::character_id.eq(self.id))
            .filter(s::vendor_type.eq(vendor.id()))
            .filter(s::is_disabled.eq(false))
            .order(s::id)
            .select((s::id, s::url, s::is_main))
            .load(db)
            .await
    }
}

impl fmt::Display for Character {
    fn fmt(&self, out: &mut fmt::Formatter) -> fmt::Result {
        match Publisher::from_id(self.publisher) {
            Some(p) => write!(out, "{} ({}, {})", self.name, self.slug, p),
            None => write!(out, "{} ({})", self.name, self.slug),
        }
    }
}
