use diesel::prelude::*;
use diesel::result::Error;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use std::fmt;
use std::ops::BitOr;

/// Which continuity an issue appearance belongs to.
///
/// This is a bitmask, not a closed enum: the same issue can be linked
/// from a main profile and an alternate-universe profile, in which
/// case both bits are set on the one link row.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AppearanceType(i16);

impl AppearanceType {
    pub const MAIN: AppearanceType = AppearanceType(1);
    pub const ALTERNATE: AppearanceType = AppearanceType(2);

    pub fn from_bits(bits: i16) -> AppearanceType {
        AppearanceType(bits & (Self::MAIN.0 | Self::ALTERNATE.0))
    }

    pub fn bits(self) -> i16 {
        self.0
    }

    pub fn has_any(self, other: AppearanceType) -> bool {
        self.0 & other.0 != 0
    }

    pub fn has_all(self, other: AppearanceType) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for AppearanceType {
    type Output = AppearanceType;
    fn bitor(self, rhs: AppearanceType) -> AppearanceType {
        AppearanceType(self.0 | rhs.0)
    }
}

impl fmt::Display for AppearanceType {
    fn fmt(&self, out: &mut fmt::Formatter) -> fmt::Result {
        match (self.has_any(Self::MAIN), self.has_any(Self::ALTERNATE)) {
            (true, true) => write!(out, "main|alternate"),
            (true, false) => write!(out, "main"),
            (false, true) => write!(out, "alternate"),
            (false, false) => write!(out, "none"),
        }
    }
}

/// The join between a character and an issue it appears in.
#[derive(Debug, Queryable)]
pub struct CharacterIssue {
    pub issue_id: i32,
    pub appearance_type: i16,
}

impl CharacterIssue {
    pub fn kind(&self) -> AppearanceType {
        AppearanceType::from_bits(self.appearance_type)
    }

    /// Link a character to an issue, once.
    ///
    /// The pair is unique, so a link created by an earlier run is left
    /// untouched and re-imports stay idempotent. Returns the created
    /// link, or `None` if the pair already existed.
    pub async fn link(
        character_id: i32,
        issue_id: i32,
        kind: AppearanceType,
        db: &mut AsyncPgConnection,
    ) -> Result<Option<CharacterIssue>, Error> {
        use crate::schema::character_issues::dsl as ci;
        diesel::insert_into(ci::character_issues)
            .values((
                ci::character_id.eq(character_id),
                ci::issue_id.eq(issue_id),
                ci::appearance_type.eq(kind.bits()),
            ))
            .on_conflict((ci::character_id, ci::issue_id))
            .do_nothing()
            .returning((ci::issue_id, ci::appearance_type))
            .get_result(db)
            .await
            .optional()
    }

    /// Drop all appearance links for a character, for the reset flow.
    pub async fn clear_for(
        character_id: i32,
        db: &mut AsyncPgConnection,
    ) -> Result<usize, Error> {
        use crate::schema::character_issues::dsl as ci;
        diesel::delete(ci::character_issues.filter(ci::character_id.eq(character_id)))
            .execute(db)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::AppearanceType;

    #[test]
    fn single_bits() {
        assert!(AppearanceType::MAIN.has_any(AppearanceType::MAIN));
        assert!(!AppearanceType::MAIN.has_any(AppearanceType::ALTERNATE));
        assert!(AppearanceType::ALTERNATE.has_all(AppearanceType::ALTERNATE));
    }

    #[test]
    fn combined_bits() {
        let both = AppearanceType::MAIN | AppearanceType::ALTERNATE;
        assert!(both.has_any(AppearanceType::MAIN));
        assert!(both.has_any(AppearanceType::ALTERNATE));
        assert!(both.has_all(AppearanceType::MAIN | AppearanceType::ALTERNATE));
        assert!(!AppearanceType::MAIN.has_all(both));
        assert_eq!(both.bits(), 3);
    }

    #[test]
    fn from_bits_masks_junk() {
        assert_eq!(
            AppearanceType::from_bits(7),
            AppearanceType::MAIN | AppearanceType::ALTERNATE,
        );
    }

    #[test]
    fn display() {
        assert_eq!(AppearanceType::MAIN.to_string(), "main");
        assert_eq!(
            (AppearanceType::MAIN | AppearanceType::ALTERNATE).to_string(),
            "main|alternate",
        );
    }
}
