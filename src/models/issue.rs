use super::{Character, VendorType};
use crate::vendor::ParsedIssue;
use chrono::Datelike;
use diesel::prelude::*;
use diesel::result::Error;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use std::fmt;

/// The publication format of an issue.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Format {
    Other,
    Standard,
    TradePaperback,
    Manga,
    OneShot,
    Web,
    Digital,
    StandardReprint,
    TpbReprint,
}

impl Format {
    pub fn from_id(id: i16) -> Format {
        match id {
            1 => Format::Standard,
            2 => Format::TradePaperback,
            3 => Format::Manga,
            4 => Format::OneShot,
            5 => Format::Web,
            6 => Format::Digital,
            7 => Format::StandardReprint,
            8 => Format::TpbReprint,
            _ => Format::Other,
        }
    }

    pub fn id(self) -> i16 {
        match self {
            Format::Other => 0,
            Format::Standard => 1,
            Format::TradePaperback => 2,
            Format::Manga => 3,
            Format::OneShot => 4,
            Format::Web => 5,
            Format::Digital => 6,
            Format::StandardReprint => 7,
            Format::TpbReprint => 8,
        }
    }

    /// Only first-run story formats count toward appearance totals.
    /// Collections and reprints would count the same story twice.
    pub fn counts_as_appearance(self) -> bool {
        matches!(
            self,
            Format::Standard | Format::OneShot | Format::Web | Format::Digital
        )
    }
}

/// A canonical comic issue, keyed by (vendor type, vendor id).
///
/// Created once by whichever import run first sees the vendor id and
/// shared by every character appearing in it.
#[derive(Debug, Queryable)]
pub struct Issue {
    pub id: i32,
    pub vendor_type: i16,
    pub vendor_id: String,
    pub series: String,
    pub number_str: String,
    pub publisher: i16,
    pub publication_date: chrono::NaiveDate,
    pub sale_date: chrono::NaiveDate,
    pub format: i16,
    pub is_variant: bool,
    pub is_reprint: bool,
    pub month_uncertain: bool,
}

impl Issue {
    pub fn format(&self) -> Format {
        Format::from_id(self.format)
    }

    /// Whether this issue counts toward appearance totals at all.
    ///
    /// Variants and reprints are the same story again, and a sale year
    /// of 1 or less is the vendor's way of saying "date unknown".
    pub fn counts_as_appearance(&self) -> bool {
        !self.is_variant
            && !self.is_reprint
            && self.format().counts_as_appearance()
            && self.sale_date.year() > 1
    }

    /// Whether this issue counts as an appearance of the given character.
    pub fn counts_for(&self, character: &Character) -> bool {
        self.counts_as_appearance() && self.publisher == character.publisher
    }

    /// The already-known issues among a set of classified vendor ids.
    pub async fn by_vendor_ids(
        vendor: VendorType,
        vendor_ids: &[String],
        db: &mut AsyncPgConnection,
    ) -> Result<Vec<Issue>, Error> {
        use crate::schema::issues::dsl as i;
        i::issues
            .filter(i::vendor_type.eq(vendor.id()))
            .filter(i::vendor_id.eq_any(vendor_ids))
            .load(db)
            .await
    }

    /// Store a fetched issue, or fetch the stored row if some earlier
    /// run got to this vendor id first.
    pub async fn get_or_create(
        parsed: &ParsedIssue,
        vendor: VendorType,
        db: &mut AsyncPgConnection,
    ) -> Result<Issue, Error> {
        use crate::schema::issues::dsl as i;
        if let Some(issue) = diesel::insert_into(i::issues)
            .values((
                i::vendor_type.eq(vendor.id()),
                i::vendor_id.eq(&parsed.vendor_id),
                i::series.eq(&parsed.series),
                i::number_str.eq(&parsed.number_str),
                i::publisher.eq(parsed.publisher),
                i::publication_date.eq(parsed.publication_date),
                i::sale_date.eq(parsed.sale_date),
                i::format.eq(parsed.format.id()),
                i::is_variant.eq(parsed.is_variant),
                i::is_reprint.eq(parsed.is_reprint),
                i::month_uncertain.eq(parsed.month_uncertain),
            ))
            .on_conflict((i::vendor_type, i::vendor_id))
            .do_nothing()
            .get_result(db)
            .await
            .optional()?
        {
            Ok(issue)
        } else {
            i::issues
                .filter(i::vendor_type.eq(vendor.id()))
                .filter(i::vendor_id.eq(&parsed.vendor_id))
                .first(db)
                .await
        }
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, out: &mut fmt::Formatter) -> fmt::Result {
        write!(out, "{} #{}", self.series, self.number_str)?;
        if self.sale_date.year() > 1 {
            if self.month_uncertain {
                write!(out, " ({}?)", self.sale_date.year())
            } else {
                write!(out, " ({}-{:02})", self.sale_date.year(), self.sale_date.month())
            }
        } else if self.publication_date.year() > 1 {
            write!(out, " (pub {})", self.publication_date.year())
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Publisher;
    use chrono::NaiveDate;

    fn issue(format: Format) -> Issue {
        Issue {
            id: 1,
            vendor_type: VendorType::FAN_WIKI_ID,
            vendor_id: "4711".into(),
            series: "Amazing Adventures".into(),
            number_str: "12".into(),
            publisher: Publisher::MARVEL_ID,
            publication_date: NaiveDate::from_ymd_opt(1979, 5, 1).unwrap(),
            sale_date: NaiveDate::from_ymd_opt(1979, 2, 13).unwrap(),
            format: format.id(),
            is_variant: false,
            is_reprint: false,
            month_uncertain: false,
        }
    }

    fn marvel_character() -> Character {
        Character {
            id: 1,
            name: "Test".into(),
            slug: "test".into(),
            publisher: Publisher::MARVEL_ID,
            disabled: false,
        }
    }

    #[test]
    fn standard_issue_counts() {
        assert!(issue(Format::Standard).counts_for(&marvel_character()));
        assert!(issue(Format::Digital).counts_for(&marvel_character()));
    }

    #[test]
    fn variant_never_counts() {
        let mut i = issue(Format::Standard);
        i.is_variant = true;
        assert!(!i.counts_as_appearance());
    }

    #[test]
    fn reprint_never_counts() {
        let mut i = issue(Format::Standard);
        i.is_reprint = true;
        assert!(!i.counts_as_appearance());
    }

    #[test]
    fn collected_formats_dont_count() {
        assert!(!issue(Format::TradePaperback).counts_as_appearance());
        assert!(!issue(Format::TpbReprint).counts_as_appearance());
        assert!(!issue(Format::Other).counts_as_appearance());
    }

    #[test]
    fn sentinel_sale_date_doesnt_count() {
        let mut i = issue(Format::Standard);
        i.sale_date = NaiveDate::from_ymd_opt(1, 1, 1).unwrap();
        assert!(!i.counts_as_appearance());
    }

    #[test]
    fn publisher_must_match() {
        let mut other = marvel_character();
        other.publisher = Publisher::DC_ID;
        assert!(!issue(Format::Standard).counts_for(&other));
    }

    #[test]
    fn display_shows_sale_month_or_year() {
        assert_eq!(issue(Format::Standard).to_string(), "Amazing Adventures #12 (1979-02)");
        let mut i = issue(Format::Standard);
        i.month_uncertain = true;
        assert_eq!(i.to_string(), "Amazing Adventures #12 (1979?)");
        i.sale_date = NaiveDate::from_ymd_opt(1, 1, 1).unwrap();
        i.month_uncertain = false;
        assert_eq!(i.to_string(), "Amazing Adventures #12 (pub 1979)");
    }

    #[test]
    fn format_ids_round_trip() {
        for format in [
            Format::Other,
            Format::Standard,
            Format::TradePaperback,
            Format::Manga,
            Format::OneShot,
            Format::Web,
            Format::Digital,
            Format::StandardReprint,
            Format::TpbReprint,
        ] {
            assert_eq!(Format::from_id(format.id()), format);
        }
    }
}
