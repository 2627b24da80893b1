//! Calendar date utilities.

#[cfg(feature = "postgres")]
use std::error::Error as StdError;
use std::{fmt, str::FromStr};

use derive_more::{Display, Error, From, Into};
#[cfg(feature = "postgres")]
use postgres_types::{
    accepts, private::BytesMut, to_sql_checked, FromSql, IsNull, ToSql, Type,
};
use time::format_description::FormatItem;

/// Calendar date without a time component.
#[derive(Clone, Copy, Debug, Eq, From, Hash, Into, Ord, PartialEq, PartialOrd)]
pub struct Date(time::Date);

impl Date {
    /// Creates a new [`Date`] representing the current date (UTC).
    #[must_use]
    pub fn today() -> Self {
        Self(time::OffsetDateTime::now_utc().date())
    }

    /// Returns this [`Date`] shifted forward by the provided number of weeks.
    #[expect(clippy::missing_panics_doc, reason = "bounded by callers")]
    #[must_use]
    pub fn add_weeks(self, weeks: u32) -> Self {
        self.0
            .checked_add(time::Duration::weeks(i64::from(weeks)))
            .map(Self)
            .expect("`Date` overflow")
    }

    /// Returns this [`Date`] shifted forward by the provided number of
    /// calendar months.
    ///
    /// The day component is clamped to the length of the resulting month, so
    /// `2025-01-31` plus one month is `2025-02-28`.
    #[expect(clippy::missing_panics_doc, reason = "bounded by callers")]
    #[must_use]
    pub fn add_months(self, months: u32) -> Self {
        let zero_based = u32::from(u8::from(self.0.month())) - 1 + months;
        let year = self.0.year()
            + i32::try_from(zero_based / 12).expect("`Date` overflow");
        let month = time::Month::try_from(
            u8::try_from(zero_based % 12 + 1).expect("always fits"),
        )
        .expect("always in range");
        let day = self.0.day().min(time::util::days_in_year_month(year, month));
        Self(
            time::Date::from_calendar_date(year, month, day)
                .expect("`Date` overflow"),
        )
    }

    /// Returns this [`Date`] shifted forward by the provided number of
    /// calendar years.
    #[must_use]
    pub fn add_years(self, years: u32) -> Self {
        self.add_months(years * 12)
    }
}

/// `[year]-[month]-[day]` format description.
fn format() -> Vec<FormatItem<'static>> {
    time::format_description::parse("[year]-[month]-[day]")
        .expect("valid format description")
}

impl fmt::Display for Date {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(
            &self
                .0
                .format(&format())
                .unwrap_or_else(|e| panic!("cannot format `Date`: {e}")),
        )
    }
}

impl FromStr for Date {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        time::Date::parse(s, &format()).map(Self).map_err(ParseError)
    }
}

/// Error of parsing a [`Date`] from a string.
#[derive(Clone, Copy, Debug, Display, Error)]
#[display("invalid `Date`: {_0}")]
pub struct ParseError(time::error::Parse);

#[cfg(feature = "postgres")]
impl FromSql<'_> for Date {
    accepts!(DATE);

    fn from_sql(
        ty: &Type,
        raw: &[u8],
    ) -> Result<Self, Box<dyn StdError + Sync + Send>> {
        time::Date::from_sql(ty, raw).map(Self)
    }
}

#[cfg(feature = "postgres")]
impl ToSql for Date {
    accepts!(DATE);
    to_sql_checked!();

    fn to_sql(
        &self,
        ty: &Type,
        w: &mut BytesMut,
    ) -> Result<IsNull, Box<dyn StdError + Sync + Send>> {
        self.0.to_sql(ty, w)
    }
}

#[cfg(feature = "serde")]
mod serde {
    //! Module providing integration with [`serde`] crate.

    use std::str::FromStr as _;

    use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

    use super::Date;

    impl Serialize for Date {
        fn serialize<S: Serializer>(
            &self,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            serializer.serialize_str(&self.to_string())
        }
    }

    impl<'de> Deserialize<'de> for Date {
        fn deserialize<D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Self, D::Error> {
            let s = String::deserialize(deserializer)?;
            Self::from_str(&s).map_err(de::Error::custom)
        }
    }
}

#[cfg(test)]
mod spec {
    use std::str::FromStr as _;

    use super::Date;

    fn date(s: &str) -> Date {
        Date::from_str(s).unwrap()
    }

    #[test]
    fn parses_and_formats() {
        assert_eq!(date("2025-06-01").to_string(), "2025-06-01");
        assert!(Date::from_str("2025-13-01").is_err());
        assert!(Date::from_str("01.06.2025").is_err());
    }

    #[test]
    fn adds_weeks() {
        assert_eq!(date("2025-06-01").add_weeks(1), date("2025-06-08"));
        assert_eq!(date("2025-12-29").add_weeks(1), date("2026-01-05"));
    }

    #[test]
    fn adds_months() {
        assert_eq!(date("2025-06-01").add_months(2), date("2025-08-01"));
        assert_eq!(date("2025-11-15").add_months(2), date("2026-01-15"));
        // Day is clamped to the target month length.
        assert_eq!(date("2025-01-31").add_months(1), date("2025-02-28"));
        assert_eq!(date("2024-01-31").add_months(1), date("2024-02-29"));
    }

    #[test]
    fn adds_years() {
        assert_eq!(date("2025-06-01").add_years(1), date("2026-06-01"));
        assert_eq!(date("2024-02-29").add_years(1), date("2025-02-28"));
    }
}
