//! Academic periods (terms) and their nominal calendar spans

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Error returned when a period string is neither a short code nor an API term name
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid period: {0:?}")]
pub struct PeriodParseError(pub String);

/// Academic season, declared in calendar order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Season {
    Intersession,
    Spring,
    Summer,
    Fall,
}

impl Season {
    pub const ALL: [Season; 4] = [
        Season::Intersession,
        Season::Spring,
        Season::Summer,
        Season::Fall,
    ];

    /// Two-letter code used in short period codes (e.g. "FA")
    pub fn code(self) -> &'static str {
        match self {
            Season::Intersession => "IN",
            Season::Spring => "SP",
            Season::Summer => "SU",
            Season::Fall => "FA",
        }
    }

    /// Name used by the SIS API in term strings (e.g. "Fall")
    pub fn name(self) -> &'static str {
        match self {
            Season::Intersession => "Intersession",
            Season::Spring => "Spring",
            Season::Summer => "Summer",
            Season::Fall => "Fall",
        }
    }

    fn from_code(code: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|s| s.code().eq_ignore_ascii_case(code))
    }

    fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|s| s.name().eq_ignore_ascii_case(name))
    }

    /// Season whose nominal span contains the given month (1-12)
    fn for_month(month: u32) -> Self {
        match month {
            1 => Season::Intersession,
            2..=5 => Season::Spring,
            6..=8 => Season::Summer,
            _ => Season::Fall,
        }
    }

    fn previous(self) -> Self {
        match self {
            Season::Intersession => Season::Fall,
            Season::Spring => Season::Intersession,
            Season::Summer => Season::Spring,
            Season::Fall => Season::Summer,
        }
    }

    /// Last month of the nominal span
    fn end_month(self) -> u32 {
        match self {
            Season::Intersession => 1,
            Season::Spring => 5,
            Season::Summer => 8,
            Season::Fall => 12,
        }
    }
}

/// An academic period such as `FA24` (Fall 2024)
///
/// Orders chronologically: by year, then by season within the year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Period {
    year: i32,
    season: Season,
}

impl Period {
    /// Earliest year a two-digit period code can name
    pub const MIN_YEAR: i32 = 2000;
    /// Latest year a two-digit period code can name
    pub const MAX_YEAR: i32 = 2099;

    pub fn new(season: Season, year: i32) -> Self {
        Self { year, season }
    }

    pub fn season(&self) -> Season {
        self.season
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    /// Short code form, e.g. "SU25"
    pub fn code(&self) -> String {
        format!("{}{:02}", self.season.code(), self.year.rem_euclid(100))
    }

    /// Term string as used by the SIS API, e.g. "Summer 2025"
    pub fn api_term(&self) -> String {
        format!("{} {}", self.season.name(), self.year)
    }

    /// The period whose nominal span contains `date`
    pub fn containing(date: NaiveDate) -> Self {
        Self::new(Season::for_month(date.month()), date.year())
    }

    /// The period immediately before this one
    pub fn previous(&self) -> Self {
        let year = match self.season {
            Season::Intersession => self.year - 1,
            _ => self.year,
        };
        Self::new(self.season.previous(), year)
    }

    /// The most recent period whose nominal span ended before `date`
    pub fn last_completed(date: NaiveDate) -> Self {
        Self::containing(date).previous()
    }

    /// Last day of the period's nominal span
    pub fn end_date(&self) -> NaiveDate {
        let month = self.season.end_month();
        let next_month_start = if month == 12 {
            NaiveDate::from_ymd_opt(self.year + 1, 1, 1)
        } else {
            NaiveDate::from_ymd_opt(self.year, month + 1, 1)
        };
        next_month_start
            .and_then(|d| d.pred_opt())
            .unwrap_or(NaiveDate::MAX)
    }

    /// Parse the short code form ("FA24")
    pub fn from_code(s: &str) -> Result<Self, PeriodParseError> {
        let s = s.trim();
        let err = || PeriodParseError(s.to_string());

        if s.len() != 4 || !s.is_ascii() {
            return Err(err());
        }
        let (season, year) = s.split_at(2);
        let season = Season::from_code(season).ok_or_else(err)?;
        if !year.bytes().all(|b| b.is_ascii_digit()) {
            return Err(err());
        }
        let year: i32 = year.parse().map_err(|_| err())?;

        Ok(Self::new(season, 2000 + year))
    }

    /// Parse the SIS API term form ("Fall 2024")
    pub fn from_api_term(s: &str) -> Result<Self, PeriodParseError> {
        let s = s.trim();
        let err = || PeriodParseError(s.to_string());

        let mut parts = s.split_whitespace();
        let (Some(name), Some(year), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(err());
        };
        let season = Season::from_name(name).ok_or_else(err)?;
        if year.len() != 4 {
            return Err(err());
        }
        let year: i32 = year.parse().map_err(|_| err())?;
        if !(Self::MIN_YEAR..=Self::MAX_YEAR).contains(&year) {
            return Err(err());
        }

        Ok(Self::new(season, year))
    }
}

impl FromStr for Period {
    type Err = PeriodParseError;

    /// Accepts either the short code or the API term form
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_code(s).or_else(|_| Self::from_api_term(s))
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.code())
    }
}

impl Serialize for Period {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.code())
    }
}

impl<'de> Deserialize<'de> for Period {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Enumerate every term from `start_year` through `today`'s year.
///
/// From August onward the next year's Intersession and Spring are
/// published, so they are included as well. Years before
/// [`Period::MIN_YEAR`] are not representable and are skipped.
pub fn terms_through(start_year: i32, today: NaiveDate) -> Vec<Period> {
    let start_year = start_year.max(Period::MIN_YEAR);
    let end_year = today.year();
    let mut terms: Vec<Period> = (start_year..=end_year)
        .flat_map(|year| Season::ALL.into_iter().map(move |s| Period::new(s, year)))
        .collect();

    if today.month() >= 8 {
        terms.push(Period::new(Season::Intersession, end_year + 1));
        terms.push(Period::new(Season::Spring, end_year + 1));
    }

    terms
}
