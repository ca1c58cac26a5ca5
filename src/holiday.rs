//! Read-only public holiday calendar, loaded once at startup.
//!
//! Source file shape: `{ "<year>": { "<country>": [ { "date", "name", "isWorkday" } ] } }`.
//! The country key `ALL` marks holidays observed everywhere.

use std::collections::BTreeMap;
use std::io;
use std::path::Path;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

pub const ALL_COUNTRIES: &str = "ALL";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicHoliday {
    pub date: NaiveDate,
    pub name: String,
    pub country: String,
    /// Make-up working day rather than a day off.
    pub is_workday: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HolidayEntry {
    date: NaiveDate,
    name: String,
    #[serde(default)]
    is_workday: bool,
}

type HolidayFile = BTreeMap<String, Option<BTreeMap<String, Option<Vec<Option<HolidayEntry>>>>>>;

#[derive(Debug, Clone, Default)]
pub struct HolidayCalendar {
    /// Sorted by date, then country.
    holidays: Vec<PublicHoliday>,
}

impl HolidayCalendar {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Null years, null country lists and null entries are skipped. The year key is not
    /// trusted: lookups go by each entry's own date.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let file: HolidayFile = serde_json::from_str(json)?;
        let mut holidays: Vec<PublicHoliday> = file
            .into_values()
            .flatten()
            .flat_map(|countries| countries.into_iter())
            .flat_map(|(country, entries)| {
                entries
                    .unwrap_or_default()
                    .into_iter()
                    .flatten()
                    .map(move |e| PublicHoliday {
                        date: e.date,
                        name: e.name,
                        country: country.clone(),
                        is_workday: e.is_workday,
                    })
            })
            .collect();
        holidays.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.country.cmp(&b.country)));
        Ok(Self { holidays })
    }

    pub fn load(path: &Path) -> io::Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    pub fn by_year(&self, year: i32) -> Vec<&PublicHoliday> {
        self.holidays.iter().filter(|h| h.date.year() == year).collect()
    }

    /// Holidays of `country` plus the ones marked `ALL`.
    pub fn by_year_and_country(&self, year: i32, country: &str) -> Vec<&PublicHoliday> {
        self.holidays
            .iter()
            .filter(|h| h.date.year() == year)
            .filter(|h| h.country.eq_ignore_ascii_case(country) || h.country == ALL_COUNTRIES)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.holidays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.holidays.is_empty()
    }
}
