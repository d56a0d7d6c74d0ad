//! One logged set-group and the boundary between user input, display text and
//! the numbers the aggregate calculator works with.

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::Deserializer;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Display and storage format for record dates.
pub const DATE_FORMAT: &str = "%d/%m/%Y";

/// A decimal literal followed by optional unit text, e.g. `52,5 kg`.
static WEIGHT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*([0-9]*[.,]?[0-9]+)\s*[^0-9]*$").expect("valid weight regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum WeightUnit {
    #[default]
    Kg,
    Lbs,
}

impl WeightUnit {
    pub fn suffix(self) -> &'static str {
        match self {
            WeightUnit::Kg => "Kg",
            WeightUnit::Lbs => "Lbs",
        }
    }
}

/// One logged set-group.
///
/// The cells are kept as the exact display strings that are written to disk,
/// so a load followed by a save reproduces the file byte for byte, including
/// rows written by older versions. Typed values are obtained through
/// [`Record::parsed`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Record {
    last_set_reps: String,
    reps: String,
    sets: String,
    weight: String,
    date: String,
}

/// Numeric view of a [`Record`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParsedRecord {
    pub sets: u32,
    pub reps: u32,
    pub last_set_reps: u32,
    pub weight: f64,
    /// `None` when the stored date is not in `dd/mm/yyyy` form.
    pub date: Option<NaiveDate>,
}

impl Record {
    /// Build a record from already typed values.
    pub fn new(
        sets: u32,
        reps: u32,
        last_set_reps: u32,
        weight: f64,
        unit: WeightUnit,
        date: NaiveDate,
    ) -> Result<Self, ValidationError> {
        if !weight.is_finite() || weight < 0.0 {
            return Err(ValidationError::InvalidWeight(weight.to_string()));
        }
        Ok(Self {
            last_set_reps: last_set_reps.to_string(),
            reps: reps.to_string(),
            sets: sets.to_string(),
            weight: format_weight(weight, unit),
            date: date.format(DATE_FORMAT).to_string(),
        })
    }

    /// Validate raw text fields as typed by a user.
    ///
    /// Nothing is normalised partially: either every field is valid and a
    /// record in canonical form is returned, or the first bad field is
    /// reported.
    pub fn from_input(
        sets: &str,
        reps: &str,
        last_set_reps: &str,
        weight: &str,
        date: &str,
        unit: WeightUnit,
    ) -> Result<Self, ValidationError> {
        let sets = parse_count("sets", sets)?;
        let reps = parse_count("reps", reps)?;
        let last_set_reps = parse_count("last set reps", last_set_reps)?;
        let weight =
            parse_weight(weight).ok_or_else(|| ValidationError::InvalidWeight(weight.to_string()))?;
        let date = NaiveDate::parse_from_str(date.trim(), DATE_FORMAT)
            .map_err(|_| ValidationError::InvalidDate(date.to_string()))?;
        Self::new(sets, reps, last_set_reps, weight, unit, date)
    }

    /// Rebuild a record from stored cells without any normalisation.
    pub fn from_cells(
        last_set_reps: impl Into<String>,
        reps: impl Into<String>,
        sets: impl Into<String>,
        weight: impl Into<String>,
        date: impl Into<String>,
    ) -> Self {
        Self {
            last_set_reps: last_set_reps.into(),
            reps: reps.into(),
            sets: sets.into(),
            weight: weight.into(),
            date: date.into(),
        }
    }

    /// Cells in storage order: last set reps, reps, sets, weight, date.
    pub fn cells(&self) -> [&str; 5] {
        [
            &self.last_set_reps,
            &self.reps,
            &self.sets,
            &self.weight,
            &self.date,
        ]
    }

    pub fn sets_text(&self) -> &str {
        &self.sets
    }

    pub fn reps_text(&self) -> &str {
        &self.reps
    }

    pub fn last_set_reps_text(&self) -> &str {
        &self.last_set_reps
    }

    pub fn weight_text(&self) -> &str {
        &self.weight
    }

    pub fn date_text(&self) -> &str {
        &self.date
    }

    /// Parse the numeric cells. Returns `None` if any count or the weight is
    /// malformed; an unreadable date only clears [`ParsedRecord::date`].
    pub fn parsed(&self) -> Option<ParsedRecord> {
        Some(ParsedRecord {
            sets: self.sets.trim().parse().ok()?,
            reps: self.reps.trim().parse().ok()?,
            last_set_reps: self.last_set_reps.trim().parse().ok()?,
            weight: parse_weight(&self.weight)?,
            date: NaiveDate::parse_from_str(self.date.trim(), DATE_FORMAT).ok(),
        })
    }
}

fn parse_count(field: &'static str, value: &str) -> Result<u32, ValidationError> {
    value
        .trim()
        .parse::<u32>()
        .map_err(|_| ValidationError::NotACount {
            field,
            value: value.to_string(),
        })
}

/// Parse a weight such as `52.5 Kg`, `52,5kg` or `80`.
///
/// Trailing unit text is ignored and a comma decimal separator is accepted.
pub fn parse_weight(text: &str) -> Option<f64> {
    let caps = WEIGHT_RE.captures(text)?;
    caps.get(1)?.as_str().replace(',', ".").parse().ok()
}

/// Render a weight without trailing zeros followed by the unit suffix.
pub fn format_weight(weight: f64, unit: WeightUnit) -> String {
    let mut number = format!("{weight:.3}");
    if number.contains('.') {
        let trimmed = number.trim_end_matches('0').trim_end_matches('.').len();
        number.truncate(trimmed);
    }
    format!("{number} {}", unit.suffix())
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.cells().serialize(serializer)
    }
}

/// Older files sometimes hold bare JSON numbers in the count columns.
#[derive(Deserialize)]
#[serde(untagged)]
enum Cell {
    Text(String),
    Number(serde_json::Number),
}

impl From<Cell> for String {
    fn from(cell: Cell) -> Self {
        match cell {
            Cell::Text(s) => s,
            Cell::Number(n) => n.to_string(),
        }
    }
}

impl<'de> Deserialize<'de> for Record {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let (last_set_reps, reps, sets, weight, date) =
            <(Cell, Cell, Cell, Cell, Cell)>::deserialize(deserializer)?;
        Ok(Record::from_cells(last_set_reps, reps, sets, weight, date))
    }
}
