//! Best-effort numeric coercion with an observable fallback path.
//!
//! Coercion never fails: a value that does not parse is kept in its original
//! form. [`Coercion`] makes that outcome explicit so callers (and tests) can
//! tell a parsed value from a fallback instead of inferring it afterwards.

use crate::table::Cell;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

/// Largest magnitude at which every integer is exactly representable in f64.
pub(crate) const MAX_EXACT_F64_INT: f64 = 9_007_199_254_740_992.0;

static RE_NUMERIC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[+-]?(?:\d+(?:\.\d*)?|\.\d+)(?:[eE][+-]?\d+)?$").unwrap());

/// Result of a best-effort conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Coercion<T> {
    /// The input converted cleanly.
    Parsed(T),
    /// The input did not convert; the original text is kept.
    Fallback(String),
}

impl<T> Coercion<T> {
    pub fn is_fallback(&self) -> bool {
        matches!(self, Coercion::Fallback(_))
    }

    pub fn parsed(self) -> Option<T> {
        match self {
            Coercion::Parsed(v) => Some(v),
            Coercion::Fallback(_) => None,
        }
    }
}

/// Parse a cleaned string as a number.
///
/// Accepts plain decimal literals with an optional sign, fraction and
/// exponent. Integral values become [`Cell::Integer`], everything else
/// [`Cell::Number`]. Words such as `inf` or `nan` are rejected.
pub fn parse_number(s: &str) -> Option<Cell> {
    if !RE_NUMERIC.is_match(s) {
        return None;
    }
    if let Ok(i) = s.parse::<i64>() {
        return Some(Cell::Integer(i));
    }
    let v = s.parse::<f64>().ok().filter(|v| v.is_finite())?;
    Some(float_cell(v))
}

/// Surface whole-valued floats as integers.
pub(crate) fn float_cell(v: f64) -> Cell {
    if v.fract() == 0.0 && v.abs() < MAX_EXACT_F64_INT {
        Cell::Integer(v as i64)
    } else {
        Cell::Number(v)
    }
}

/// Coerce free-text year input to an integer.
///
/// Surrounding whitespace is ignored. Anything that is not an integral
/// number (including `2020.5` or `2,020`) falls back to the trimmed text.
pub fn coerce_year(raw: &str) -> Coercion<i64> {
    let trimmed = raw.trim();
    match parse_number(trimmed) {
        Some(Cell::Integer(i)) => Coercion::Parsed(i),
        _ => Coercion::Fallback(trimmed.to_string()),
    }
}

/// The year attached to an import batch, as stored in the dataset.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Year {
    Numeric(i64),
    Text(String),
}

impl Year {
    /// Parse user input, falling back to text when it is not an integer.
    pub fn parse(raw: &str) -> Self {
        match coerce_year(raw) {
            Coercion::Parsed(y) => Year::Numeric(y),
            Coercion::Fallback(s) => Year::Text(s),
        }
    }

    /// The year held by a stored cell; `None` for empty cells.
    pub fn from_cell(cell: &Cell) -> Option<Self> {
        match cell {
            Cell::Empty => None,
            Cell::Integer(i) => Some(Year::Numeric(*i)),
            Cell::Number(n) => Some(match float_cell(*n) {
                Cell::Integer(i) => Year::Numeric(i),
                _ => Year::Text(n.to_string()),
            }),
            Cell::Text(s) => Some(Year::parse(s)),
        }
    }

    /// Equality on the coerced value: `2020` matches `Integer(2020)`,
    /// `Number(2020.0)` and `Text(" 2020 ")` alike.
    pub fn matches(&self, cell: &Cell) -> bool {
        Year::from_cell(cell).as_ref() == Some(self)
    }

    pub fn to_cell(&self) -> Cell {
        match self {
            Year::Numeric(i) => Cell::Integer(*i),
            Year::Text(s) => Cell::Text(s.clone()),
        }
    }
}

impl fmt::Display for Year {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Year::Numeric(i) => write!(f, "{i}"),
            Year::Text(s) => f.write_str(s),
        }
    }
}

impl FromStr for Year {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Year::parse(s))
    }
}
