//! Identifier types for holes, batches, and detection drivers.
//!
//! Hole identifiers are structured strings of the form `AC001R001`:
//! side letter, `C` + column number, `R` + row number. They come from the
//! geometry provider and are never generated here. Batch identifiers are
//! formatted by the lifecycle manager. Driver identifiers are UUID v7 so
//! attachment order is recoverable from logs.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::enums::Side;

/// Identifier of a single inspection target ("hole").
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HoleId(String);

impl HoleId {
    /// Wrap a raw identifier string. No validation is performed; use
    /// [`HoleId::position`] to check the structure.
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Build the canonical identifier for a side, column, and row.
    pub fn from_parts(side: Side, column: u32, row: u32) -> Self {
        Self(format!("{side}C{column:03}R{row:03}"))
    }

    /// Return the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parse the side, column, and row encoded in the identifier.
    ///
    /// Returns `None` if the identifier does not follow the
    /// `{side}C{column}R{row}` structure or if column or row is zero.
    pub fn position(&self) -> Option<HolePosition> {
        HolePosition::parse(&self.0)
    }
}

impl core::fmt::Display for HoleId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for HoleId {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

/// Grid position decoded from a [`HoleId`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HolePosition {
    /// Logical side group.
    pub side: Side,
    /// 1-based column number.
    pub column: u32,
    /// 1-based row number.
    pub row: u32,
}

impl HolePosition {
    fn parse(raw: &str) -> Option<Self> {
        let mut chars = raw.chars();
        let side = Side::from_char(chars.next()?)?;
        let rest = chars.as_str().strip_prefix('C')?;
        let (column, row) = rest.split_once('R')?;
        let column = parse_index(column)?;
        let row = parse_index(row)?;
        Some(Self { side, column, row })
    }
}

fn parse_index(digits: &str) -> Option<u32> {
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse::<u32>().ok().filter(|n| *n > 0)
}

/// Identifier of an inspection batch, e.g. `CAP1000_检测001_20260101_120000_MOCK`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BatchId(String);

impl BatchId {
    /// Wrap a raw batch identifier string.
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Return the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for BatchId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a detection driver attached to a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DriverId(pub Uuid);

impl DriverId {
    /// Create a new identifier using UUID v7 (time-ordered).
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for DriverId {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Display for DriverId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}
