//! Enumeration types shared across the engine.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Sides
// ---------------------------------------------------------------------------

/// One of the two logical groups a workpiece's holes are split into.
///
/// The side is determined by the sign of a coordinate axis relative to the
/// workpiece center. Side A is always inspected before side B.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Side {
    /// Non-negative offset along the splitting axis.
    A,
    /// Negative offset along the splitting axis.
    B,
}

impl Side {
    /// Both sides in inspection order.
    pub const ALL: [Self; 2] = [Self::A, Self::B];

    /// Decode the side letter used as the first character of a hole id.
    pub const fn from_char(c: char) -> Option<Self> {
        match c {
            'A' => Some(Self::A),
            'B' => Some(Self::B),
            _ => None,
        }
    }

    /// Assign a side from the offset along the splitting axis.
    pub fn from_offset(offset: f64) -> Self {
        if offset >= 0.0 { Self::A } else { Self::B }
    }

    /// The letter used in hole identifiers.
    pub const fn letter(self) -> char {
        match self {
            Self::A => 'A',
            Self::B => 'B',
        }
    }
}

impl core::fmt::Display for Side {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.letter())
    }
}

// ---------------------------------------------------------------------------
// Hole status
// ---------------------------------------------------------------------------

/// Inspection status of a single hole.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HoleStatus {
    /// Not yet inspected.
    Pending,
    /// Probe is on the hole; outcome not yet revealed.
    InProgress,
    /// Within tolerance.
    Qualified,
    /// Out of tolerance.
    Defective,
    /// Blind hole (no through-bore detected).
    Blind,
    /// Outcome could not be decided and needs manual review.
    Uncertain,
    /// Inspection was interrupted before an outcome was revealed.
    Error,
}

impl HoleStatus {
    /// Whether this is a final inspection outcome.
    pub const fn is_final(self) -> bool {
        matches!(
            self,
            Self::Qualified | Self::Defective | Self::Blind | Self::Uncertain | Self::Error
        )
    }
}

// ---------------------------------------------------------------------------
// Sectors
// ---------------------------------------------------------------------------

/// One of the four angular sectors around the workpiece center.
///
/// Each sector covers a closed-open quarter turn: a boundary angle belongs
/// to the sector whose range it starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SectorId {
    /// `[0, 90)` degrees.
    #[serde(rename = "sector_1")]
    One,
    /// `[90, 180)` degrees.
    #[serde(rename = "sector_2")]
    Two,
    /// `[180, 270)` degrees.
    #[serde(rename = "sector_3")]
    Three,
    /// `[270, 360)` degrees.
    #[serde(rename = "sector_4")]
    Four,
}

impl SectorId {
    /// All sectors in ascending angular order.
    pub const ALL: [Self; 4] = [Self::One, Self::Two, Self::Three, Self::Four];

    /// The 1-based sector number.
    pub const fn number(self) -> u8 {
        match self {
            Self::One => 1,
            Self::Two => 2,
            Self::Three => 3,
            Self::Four => 4,
        }
    }

    /// Inclusive start of the sector's angular range, in degrees.
    pub const fn start_deg(self) -> f64 {
        match self {
            Self::One => 0.0,
            Self::Two => 90.0,
            Self::Three => 180.0,
            Self::Four => 270.0,
        }
    }

    /// Exclusive end of the sector's angular range, in degrees.
    pub const fn end_deg(self) -> f64 {
        match self {
            Self::One => 90.0,
            Self::Two => 180.0,
            Self::Three => 270.0,
            Self::Four => 360.0,
        }
    }

    /// Classify an angle in degrees. Any finite angle is normalized into
    /// `[0, 360)` first; non-finite angles have no sector.
    pub fn from_angle(degrees: f64) -> Option<Self> {
        if !degrees.is_finite() {
            return None;
        }
        let mut angle = degrees.rem_euclid(360.0);
        // rem_euclid rounds tiny negative inputs up to exactly 360.
        if angle >= 360.0 {
            angle = 0.0;
        }
        Self::ALL
            .into_iter()
            .find(|s| angle >= s.start_deg() && angle < s.end_deg())
    }
}

impl core::fmt::Display for SectorId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "sector_{}", self.number())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn boundaries_belong_to_the_starting_sector() {
        assert_eq!(SectorId::from_angle(0.0), Some(SectorId::One));
        assert_eq!(SectorId::from_angle(90.0), Some(SectorId::Two));
        assert_eq!(SectorId::from_angle(180.0), Some(SectorId::Three));
        assert_eq!(SectorId::from_angle(270.0), Some(SectorId::Four));
        assert_eq!(SectorId::from_angle(360.0), Some(SectorId::One));
    }

    #[test]
    fn angles_are_normalized() {
        assert_eq!(SectorId::from_angle(-45.0), Some(SectorId::Four));
        assert_eq!(SectorId::from_angle(-1e-18), Some(SectorId::One));
        assert_eq!(SectorId::from_angle(450.0), Some(SectorId::Two));
        assert_eq!(SectorId::from_angle(89.999_999), Some(SectorId::One));
    }

    #[test]
    fn non_finite_angles_have_no_sector() {
        assert_eq!(SectorId::from_angle(f64::NAN), None);
        assert_eq!(SectorId::from_angle(f64::INFINITY), None);
    }

    #[test]
    fn sector_serializes_with_prefixed_name() {
        let json = serde_json::to_string(&SectorId::Three).unwrap();
        assert_eq!(json, "\"sector_3\"");
    }

    #[test]
    fn status_finality() {
        assert!(!HoleStatus::Pending.is_final());
        assert!(!HoleStatus::InProgress.is_final());
        assert!(HoleStatus::Uncertain.is_final());
        assert!(HoleStatus::Error.is_final());
    }

    #[test]
    fn side_from_offset_sign() {
        assert_eq!(Side::from_offset(0.0), Side::A);
        assert_eq!(Side::from_offset(3.5), Side::A);
        assert_eq!(Side::from_offset(-0.1), Side::B);
    }
}
