//! Wells and locations on the deck.

use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A unique identifier for a piece of labware on the deck.
pub type LabwareId = u16;

/// Physical layout family of a labware, as far as pipette access is concerned.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LabwareFormat {
    /// 8 x 12 plate or rack on 9 mm spacing.
    Standard96,
    /// 16 x 24 plate on 4.5 mm spacing. A multichannel reaches rows A and B.
    Standard384,
    /// Single- or multi-trough reservoir.
    Reservoir,
    /// Fixed trash container.
    Trash,
    /// Anything else (tube racks, custom definitions).
    Irregular,
}

/// A single well inside a labware.
///
/// Rows and columns are zero-based: row 0 is `A`, column 0 is `1`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Well {
    /// The labware this well belongs to.
    pub labware: LabwareId,
    /// Layout family of the parent labware.
    pub format: LabwareFormat,
    /// Zero-based row index.
    pub row: u8,
    /// Zero-based column index.
    pub column: u8,
}

impl Well {
    pub fn new(labware: LabwareId, format: LabwareFormat, row: u8, column: u8) -> Self {
        Self {
            labware,
            format,
            row,
            column,
        }
    }

    /// Parses a conventional well name such as `"A1"` or `"P24"`.
    ///
    /// Returns `None` for anything that is not a single row letter followed by
    /// a one-based column number.
    pub fn from_name(labware: LabwareId, format: LabwareFormat, name: &str) -> Option<Self> {
        let mut chars = name.chars();
        let row_char = chars.next()?.to_ascii_uppercase();
        if !row_char.is_ascii_uppercase() {
            return None;
        }
        let column: u8 = chars.as_str().parse().ok()?;
        if column == 0 {
            return None;
        }
        Some(Self::new(
            labware,
            format,
            row_char as u8 - b'A',
            column - 1,
        ))
    }

    /// The conventional name of this well (`"A1"`, `"B12"`, ...).
    pub fn name(&self) -> String {
        format!(
            "{}{}",
            char::from(b'A'.saturating_add(self.row)),
            self.column as u16 + 1
        )
    }

    /// A [`Location`] at this well with no offset.
    pub fn location(self) -> Location {
        Location::from(self)
    }
}

impl fmt::Display for Well {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} of labware {}", self.name(), self.labware)
    }
}

/// An aspirate/dispense target: a well plus an offset from its reference point.
///
/// The planner never interprets the geometry; it only checks the well's row for
/// multichannel access and passes the location through to emitted actions.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Location {
    /// The well being targeted.
    pub well: Well,
    /// Offset in millimetres relative to the well's reference point.
    pub offset: Vec3,
}

impl Location {
    /// Returns a copy of this location moved by `delta` millimetres.
    pub fn with_offset(mut self, delta: Vec3) -> Self {
        self.offset += delta;
        self
    }
}

impl From<Well> for Location {
    fn from(well: Well) -> Self {
        Self {
            well,
            offset: Vec3::ZERO,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.offset == Vec3::ZERO {
            write!(f, "{}", self.well)
        } else {
            write!(f, "{} offset {}", self.well, self.offset)
        }
    }
}
