//! What the planner needs to know about a pipette.

use crate::location::Location;
use serde::{Deserialize, Serialize};

/// Volumes below this (uL) count as an empty tip.
pub const EMPTY_TOLERANCE: f64 = 1e-6;

/// Read-only view of a pipette's capabilities and live state.
///
/// `current_volume` changes as the driver executes aspirates and dispenses; the
/// planner never writes it.
pub trait PipetteProfile {
    /// Number of channels (1 for single, 8 for multi).
    fn channels(&self) -> u8;
    /// Largest volume the pipette can hold.
    fn max_volume(&self) -> f64;
    /// Smallest volume the pipette can move accurately.
    fn min_volume(&self) -> f64;
    /// Usable volume with the current tip type.
    fn working_volume(&self) -> f64;
    /// Where tips and excess liquid are discarded.
    fn trash_location(&self) -> Location;
    /// Liquid plus air currently in the tip.
    fn current_volume(&self) -> f64;

    /// Snapshot of the live state, as passed to [`TransferPlan::next_action`](crate::TransferPlan::next_action).
    fn state(&self) -> PipetteState {
        PipetteState {
            current_volume: self.current_volume(),
        }
    }
}

/// The live pipette state observed by the driver just before asking for the next action.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PipetteState {
    pub current_volume: f64,
}

impl PipetteState {
    pub fn new(current_volume: f64) -> Self {
        Self { current_volume }
    }

    pub fn is_empty(&self) -> bool {
        self.current_volume.abs() < EMPTY_TOLERANCE
    }
}

/// Static description of a pipette model mounted on the robot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PipetteSpec {
    pub name: String,
    pub channels: u8,
    pub min_volume: f64,
    pub max_volume: f64,
    pub working_volume: f64,
    pub trash: Location,
}

impl PipetteSpec {
    pub fn new(
        name: impl Into<String>,
        channels: u8,
        min_volume: f64,
        max_volume: f64,
        trash: Location,
    ) -> Self {
        Self {
            name: name.into(),
            channels,
            min_volume,
            max_volume,
            working_volume: max_volume,
            trash,
        }
    }

    /// Overrides the working volume, e.g. for low-volume tips (builder pattern).
    pub fn with_working_volume(mut self, working_volume: f64) -> Self {
        self.working_volume = working_volume;
        self
    }

    pub fn p20_single(trash: Location) -> Self {
        Self::new("p20_single", 1, 1.0, 20.0, trash)
    }

    pub fn p300_single(trash: Location) -> Self {
        Self::new("p300_single", 1, 30.0, 300.0, trash)
    }

    pub fn p300_multi(trash: Location) -> Self {
        Self::new("p300_multi", 8, 30.0, 300.0, trash)
    }

    pub fn p1000_single(trash: Location) -> Self {
        Self::new("p1000_single", 1, 100.0, 1000.0, trash)
    }
}

/// A bare spec always reports an empty tip; drivers that track liquid wrap it.
impl PipetteProfile for PipetteSpec {
    fn channels(&self) -> u8 {
        self.channels
    }

    fn max_volume(&self) -> f64 {
        self.max_volume
    }

    fn min_volume(&self) -> f64 {
        self.min_volume
    }

    fn working_volume(&self) -> f64 {
        self.working_volume
    }

    fn trash_location(&self) -> Location {
        self.trash
    }

    fn current_volume(&self) -> f64 {
        0.0
    }
}
