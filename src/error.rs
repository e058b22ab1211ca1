//! Error types for planning and executing transfers.
//!
//! Planning errors come in three flavours:
//! - [`ValidationError`]: a bad option or input, raised at plan construction before any
//!   action is produced.
//! - [`PlanError::Structural`]: multichannel row filtering left nothing to work with, also
//!   raised at construction.
//! - [`OutOfTips`]: the tip source ran dry when a pick-up was actually reached. This is the
//!   only recoverable condition; callers are expected to pause and ask for a refill.

use std::fmt;
use thiserror::Error;

/// Convenient result alias for planning operations.
pub type Result<T> = std::result::Result<T, PlanError>;

/// Which side of a transfer a problem refers to.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Side {
    Source,
    Destination,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Source => f.write_str("source"),
            Side::Destination => f.write_str("destination"),
        }
    }
}

/// Raised when a tip source has no usable tips left.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("no tips available for a {channels}-channel pick-up")]
pub struct OutOfTips {
    /// Number of tips that were requested at once.
    pub channels: u8,
}

/// A bad input or option value, detected before any action is produced.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    #[error(
        "air_gap must be between 0uL and the pipette's expected working volume, \
         {working_volume}uL (got {air_gap}uL)"
    )]
    AirGapOutOfRange { air_gap: f64, working_volume: f64 },

    #[error(
        "disposal volume ({disposal_volume}uL) plus air gap ({air_gap}uL) must be less than \
         the transfer capacity of {capacity}uL"
    )]
    DisposalAndAirGapExceedCapacity {
        disposal_volume: f64,
        air_gap: f64,
        capacity: f64,
    },

    #[error("list of volumes ({actual}) should be equal to number of transfers ({expected})")]
    VolumeListLength { expected: usize, actual: usize },

    #[error(
        "source and destination lists must be divisible \
         ({sources} sources, {destinations} destinations)"
    )]
    IndivisibleLists { sources: usize, destinations: usize },

    #[error("{side} list is empty")]
    EmptyWellList { side: Side },

    #[error("{field} must not be negative (got {value})")]
    NegativeValue { field: &'static str, value: f64 },

    #[error("{field} must be a finite number")]
    NonFinite { field: &'static str },

    #[error("{field} must be greater than zero (got {value})")]
    NotPositive { field: &'static str, value: f64 },

    #[error(
        "volume of {volume}uL exceeds the per-aspirate capacity of {capacity}uL \
         and carryover is disabled"
    )]
    CarryoverDisabled { volume: f64, capacity: f64 },

    #[error("blow-out location for {command} cannot be the {side} well")]
    BlowOutLocation {
        command: &'static str,
        side: Side,
    },
}

/// The one error type returned by [`TransferPlan`](crate::TransferPlan).
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PlanError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Multichannel row filtering removed every well on one side.
    #[error("invalid {side} for multichannel transfer: [{}]. {reason}", .wells.join(", "))]
    Structural {
        side: Side,
        /// Names of the wells that were rejected.
        wells: Vec<String>,
        reason: String,
    },

    #[error(transparent)]
    OutOfTips(#[from] OutOfTips),
}

impl PlanError {
    /// True for conditions a protocol can recover from by operator action (tip refill).
    pub fn is_recoverable(&self) -> bool {
        matches!(self, PlanError::OutOfTips(_))
    }
}

/// A fault reported by a pipette while executing an action.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PipetteError {
    #[error("cannot {action} without a tip attached")]
    NoTip { action: &'static str },

    #[error("cannot pick up a tip while one is already attached")]
    TipAlreadyAttached,

    #[error("cannot return tip: no record of where it was picked up")]
    NoReturnTarget,

    #[error("aspirating {requested}uL would exceed the remaining capacity of {available}uL")]
    Overflow { requested: f64, available: f64 },

    #[error("dispensing {requested}uL but only {available}uL is in the tip")]
    Underflow { requested: f64, available: f64 },
}

/// Error raised while driving a plan against a pipette.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ExecutionError {
    #[error("planning failed: {0}")]
    Plan(#[from] PlanError),

    #[error("pipette fault: {0}")]
    Pipette(#[from] PipetteError),
}

impl From<ValidationError> for ExecutionError {
    fn from(err: ValidationError) -> Self {
        ExecutionError::Plan(err.into())
    }
}
