//! # pipette-transfer
//!
//! Transfer planning for liquid-handling robots. A high-level request such as
//! "move 50 uL from each of these wells into each of those" becomes an ordered
//! stream of pipette primitives: tip pick-ups, aspirates, dispenses, mixes, air
//! gaps, touch-tips, blow-outs and tip drops.
//!
//! The planner never moves hardware. A [`TransferPlan`] is pulled one
//! [`Action`] at a time by a driver that executes each action and reports the
//! resulting [`PipetteState`] back, so decisions that depend on whether the tip
//! is empty are made against the real state. [`execute_plan`] and
//! [`LiquidHandler`] provide that driver loop; [`SimulatedPipette`] stands in
//! for hardware.

pub mod action;
pub mod driver;
pub mod error;
pub mod location;
mod modes;
pub mod options;
pub mod pipette;
pub mod plan;
pub mod tips;
pub mod version;
pub mod volume;

pub use action::*;
pub use driver::*;
pub use error::*;
pub use location::*;
pub use modes::extend_source_target_lists;
pub use options::*;
pub use pipette::*;
pub use plan::*;
pub use tips::*;
pub use version::*;
pub use volume::*;
