//! Primitive pipetting actions emitted by a [`TransferPlan`](crate::TransferPlan).

use crate::location::Location;
use serde::{Deserialize, Serialize};

/// One call to a pipette primitive, with exactly the data that call needs.
///
/// Serialises as a command record tagged by `method`, e.g.
/// `{"method": "aspirate", "volume": 50.0, "location": {..}, "rate": 1.0}`.
/// Optional parameters left as `None` mean "use the pipette's default".
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum Action {
    // --- Tip handling ---
    /// Pick up a tip (or a column of tips for a multichannel) at `location`.
    PickUpTip {
        location: Location,
        presses: Option<u32>,
        increment: Option<f64>,
    },
    /// Put the current tip back where it was picked up.
    ReturnTip,
    /// Eject the current tip into the trash.
    DropTip,

    // --- Liquid handling ---
    Aspirate {
        volume: f64,
        location: Location,
        rate: f64,
    },
    Dispense {
        volume: f64,
        location: Location,
        rate: f64,
    },
    /// Aspirate and dispense `volume` at `location`, `repetitions` times.
    Mix {
        repetitions: Option<u32>,
        volume: Option<f64>,
        rate: Option<f64>,
        location: Location,
    },
    /// Draw `volume` of air into the tip at the current position.
    AirGap { volume: f64 },

    // --- Tip conditioning ---
    /// Touch the tip against the sides of the current well to shed droplets.
    TouchTip {
        radius: Option<f64>,
        v_offset: Option<f64>,
        speed: Option<f64>,
    },
    /// Expel everything left in the tip at `location`.
    BlowOut { location: Location },
}

impl Action {
    /// The name of the pipette primitive this action maps to.
    pub fn method(&self) -> &'static str {
        match self {
            Action::PickUpTip { .. } => "pick_up_tip",
            Action::ReturnTip => "return_tip",
            Action::DropTip => "drop_tip",
            Action::Aspirate { .. } => "aspirate",
            Action::Dispense { .. } => "dispense",
            Action::Mix { .. } => "mix",
            Action::AirGap { .. } => "air_gap",
            Action::TouchTip { .. } => "touch_tip",
            Action::BlowOut { .. } => "blow_out",
        }
    }

    /// Volume moved by an aspirate, dispense or air gap; `None` for everything else.
    pub fn volume(&self) -> Option<f64> {
        match self {
            Action::Aspirate { volume, .. }
            | Action::Dispense { volume, .. }
            | Action::AirGap { volume } => Some(*volume),
            _ => None,
        }
    }

    /// Target location of actions that move to one.
    pub fn location(&self) -> Option<&Location> {
        match self {
            Action::PickUpTip { location, .. }
            | Action::Aspirate { location, .. }
            | Action::Dispense { location, .. }
            | Action::Mix { location, .. }
            | Action::BlowOut { location } => Some(location),
            Action::ReturnTip | Action::DropTip | Action::AirGap { .. } | Action::TouchTip { .. } => {
                None
            }
        }
    }

    pub fn is_tip_pick_up(&self) -> bool {
        matches!(self, Action::PickUpTip { .. })
    }

    pub fn is_tip_release(&self) -> bool {
        matches!(self, Action::DropTip | Action::ReturnTip)
    }
}
