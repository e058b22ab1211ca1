//! Strategy options controlling how a transfer is carried out.
//!
//! Every strategy axis is a closed enum. [`TransferOptions::builder`] layers
//! overrides onto the defaults and validates the result, so the planner only
//! ever sees a fully-populated options value.

use crate::error::ValidationError;
use crate::location::Location;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// When to pick up and drop tips during a transfer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum NewTip {
    /// Never touch tips. The protocol must attach one before the transfer.
    Never,
    /// One tip for the whole transfer.
    #[default]
    Once,
    /// A fresh tip for every sub-transfer. Distribute and consolidate treat this as `Once`.
    Always,
}

/// If and when to mix.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MixStrategy {
    #[default]
    Never,
    /// Mix before each aspirate into an empty tip.
    Before,
    /// Mix after each dispense that empties the tip.
    After,
    Both,
}

impl MixStrategy {
    pub fn mixes_before(self) -> bool {
        matches!(self, MixStrategy::Before | MixStrategy::Both)
    }

    pub fn mixes_after(self) -> bool {
        matches!(self, MixStrategy::After | MixStrategy::Both)
    }

    /// The same strategy with the before-aspirate mix removed.
    pub fn without_before(self) -> Self {
        match self {
            MixStrategy::Never | MixStrategy::Before => MixStrategy::Never,
            MixStrategy::After | MixStrategy::Both => MixStrategy::After,
        }
    }

    /// The same strategy with the after-dispense mix removed.
    pub fn without_after(self) -> Self {
        match self {
            MixStrategy::Never | MixStrategy::After => MixStrategy::Never,
            MixStrategy::Before | MixStrategy::Both => MixStrategy::Before,
        }
    }

    fn with_before(self) -> Self {
        match self {
            MixStrategy::Never | MixStrategy::Before => MixStrategy::Before,
            MixStrategy::After | MixStrategy::Both => MixStrategy::Both,
        }
    }

    fn with_after(self) -> Self {
        match self {
            MixStrategy::Never | MixStrategy::After => MixStrategy::After,
            MixStrategy::Before | MixStrategy::Both => MixStrategy::Both,
        }
    }
}

/// Where used tips go.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DropTipStrategy {
    #[default]
    Trash,
    /// Put the tip back in the rack it came from.
    Return,
}

/// Where to blow out whatever is left in the tip after a dispense.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub enum BlowOutStrategy {
    /// No explicit blow-out. Disposal volume is still ejected into the trash.
    #[default]
    None,
    Trash,
    /// Blow out into the destination, but only once the tip is expected to be empty.
    DestIfEmpty,
    /// Blow out into the well the liquid was last aspirated from.
    Source,
    /// Blow out into the well just dispensed to, whatever is left in the tip.
    Dest,
    CustomLocation(Location),
}

/// Whether to touch tip after aspirates and dispenses.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TouchTipStrategy {
    #[default]
    Never,
    Always,
}

/// Curve mapping the relative transfer index `[0, 1]` onto the gradient `[0, 1]`.
///
/// Defaults to the identity (a linear gradient).
#[derive(Clone, Default)]
pub struct GradientFunction(Option<Arc<dyn Fn(f64) -> f64 + Send + Sync>>);

impl GradientFunction {
    pub fn new(f: impl Fn(f64) -> f64 + Send + Sync + 'static) -> Self {
        Self(Some(Arc::new(f)))
    }

    pub fn linear() -> Self {
        Self(None)
    }

    pub fn apply(&self, x: f64) -> f64 {
        match &self.0 {
            Some(f) => f(x),
            None => x,
        }
    }
}

impl fmt::Debug for GradientFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(_) => f.write_str("GradientFunction(custom)"),
            None => f.write_str("GradientFunction(linear)"),
        }
    }
}

/// Options pertaining to the overall behaviour of the transfer.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Transfer {
    pub new_tip: NewTip,
    /// Air (uL) drawn after every aspirate and between distribute dispenses.
    pub air_gap: f64,
    /// Split volumes larger than the pipette capacity into several sub-transfers.
    pub carryover: bool,
    #[serde(skip)]
    pub gradient_function: GradientFunction,
    /// Extra liquid aspirated and later blown out. `None` picks the mode default:
    /// the pipette's minimum volume for distribute, zero otherwise.
    pub disposal_volume: Option<f64>,
    pub mix_strategy: MixStrategy,
    pub drop_tip_strategy: DropTipStrategy,
    pub blow_out_strategy: BlowOutStrategy,
    pub touch_tip_strategy: TouchTipStrategy,
}

impl Default for Transfer {
    fn default() -> Self {
        Self {
            new_tip: NewTip::Once,
            air_gap: 0.0,
            carryover: true,
            gradient_function: GradientFunction::linear(),
            disposal_volume: None,
            mix_strategy: MixStrategy::Never,
            drop_tip_strategy: DropTipStrategy::Trash,
            blow_out_strategy: BlowOutStrategy::None,
            touch_tip_strategy: TouchTipStrategy::Never,
        }
    }
}

/// Parameters passed to every tip pick-up.
///
/// A fixed `location` bypasses the tip source entirely.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PickUpTipOpts {
    pub location: Option<Location>,
    pub presses: Option<u32>,
    pub increment: Option<f64>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MixOpts {
    pub repetitions: Option<u32>,
    pub volume: Option<f64>,
    pub rate: Option<f64>,
}

/// Mix parameters before aspirating and after dispensing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Mix {
    pub before: MixOpts,
    pub after: MixOpts,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TouchTipOpts {
    pub radius: Option<f64>,
    pub v_offset: Option<f64>,
    pub speed: Option<f64>,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct AspirateOpts {
    /// Flow rate multiplier.
    pub rate: f64,
}

impl Default for AspirateOpts {
    fn default() -> Self {
        Self { rate: 1.0 }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct DispenseOpts {
    /// Flow rate multiplier.
    pub rate: f64,
}

impl Default for DispenseOpts {
    fn default() -> Self {
        Self { rate: 1.0 }
    }
}

/// All available options for a transfer, distribute or consolidate.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TransferOptions {
    pub transfer: Transfer,
    pub pick_up_tip: PickUpTipOpts,
    pub mix: Mix,
    pub touch_tip: TouchTipOpts,
    pub aspirate: AspirateOpts,
    pub dispense: DispenseOpts,
}

impl TransferOptions {
    /// Starts from the defaults; see [`TransferOptionsBuilder`].
    pub fn builder() -> TransferOptionsBuilder {
        TransferOptionsBuilder::default()
    }

    /// Checks every value that can be judged without knowing the pipette.
    pub fn validate(&self) -> Result<(), ValidationError> {
        non_negative("air_gap", self.transfer.air_gap)?;
        if let Some(disposal) = self.transfer.disposal_volume {
            non_negative("disposal_volume", disposal)?;
        }
        positive("aspirate rate", self.aspirate.rate)?;
        positive("dispense rate", self.dispense.rate)?;
        for (field, mix) in [("mix before", &self.mix.before), ("mix after", &self.mix.after)] {
            if let Some(volume) = mix.volume {
                non_negative(field, volume)?;
            }
            if let Some(rate) = mix.rate {
                positive(field, rate)?;
            }
        }
        if let Some(speed) = self.touch_tip.speed {
            positive("touch_tip speed", speed)?;
        }
        if let Some(radius) = self.touch_tip.radius {
            non_negative("touch_tip radius", radius)?;
        }
        Ok(())
    }
}

pub(crate) fn finite(field: &'static str, value: f64) -> Result<f64, ValidationError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ValidationError::NonFinite { field })
    }
}

pub(crate) fn non_negative(field: &'static str, value: f64) -> Result<f64, ValidationError> {
    if finite(field, value)? < 0.0 {
        return Err(ValidationError::NegativeValue { field, value });
    }
    Ok(value)
}

pub(crate) fn positive(field: &'static str, value: f64) -> Result<f64, ValidationError> {
    if finite(field, value)? <= 0.0 {
        return Err(ValidationError::NotPositive { field, value });
    }
    Ok(value)
}

/// Fluent "defaults + overrides" construction of [`TransferOptions`].
///
/// ```
/// use pipette_transfer::{NewTip, TransferOptions};
///
/// let options = TransferOptions::builder()
///     .new_tip(NewTip::Always)
///     .air_gap(10.0)
///     .mix_after(3, 50.0)
///     .build()
///     .unwrap();
/// assert_eq!(options.transfer.air_gap, 10.0);
/// ```
#[derive(Clone, Debug, Default)]
pub struct TransferOptionsBuilder {
    options: TransferOptions,
}

impl TransferOptionsBuilder {
    pub fn new_tip(mut self, policy: NewTip) -> Self {
        self.options.transfer.new_tip = policy;
        self
    }

    pub fn air_gap(mut self, volume: f64) -> Self {
        self.options.transfer.air_gap = volume;
        self
    }

    pub fn carryover(mut self, enabled: bool) -> Self {
        self.options.transfer.carryover = enabled;
        self
    }

    pub fn gradient(mut self, f: impl Fn(f64) -> f64 + Send + Sync + 'static) -> Self {
        self.options.transfer.gradient_function = GradientFunction::new(f);
        self
    }

    pub fn disposal_volume(mut self, volume: f64) -> Self {
        self.options.transfer.disposal_volume = Some(volume);
        self
    }

    pub fn mix_strategy(mut self, strategy: MixStrategy) -> Self {
        self.options.transfer.mix_strategy = strategy;
        self
    }

    /// Mix `repetitions` times with `volume` before each aspirate.
    ///
    /// `(0, 0.0)` means "no mix", matching the usual protocol convention.
    pub fn mix_before(mut self, repetitions: u32, volume: f64) -> Self {
        if repetitions == 0 && volume == 0.0 {
            return self;
        }
        self.options.mix.before.repetitions = Some(repetitions);
        self.options.mix.before.volume = Some(volume);
        self.options.transfer.mix_strategy = self.options.transfer.mix_strategy.with_before();
        self
    }

    /// Mix `repetitions` times with `volume` after each dispense that empties the tip.
    pub fn mix_after(mut self, repetitions: u32, volume: f64) -> Self {
        if repetitions == 0 && volume == 0.0 {
            return self;
        }
        self.options.mix.after.repetitions = Some(repetitions);
        self.options.mix.after.volume = Some(volume);
        self.options.transfer.mix_strategy = self.options.transfer.mix_strategy.with_after();
        self
    }

    pub fn drop_tip_strategy(mut self, strategy: DropTipStrategy) -> Self {
        self.options.transfer.drop_tip_strategy = strategy;
        self
    }

    pub fn blow_out(mut self, strategy: BlowOutStrategy) -> Self {
        self.options.transfer.blow_out_strategy = strategy;
        self
    }

    /// Enables touch tip with the given parameters.
    pub fn touch_tip(mut self, opts: TouchTipOpts) -> Self {
        self.options.transfer.touch_tip_strategy = TouchTipStrategy::Always;
        self.options.touch_tip = opts;
        self
    }

    pub fn pick_up_tip(mut self, opts: PickUpTipOpts) -> Self {
        self.options.pick_up_tip = opts;
        self
    }

    pub fn aspirate_rate(mut self, rate: f64) -> Self {
        self.options.aspirate.rate = rate;
        self
    }

    pub fn dispense_rate(mut self, rate: f64) -> Self {
        self.options.dispense.rate = rate;
        self
    }

    pub fn build(self) -> Result<TransferOptions, ValidationError> {
        self.options.validate()?;
        Ok(self.options)
    }
}
