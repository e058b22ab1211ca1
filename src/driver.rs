//! Executing plans against a pipette.
//!
//! [`Pipette`] is the primitive-level hardware seam. [`execute_plan`] is the pull
//! loop that feeds a [`TransferPlan`] the observed pipette state and dispatches
//! whatever it yields. [`LiquidHandler`] bundles a pipette with its tips and
//! offers the familiar `transfer` / `distribute` / `consolidate` entry points.
//! [`SimulatedPipette`] is an in-memory pipette that tracks liquid and tips.

use crate::action::Action;
use crate::error::{ExecutionError, PipetteError, Side, ValidationError};
use crate::location::Location;
use crate::options::{BlowOutStrategy, NewTip, TransferOptions};
use crate::pipette::{EMPTY_TOLERANCE, PipetteProfile, PipetteSpec};
use crate::plan::{TransferPlan, TransferRequest};
use crate::tips::TipSource;
use crate::version::ApiVersion;
use crate::volume::VolumeSpec;
use tracing::{info, trace, warn};

/// The pipetting primitives a plan's actions map onto.
pub trait Pipette: PipetteProfile {
    fn pick_up_tip(
        &mut self,
        location: Location,
        presses: Option<u32>,
        increment: Option<f64>,
    ) -> Result<(), PipetteError>;
    fn drop_tip(&mut self) -> Result<(), PipetteError>;
    fn return_tip(&mut self) -> Result<(), PipetteError>;
    fn aspirate(&mut self, volume: f64, location: Location, rate: f64)
    -> Result<(), PipetteError>;
    fn dispense(&mut self, volume: f64, location: Location, rate: f64)
    -> Result<(), PipetteError>;
    fn mix(
        &mut self,
        repetitions: Option<u32>,
        volume: Option<f64>,
        rate: Option<f64>,
        location: Location,
    ) -> Result<(), PipetteError>;
    fn air_gap(&mut self, volume: f64) -> Result<(), PipetteError>;
    fn touch_tip(
        &mut self,
        radius: Option<f64>,
        v_offset: Option<f64>,
        speed: Option<f64>,
    ) -> Result<(), PipetteError>;
    fn blow_out(&mut self, location: Location) -> Result<(), PipetteError>;

    /// Invokes the primitive named by `action`.
    fn dispatch(&mut self, action: &Action) -> Result<(), PipetteError> {
        match *action {
            Action::PickUpTip {
                location,
                presses,
                increment,
            } => self.pick_up_tip(location, presses, increment),
            Action::ReturnTip => self.return_tip(),
            Action::DropTip => self.drop_tip(),
            Action::Aspirate {
                volume,
                location,
                rate,
            } => self.aspirate(volume, location, rate),
            Action::Dispense {
                volume,
                location,
                rate,
            } => self.dispense(volume, location, rate),
            Action::Mix {
                repetitions,
                volume,
                rate,
                location,
            } => self.mix(repetitions, volume, rate, location),
            Action::AirGap { volume } => self.air_gap(volume),
            Action::TouchTip {
                radius,
                v_offset,
                speed,
            } => self.touch_tip(radius, v_offset, speed),
            Action::BlowOut { location } => self.blow_out(location),
        }
    }
}

/// Drives `plan` to completion against `pipette`, drawing tips from `tips`.
///
/// Returns the number of actions executed. Tips released with a return-tip are
/// handed back to `tips`.
pub fn execute_plan<P, T>(
    mut plan: TransferPlan,
    pipette: &mut P,
    tips: &mut T,
) -> Result<usize, ExecutionError>
where
    P: Pipette + ?Sized,
    T: TipSource + ?Sized,
{
    info!(mode = %plan.mode(), transfers = plan.volumes().len(), "starting liquid transfer");
    let mut executed = 0;
    let mut picked_from = None;
    loop {
        let action = match plan.next_action(pipette.state(), tips) {
            Ok(Some(action)) => action,
            Ok(None) => break,
            Err(err) => {
                if err.is_recoverable() {
                    warn!(executed, %err, "transfer paused: refill tips and retry");
                }
                return Err(err.into());
            }
        };
        pipette.dispatch(&action)?;
        match action {
            Action::PickUpTip { location, .. } => picked_from = Some(location),
            Action::ReturnTip => {
                if let Some(location) = picked_from.take() {
                    tips.return_tip(location, pipette.channels());
                }
            }
            _ => {}
        }
        executed += 1;
    }
    info!(executed, "liquid transfer finished");
    Ok(executed)
}

/// A pipette model held in memory: tracks the attached tip, the volume in it and
/// every action performed.
#[derive(Clone, Debug)]
pub struct SimulatedPipette {
    spec: PipetteSpec,
    has_tip: bool,
    current_volume: f64,
    tip_origin: Option<Location>,
    log: Vec<Action>,
}

impl SimulatedPipette {
    pub fn new(spec: PipetteSpec) -> Self {
        Self {
            spec,
            has_tip: false,
            current_volume: 0.0,
            tip_origin: None,
            log: Vec::new(),
        }
    }

    /// Starts with a tip already attached, for protocols that manage tips themselves.
    pub fn with_tip(mut self) -> Self {
        self.has_tip = true;
        self
    }

    pub fn spec(&self) -> &PipetteSpec {
        &self.spec
    }

    pub fn has_tip(&self) -> bool {
        self.has_tip
    }

    /// Where the attached tip was picked up from, if it came from a pick-up.
    pub fn tip_origin(&self) -> Option<Location> {
        self.tip_origin
    }

    /// Every action performed so far, in order.
    pub fn log(&self) -> &[Action] {
        &self.log
    }

    pub fn clear_log(&mut self) {
        self.log.clear();
    }

    fn require_tip(&self, action: &'static str) -> Result<(), PipetteError> {
        if self.has_tip {
            Ok(())
        } else {
            Err(PipetteError::NoTip { action })
        }
    }

    fn draw(&mut self, volume: f64) -> Result<(), PipetteError> {
        let available = self.spec.max_volume - self.current_volume;
        if volume > available + EMPTY_TOLERANCE {
            return Err(PipetteError::Overflow {
                requested: volume,
                available,
            });
        }
        self.current_volume += volume;
        Ok(())
    }

    fn record(&mut self, action: Action) {
        trace!(
            pipette = %self.spec.name,
            method = action.method(),
            current_volume = self.current_volume,
            "simulated"
        );
        self.log.push(action);
    }
}

impl PipetteProfile for SimulatedPipette {
    fn channels(&self) -> u8 {
        self.spec.channels
    }

    fn max_volume(&self) -> f64 {
        self.spec.max_volume
    }

    fn min_volume(&self) -> f64 {
        self.spec.min_volume
    }

    fn working_volume(&self) -> f64 {
        self.spec.working_volume
    }

    fn trash_location(&self) -> Location {
        self.spec.trash
    }

    fn current_volume(&self) -> f64 {
        self.current_volume
    }
}

impl Pipette for SimulatedPipette {
    fn pick_up_tip(
        &mut self,
        location: Location,
        presses: Option<u32>,
        increment: Option<f64>,
    ) -> Result<(), PipetteError> {
        if self.has_tip {
            return Err(PipetteError::TipAlreadyAttached);
        }
        self.has_tip = true;
        self.current_volume = 0.0;
        self.tip_origin = Some(location);
        self.record(Action::PickUpTip {
            location,
            presses,
            increment,
        });
        Ok(())
    }

    fn drop_tip(&mut self) -> Result<(), PipetteError> {
        self.require_tip("drop tip")?;
        self.has_tip = false;
        self.current_volume = 0.0;
        self.tip_origin = None;
        self.record(Action::DropTip);
        Ok(())
    }

    fn return_tip(&mut self) -> Result<(), PipetteError> {
        self.require_tip("return tip")?;
        if self.tip_origin.is_none() {
            return Err(PipetteError::NoReturnTarget);
        }
        self.has_tip = false;
        self.current_volume = 0.0;
        self.tip_origin = None;
        self.record(Action::ReturnTip);
        Ok(())
    }

    fn aspirate(
        &mut self,
        volume: f64,
        location: Location,
        rate: f64,
    ) -> Result<(), PipetteError> {
        self.require_tip("aspirate")?;
        self.draw(volume)?;
        self.record(Action::Aspirate {
            volume,
            location,
            rate,
        });
        Ok(())
    }

    fn dispense(
        &mut self,
        volume: f64,
        location: Location,
        rate: f64,
    ) -> Result<(), PipetteError> {
        self.require_tip("dispense")?;
        if volume > self.current_volume + EMPTY_TOLERANCE {
            return Err(PipetteError::Underflow {
                requested: volume,
                available: self.current_volume,
            });
        }
        self.current_volume -= volume;
        if self.current_volume < EMPTY_TOLERANCE {
            self.current_volume = 0.0;
        }
        self.record(Action::Dispense {
            volume,
            location,
            rate,
        });
        Ok(())
    }

    fn mix(
        &mut self,
        repetitions: Option<u32>,
        volume: Option<f64>,
        rate: Option<f64>,
        location: Location,
    ) -> Result<(), PipetteError> {
        self.require_tip("mix")?;
        let mix_volume = volume.unwrap_or(self.spec.max_volume);
        let available = self.spec.max_volume - self.current_volume;
        if mix_volume > available + EMPTY_TOLERANCE {
            return Err(PipetteError::Overflow {
                requested: mix_volume,
                available,
            });
        }
        self.record(Action::Mix {
            repetitions,
            volume,
            rate,
            location,
        });
        Ok(())
    }

    fn air_gap(&mut self, volume: f64) -> Result<(), PipetteError> {
        self.require_tip("air gap")?;
        self.draw(volume)?;
        self.record(Action::AirGap { volume });
        Ok(())
    }

    fn touch_tip(
        &mut self,
        radius: Option<f64>,
        v_offset: Option<f64>,
        speed: Option<f64>,
    ) -> Result<(), PipetteError> {
        self.require_tip("touch tip")?;
        self.record(Action::TouchTip {
            radius,
            v_offset,
            speed,
        });
        Ok(())
    }

    fn blow_out(&mut self, location: Location) -> Result<(), PipetteError> {
        self.require_tip("blow out")?;
        self.current_volume = 0.0;
        self.record(Action::BlowOut { location });
        Ok(())
    }
}

/// A pipette together with the tips it draws from.
///
/// Each call builds a plan sized to the tips actually in use and runs it to
/// completion before returning.
#[derive(Debug)]
pub struct LiquidHandler<P, T> {
    pipette: P,
    tips: T,
    api_version: ApiVersion,
}

impl<P: Pipette, T: TipSource> LiquidHandler<P, T> {
    pub fn new(pipette: P, tips: T) -> Self {
        Self {
            pipette,
            tips,
            api_version: ApiVersion::default(),
        }
    }

    /// Plans every call against `api_version` (builder pattern).
    pub fn with_api_version(mut self, api_version: ApiVersion) -> Self {
        self.api_version = api_version;
        self
    }

    pub fn pipette(&self) -> &P {
        &self.pipette
    }

    pub fn pipette_mut(&mut self) -> &mut P {
        &mut self.pipette
    }

    pub fn tips(&self) -> &T {
        &self.tips
    }

    pub fn tips_mut(&mut self) -> &mut T {
        &mut self.tips
    }

    pub fn into_parts(self) -> (P, T) {
        (self.pipette, self.tips)
    }

    /// The per-aspirate ceiling for a call with `options`.
    ///
    /// With managed tips this is the smaller of the pipette and tip maxima;
    /// under [`NewTip::Never`] the tip already attached is unknown, so the
    /// pipette's working volume is used.
    pub fn capacity(&self, options: &TransferOptions) -> f64 {
        match options.transfer.new_tip {
            NewTip::Never => self.pipette.working_volume(),
            NewTip::Once | NewTip::Always => {
                let pipette_max = self.pipette.max_volume();
                self.tips
                    .tip_max_volume()
                    .map_or(pipette_max, |tip_max| tip_max.min(pipette_max))
            }
        }
    }

    /// Moves `volume` from each source to its paired destination.
    pub fn transfer<S, D>(
        &mut self,
        volume: impl Into<VolumeSpec>,
        sources: impl IntoIterator<Item = S>,
        destinations: impl IntoIterator<Item = D>,
        options: TransferOptions,
    ) -> Result<usize, ExecutionError>
    where
        S: Into<Location>,
        D: Into<Location>,
    {
        let request = TransferRequest::new(volume, sources, destinations);
        self.run(request, options)
    }

    /// Moves `volume` from one source into each destination.
    ///
    /// The after-dispense mix is ignored. Blowing out into a destination while
    /// liquid is still meant for later destinations is rejected: that covers
    /// [`BlowOutStrategy::Dest`] and a custom location in a destination well.
    pub fn distribute<D: Into<Location>>(
        &mut self,
        volume: impl Into<VolumeSpec>,
        source: impl Into<Location>,
        destinations: impl IntoIterator<Item = D>,
        mut options: TransferOptions,
    ) -> Result<usize, ExecutionError> {
        let request = TransferRequest::distribute(volume, source, destinations);
        let blow_out = options.transfer.blow_out_strategy;
        let into_destination = match blow_out {
            BlowOutStrategy::Dest => true,
            BlowOutStrategy::CustomLocation(custom) => {
                request.destinations.iter().any(|d| d.well == custom.well)
            }
            BlowOutStrategy::None
            | BlowOutStrategy::Trash
            | BlowOutStrategy::DestIfEmpty
            | BlowOutStrategy::Source => false,
        };
        if into_destination {
            return Err(ValidationError::BlowOutLocation {
                command: "distribute",
                side: Side::Destination,
            }
            .into());
        }
        options.transfer.mix_strategy = options.transfer.mix_strategy.without_after();
        self.run(request, options)
    }

    /// Moves `volume` from each source into one destination.
    ///
    /// The before-aspirate mix and any disposal volume are ignored. Blowing out
    /// into a source is rejected.
    pub fn consolidate<S: Into<Location>>(
        &mut self,
        volume: impl Into<VolumeSpec>,
        sources: impl IntoIterator<Item = S>,
        destination: impl Into<Location>,
        mut options: TransferOptions,
    ) -> Result<usize, ExecutionError> {
        let request = TransferRequest::consolidate(volume, sources, destination);
        let into_source = match options.transfer.blow_out_strategy {
            BlowOutStrategy::Source => true,
            BlowOutStrategy::CustomLocation(custom) => {
                request.sources.iter().any(|s| s.well == custom.well)
            }
            BlowOutStrategy::None
            | BlowOutStrategy::Trash
            | BlowOutStrategy::DestIfEmpty
            | BlowOutStrategy::Dest => false,
        };
        if into_source {
            return Err(ValidationError::BlowOutLocation {
                command: "consolidate",
                side: Side::Source,
            }
            .into());
        }
        options.transfer.mix_strategy = options.transfer.mix_strategy.without_before();
        options.transfer.disposal_volume = Some(0.0);
        self.run(request, options)
    }

    fn run(
        &mut self,
        request: TransferRequest,
        options: TransferOptions,
    ) -> Result<usize, ExecutionError> {
        let request = request
            .with_max_volume(self.capacity(&options))
            .with_api_version(self.api_version);
        let plan = TransferPlan::new(request, &self.pipette, options)?;
        execute_plan(plan, &mut self.pipette, &mut self.tips)
    }
}
