//! The transfer plan: validates a request and yields pipetting actions one at a time.
//!
//! The entry point is [`TransferPlan`]. Build one from a [`TransferRequest`], a
//! [`PipetteProfile`] and [`TransferOptions`], then repeatedly call
//! [`TransferPlan::next_action`] with the pipette state observed *after*
//! executing the previous action.
//!
//! # Lazy hooks
//!
//! Mixing and blowing out depend on whether the tip is empty at that moment,
//! which is only known once the driver has executed the preceding aspirate or
//! dispense. The plan therefore resolves those decisions at the moment they
//! are reached, never ahead of the driver. A plan is single-pass: once
//! exhausted, or after it returns an error, it yields nothing further.

use crate::action::Action;
use crate::error::{PlanError, Result, Side, ValidationError};
use crate::location::{LabwareFormat, Location, Well};
use crate::modes::{self, ModeParams, Stage};
use crate::options::{
    BlowOutStrategy, DropTipStrategy, MixOpts, NewTip, TouchTipStrategy, TransferOptions,
};
use crate::pipette::{PipetteProfile, PipetteState};
use crate::tips::TipSource;
use crate::version::ApiVersion;
use crate::volume::VolumeSpec;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use tracing::{debug, trace};

/// How sources map onto destinations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransferMode {
    /// One-to-one: source `i` feeds destination `i`.
    Transfer,
    /// One source, many destinations, several dispenses per aspirate.
    Distribute,
    /// Many sources, one destination, several aspirates per dispense.
    Consolidate,
}

impl TransferMode {
    /// Chooses a mode from list lengths when none is given explicitly.
    pub fn infer(sources: usize, destinations: usize) -> Self {
        match sources.cmp(&destinations) {
            std::cmp::Ordering::Less => TransferMode::Distribute,
            std::cmp::Ordering::Greater => TransferMode::Consolidate,
            std::cmp::Ordering::Equal => TransferMode::Transfer,
        }
    }
}

impl fmt::Display for TransferMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferMode::Transfer => f.write_str("transfer"),
            TransferMode::Distribute => f.write_str("distribute"),
            TransferMode::Consolidate => f.write_str("consolidate"),
        }
    }
}

/// What to move, from where, to where.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransferRequest {
    pub volume: VolumeSpec,
    pub sources: Vec<Location>,
    pub destinations: Vec<Location>,
    /// `None` infers the mode from the list lengths.
    pub mode: Option<TransferMode>,
    /// Capacity of the tip in use. `None` uses the pipette's working volume.
    pub max_volume: Option<f64>,
    pub api_version: ApiVersion,
}

impl TransferRequest {
    pub fn new<S, D>(
        volume: impl Into<VolumeSpec>,
        sources: impl IntoIterator<Item = S>,
        destinations: impl IntoIterator<Item = D>,
    ) -> Self
    where
        S: Into<Location>,
        D: Into<Location>,
    {
        Self {
            volume: volume.into(),
            sources: sources.into_iter().map(Into::into).collect(),
            destinations: destinations.into_iter().map(Into::into).collect(),
            mode: None,
            max_volume: None,
            api_version: ApiVersion::default(),
        }
    }

    /// One-to-one transfer between paired lists.
    pub fn transfer<S, D>(
        volume: impl Into<VolumeSpec>,
        sources: impl IntoIterator<Item = S>,
        destinations: impl IntoIterator<Item = D>,
    ) -> Self
    where
        S: Into<Location>,
        D: Into<Location>,
    {
        Self::new(volume, sources, destinations).with_mode(TransferMode::Transfer)
    }

    /// One source to many destinations.
    pub fn distribute<D: Into<Location>>(
        volume: impl Into<VolumeSpec>,
        source: impl Into<Location>,
        destinations: impl IntoIterator<Item = D>,
    ) -> Self {
        Self::new(volume, [source.into()], destinations).with_mode(TransferMode::Distribute)
    }

    /// Many sources to one destination.
    pub fn consolidate<S: Into<Location>>(
        volume: impl Into<VolumeSpec>,
        sources: impl IntoIterator<Item = S>,
        destination: impl Into<Location>,
    ) -> Self {
        Self::new(volume, sources, [destination.into()]).with_mode(TransferMode::Consolidate)
    }

    pub fn with_mode(mut self, mode: TransferMode) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn with_max_volume(mut self, max_volume: f64) -> Self {
        self.max_volume = Some(max_volume);
        self
    }

    pub fn with_api_version(mut self, api_version: ApiVersion) -> Self {
        self.api_version = api_version;
        self
    }
}

/// Static pipette capabilities captured when the plan is built.
#[derive(Clone, Copy, Debug, PartialEq)]
struct PipetteCaps {
    channels: u8,
    min_volume: f64,
    max_volume: f64,
    working_volume: f64,
    trash: Location,
}

impl PipetteCaps {
    fn of<P: PipetteProfile + ?Sized>(pipette: &P) -> Self {
        Self {
            channels: pipette.channels(),
            min_volume: pipette.min_volume(),
            max_volume: pipette.max_volume(),
            working_volume: pipette.working_volume(),
            trash: pipette.trash_location(),
        }
    }
}

/// A validated, single-pass plan for one transfer, distribute or consolidate call.
#[derive(Debug)]
pub struct TransferPlan {
    mode: TransferMode,
    sources: Vec<Location>,
    destinations: Vec<Location>,
    volumes: Vec<f64>,
    options: TransferOptions,
    params: ModeParams,
    pipette: PipetteCaps,
    stages: VecDeque<Stage>,
    pending: VecDeque<Action>,
    halted: bool,
}

impl TransferPlan {
    /// Validates `request` against `pipette` and `options` and lays out the plan.
    ///
    /// All validation happens here, so a plan that constructs successfully can
    /// only fail later with [`PlanError::OutOfTips`].
    ///
    /// # Errors
    ///
    /// - [`ValidationError`] for bad option values, a volume list of the wrong
    ///   length, or non-divisible source/destination lists in transfer mode.
    /// - [`PlanError::Structural`] when a multichannel cannot reach any of the
    ///   requested wells on one side.
    pub fn new<P: PipetteProfile + ?Sized>(
        request: TransferRequest,
        pipette: &P,
        options: TransferOptions,
    ) -> Result<Self> {
        options.validate()?;
        let caps = PipetteCaps::of(pipette);
        let TransferRequest {
            volume,
            sources,
            destinations,
            mode,
            max_volume,
            api_version,
        } = request;

        let max_volume = crate::options::positive(
            "max_volume",
            max_volume.unwrap_or(caps.working_volume),
        )?;
        let air_gap = options.transfer.air_gap;
        if !(0.0..caps.working_volume).contains(&air_gap) {
            return Err(ValidationError::AirGapOutOfRange {
                air_gap,
                working_volume: caps.working_volume,
            }
            .into());
        }

        if sources.is_empty() {
            return Err(ValidationError::EmptyWellList { side: Side::Source }.into());
        }
        if destinations.is_empty() {
            return Err(ValidationError::EmptyWellList {
                side: Side::Destination,
            }
            .into());
        }
        let (sources, destinations) = if caps.channels > 1 {
            (
                multichannel_wells(sources, Side::Source, api_version)?,
                multichannel_wells(destinations, Side::Destination, api_version)?,
            )
        } else {
            (sources, destinations)
        };

        let total_transfers = sources.len().max(destinations.len());
        let volumes =
            volume.to_volume_list(total_transfers, &options.transfer.gradient_function)?;
        let mode = mode.unwrap_or_else(|| TransferMode::infer(sources.len(), destinations.len()));

        let disposal_volume = match mode {
            TransferMode::Consolidate => {
                if options.transfer.disposal_volume.is_some_and(|v| v > 0.0) {
                    debug!("consolidate never disposes; ignoring disposal volume");
                }
                0.0
            }
            TransferMode::Distribute => options.transfer.disposal_volume.unwrap_or(caps.min_volume),
            TransferMode::Transfer => options.transfer.disposal_volume.unwrap_or(0.0),
        };

        let capacity = max_volume.min(caps.max_volume);
        if disposal_volume + air_gap >= capacity {
            return Err(ValidationError::DisposalAndAirGapExceedCapacity {
                disposal_volume,
                air_gap,
                capacity,
            }
            .into());
        }

        let new_tip = match (mode, options.transfer.new_tip) {
            (TransferMode::Distribute | TransferMode::Consolidate, NewTip::Always) => {
                debug!(%mode, "new tip for every transfer is not supported here; using one tip");
                NewTip::Once
            }
            (_, policy) => policy,
        };

        let params = ModeParams {
            capacity,
            disposal_volume,
            air_gap,
            new_tip,
            skip_zero_volume: api_version >= ApiVersion::SKIP_ZERO_VOLUME,
        };

        if !options.transfer.carryover {
            let ceiling = match mode {
                TransferMode::Transfer | TransferMode::Distribute => params.liquid_ceiling(),
                TransferMode::Consolidate => params.consolidate_ceiling(),
            };
            if let Some(&volume) = volumes.iter().find(|&&v| v > ceiling) {
                return Err(ValidationError::CarryoverDisabled {
                    volume,
                    capacity: ceiling,
                }
                .into());
            }
        }

        let body = match mode {
            TransferMode::Transfer => {
                modes::plan_transfer(&volumes, &sources, &destinations, &params)?
            }
            TransferMode::Distribute => {
                modes::plan_distribute(&volumes, sources[0], &destinations, &params)
            }
            TransferMode::Consolidate => {
                modes::plan_consolidate(&volumes, &sources, destinations[0], &params)
            }
        };

        let mut stages = VecDeque::with_capacity(body.len() + 2);
        if new_tip == NewTip::Once {
            stages.push_back(Stage::PickUpTip);
        }
        stages.extend(body);
        if new_tip == NewTip::Once {
            stages.push_back(Stage::ReleaseTip);
        }

        debug!(
            %mode,
            transfers = total_transfers,
            capacity,
            disposal_volume,
            air_gap,
            stages = stages.len(),
            "planned liquid transfer"
        );

        Ok(Self {
            mode,
            sources,
            destinations,
            volumes,
            options,
            params,
            pipette: caps,
            stages,
            pending: VecDeque::new(),
            halted: false,
        })
    }

    pub fn mode(&self) -> TransferMode {
        self.mode
    }

    /// Per-transfer volumes before capacity splitting.
    pub fn volumes(&self) -> &[f64] {
        &self.volumes
    }

    /// Sources after multichannel filtering.
    pub fn sources(&self) -> &[Location] {
        &self.sources
    }

    /// Destinations after multichannel filtering.
    pub fn destinations(&self) -> &[Location] {
        &self.destinations
    }

    pub fn options(&self) -> &TransferOptions {
        &self.options
    }

    /// The most the tip may hold at once: the smaller of the requested max volume
    /// and the pipette's max volume.
    pub fn capacity(&self) -> f64 {
        self.params.capacity
    }

    /// Disposal volume after applying the mode default.
    pub fn disposal_volume(&self) -> f64 {
        self.params.disposal_volume
    }

    /// Tip policy after mode-specific downgrades.
    pub fn new_tip(&self) -> NewTip {
        self.params.new_tip
    }

    /// True once every action has been handed out, or after an error.
    pub fn is_finished(&self) -> bool {
        self.halted || (self.pending.is_empty() && self.stages.is_empty())
    }

    /// Produces the next action, or `None` when the plan is exhausted.
    ///
    /// `observed` must reflect the pipette *after* the previously returned action
    /// was executed. `tips` is consulted only when a pick-up is reached.
    ///
    /// # Errors
    ///
    /// [`PlanError::OutOfTips`] when the tip source is exhausted. The plan is
    /// halted afterwards and must not be resumed.
    pub fn next_action<T: TipSource + ?Sized>(
        &mut self,
        observed: PipetteState,
        tips: &mut T,
    ) -> Result<Option<Action>> {
        loop {
            if let Some(action) = self.pending.pop_front() {
                trace!(method = action.method(), volume = ?action.volume(), "next action");
                return Ok(Some(action));
            }
            if self.halted {
                return Ok(None);
            }
            let Some(stage) = self.stages.pop_front() else {
                return Ok(None);
            };
            if let Err(err) = self.resolve(stage, observed, tips) {
                self.halted = true;
                self.stages.clear();
                return Err(err);
            }
        }
    }

    fn resolve<T: TipSource + ?Sized>(
        &mut self,
        stage: Stage,
        observed: PipetteState,
        tips: &mut T,
    ) -> Result<()> {
        match stage {
            Stage::PickUpTip => {
                let opts = self.options.pick_up_tip;
                let location = match opts.location {
                    Some(location) => location,
                    None => tips.next_tip(self.pipette.channels)?,
                };
                self.pending.push_back(Action::PickUpTip {
                    location,
                    presses: opts.presses,
                    increment: opts.increment,
                });
            }
            Stage::ReleaseTip => {
                let action = match self.options.transfer.drop_tip_strategy {
                    DropTipStrategy::Trash => Action::DropTip,
                    DropTipStrategy::Return => Action::ReturnTip,
                };
                self.pending.push_back(action);
            }
            Stage::BeforeAspirate { location } => {
                if self.options.transfer.mix_strategy.mixes_before() && observed.is_empty() {
                    self.push_mix(self.options.mix.before, location);
                }
            }
            Stage::Aspirate { volume, location } => {
                self.pending.push_back(Action::Aspirate {
                    volume,
                    location,
                    rate: self.options.aspirate.rate,
                });
                self.push_air_gap();
                self.push_touch_tip();
            }
            Stage::Dispense { volume, location } => {
                self.pending.push_back(Action::Dispense {
                    volume: volume + self.params.air_gap,
                    location,
                    rate: self.options.dispense.rate,
                });
            }
            Stage::AfterDispense {
                location,
                source,
                dispense_next,
            } => self.after_dispense(location, source, dispense_next, observed),
        }
        Ok(())
    }

    fn after_dispense(
        &mut self,
        location: Location,
        source: Location,
        dispense_next: bool,
        observed: PipetteState,
    ) {
        if dispense_next {
            // Travelling to the next destination with the same tip.
            self.push_air_gap();
            self.push_touch_tip();
            return;
        }

        let blow_out = self.options.transfer.blow_out_strategy;
        if observed.is_empty() {
            if self.options.transfer.mix_strategy.mixes_after() {
                self.push_mix(self.options.mix.after, location);
            }
            if blow_out == BlowOutStrategy::DestIfEmpty {
                self.pending.push_back(Action::BlowOut { location });
            }
        }
        self.push_touch_tip();

        match blow_out {
            BlowOutStrategy::Trash => self.pending.push_back(Action::BlowOut {
                location: self.pipette.trash,
            }),
            BlowOutStrategy::Source => self.pending.push_back(Action::BlowOut { location: source }),
            BlowOutStrategy::Dest => self.pending.push_back(Action::BlowOut { location }),
            BlowOutStrategy::CustomLocation(custom) => {
                self.pending.push_back(Action::BlowOut { location: custom })
            }
            BlowOutStrategy::None | BlowOutStrategy::DestIfEmpty => {
                if self.params.disposal_volume > 0.0 {
                    self.pending.push_back(Action::BlowOut {
                        location: self.pipette.trash,
                    });
                }
            }
        }
    }

    fn push_mix(&mut self, opts: MixOpts, location: Location) {
        self.pending.push_back(Action::Mix {
            repetitions: opts.repetitions,
            volume: opts.volume,
            rate: opts.rate,
            location,
        });
    }

    fn push_air_gap(&mut self) {
        if self.params.air_gap > 0.0 {
            self.pending.push_back(Action::AirGap {
                volume: self.params.air_gap,
            });
        }
    }

    fn push_touch_tip(&mut self) {
        match self.options.transfer.touch_tip_strategy {
            TouchTipStrategy::Always => {
                let opts = self.options.touch_tip;
                self.pending.push_back(Action::TouchTip {
                    radius: opts.radius,
                    v_offset: opts.v_offset,
                    speed: opts.speed,
                });
            }
            TouchTipStrategy::Never => {}
        }
    }
}

/// Whether every channel of a multichannel can reach `well` at once.
///
/// Only the first row is reachable, except on 384-well plates where the
/// interleaved nozzles also reach the second row from API 2.2.
pub fn multichannel_accessible(well: &Well, api_version: ApiVersion) -> bool {
    if api_version < ApiVersion::MULTICHANNEL_384_ROWS {
        return well.row == 0;
    }
    match well.format {
        LabwareFormat::Standard384 => well.row < 2,
        LabwareFormat::Standard96
        | LabwareFormat::Reservoir
        | LabwareFormat::Trash
        | LabwareFormat::Irregular => well.row == 0,
    }
}

fn multichannel_wells(
    wells: Vec<Location>,
    side: Side,
    api_version: ApiVersion,
) -> Result<Vec<Location>> {
    let total = wells.len();
    let (kept, rejected): (Vec<Location>, Vec<Location>) = wells
        .into_iter()
        .partition(|loc| multichannel_accessible(&loc.well, api_version));
    if kept.is_empty() {
        return Err(PlanError::Structural {
            side,
            wells: rejected.iter().map(|loc| loc.well.name()).collect(),
            reason: format!(
                "The multichannel can only access row A, or rows A and B of 384-well plates \
                 (API {} or greater; this protocol uses {}).",
                ApiVersion::MULTICHANNEL_384_ROWS,
                api_version
            ),
        });
    }
    if kept.len() < total {
        debug!(%side, skipped = total - kept.len(), "skipping wells a multichannel cannot reach");
    }
    Ok(kept)
}
