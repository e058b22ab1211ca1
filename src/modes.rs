//! Stage builders for the three planning modes.
//!
//! A mode planner decides *what* gets aspirated and dispensed, and in which
//! groups. It does not decide the side behaviours (mix, blow-out, touch tip),
//! because those depend on the live pipette state. Those are left as
//! [`Stage::BeforeAspirate`] / [`Stage::AfterDispense`] markers that
//! [`TransferPlan`](crate::TransferPlan) resolves lazily.

use crate::error::ValidationError;
use crate::location::Location;
use crate::options::NewTip;
use crate::volume::expand_for_volume_constraints;

/// One step of a plan before hooks are resolved into concrete actions.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Stage {
    PickUpTip,
    /// Drop or return, per the drop-tip strategy.
    ReleaseTip,
    /// Mix-before check. Reads the live volume.
    BeforeAspirate { location: Location },
    /// Aspirate plus the static after-aspirate actions (air gap, touch tip).
    Aspirate { volume: f64, location: Location },
    /// Dispense of `volume` liquid; the pending air gap is added on top.
    Dispense { volume: f64, location: Location },
    /// After-dispense hooks. Reads the live volume unless another dispense follows.
    ///
    /// `source` is where the liquid just dispensed was last aspirated from.
    AfterDispense {
        location: Location,
        source: Location,
        dispense_next: bool,
    },
}

/// Resolved numbers shared by the mode planners.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct ModeParams {
    /// Hard ceiling on what the tip may hold at once.
    pub capacity: f64,
    pub disposal_volume: f64,
    pub air_gap: f64,
    /// Effective policy after mode-specific downgrades.
    pub new_tip: NewTip,
    /// Drop zero-volume sub-transfers instead of planning empty moves.
    pub skip_zero_volume: bool,
}

impl ModeParams {
    /// Largest single aspirate for transfer and distribute.
    pub fn liquid_ceiling(&self) -> f64 {
        self.capacity - self.disposal_volume - self.air_gap
    }

    /// Largest single aspirate for consolidate, which reserves room for its air gap.
    pub fn consolidate_ceiling(&self) -> f64 {
        self.capacity - self.air_gap
    }

    fn keeps(&self, volume: f64) -> bool {
        !(self.skip_zero_volume && volume == 0.0)
    }
}

fn push_aspirate(stages: &mut Vec<Stage>, volume: f64, location: Location) {
    stages.push(Stage::BeforeAspirate { location });
    stages.push(Stage::Aspirate { volume, location });
}

fn push_dispense(
    stages: &mut Vec<Stage>,
    volume: f64,
    location: Location,
    source: Location,
    dispense_next: bool,
) {
    stages.push(Stage::Dispense { volume, location });
    stages.push(Stage::AfterDispense {
        location,
        source,
        dispense_next,
    });
}

/// Extends the shorter list so both match the longer one, repeating each element in place.
///
/// `[a, b]` against four targets becomes `[a, a, b, b]`. Fails when the longer
/// length is not a whole multiple of the shorter one.
pub fn extend_source_target_lists<T: Clone>(
    sources: &[T],
    targets: &[T],
) -> Result<(Vec<T>, Vec<T>), ValidationError> {
    let indivisible = || ValidationError::IndivisibleLists {
        sources: sources.len(),
        destinations: targets.len(),
    };
    let repeat = |items: &[T], times: usize| -> Vec<T> {
        items
            .iter()
            .flat_map(|item| std::iter::repeat_n(item.clone(), times))
            .collect()
    };
    if sources.is_empty() || targets.is_empty() {
        return Err(indivisible());
    }
    if sources.len() < targets.len() {
        if targets.len() % sources.len() != 0 {
            return Err(indivisible());
        }
        Ok((repeat(sources, targets.len() / sources.len()), targets.to_vec()))
    } else if sources.len() > targets.len() {
        if sources.len() % targets.len() != 0 {
            return Err(indivisible());
        }
        Ok((sources.to_vec(), repeat(targets, sources.len() / targets.len())))
    } else {
        Ok((sources.to_vec(), targets.to_vec()))
    }
}

/// Splits `items` into consecutive groups, closing a group when `fits(total, count, next)`
/// fails for the next item. A group always takes at least one item.
fn group_consecutive<T>(
    items: &[(f64, T)],
    fits: impl Fn(f64, usize, f64) -> bool,
) -> Vec<&[(f64, T)]> {
    let mut groups = Vec::new();
    let mut start = 0;
    let mut total = 0.0;
    for (idx, (volume, _)) in items.iter().enumerate() {
        let count = idx - start;
        if count > 0 && !fits(total, count, *volume) {
            groups.push(&items[start..idx]);
            start = idx;
            total = 0.0;
        }
        total += volume;
    }
    if start < items.len() {
        groups.push(&items[start..]);
    }
    groups
}

/// One-to-one: each source feeds its paired destination.
pub(crate) fn plan_transfer(
    volumes: &[f64],
    sources: &[Location],
    destinations: &[Location],
    params: &ModeParams,
) -> Result<Vec<Stage>, ValidationError> {
    let (sources, destinations) = extend_source_target_lists(sources, destinations)?;
    let max_vol = params.liquid_ceiling();
    let pairs = sources.into_iter().zip(destinations);
    let plan = expand_for_volume_constraints(volumes.iter().copied(), pairs, max_vol);

    let mut stages = Vec::new();
    for (step_vol, (src, dest)) in plan {
        if !params.keeps(step_vol) {
            continue;
        }
        if params.new_tip == NewTip::Always {
            stages.push(Stage::PickUpTip);
        }
        let mut transferred = 0.0;
        while transferred < step_vol {
            let vol = max_vol.min(step_vol - transferred);
            push_aspirate(&mut stages, vol, src);
            push_dispense(&mut stages, vol, dest, src, false);
            transferred += vol;
        }
        if params.new_tip == NewTip::Always {
            stages.push(Stage::ReleaseTip);
        }
    }
    Ok(stages)
}

/// One-to-many: fill the tip from `source` once per group, then visit each destination.
pub(crate) fn plan_distribute(
    volumes: &[f64],
    source: Location,
    destinations: &[Location],
    params: &ModeParams,
) -> Vec<Stage> {
    let items: Vec<(f64, Location)> = expand_for_volume_constraints(
        volumes.iter().copied(),
        destinations.iter().copied(),
        params.liquid_ceiling(),
    )
    .into_iter()
    .filter(|(volume, _)| params.keeps(*volume))
    .collect();

    let groups = group_consecutive(&items, |total, _, next| {
        total + params.disposal_volume + params.air_gap + next <= params.capacity
    });

    let mut stages = Vec::new();
    for group in groups {
        let total: f64 = group.iter().map(|(volume, _)| volume).sum();
        push_aspirate(&mut stages, total + params.disposal_volume, source);
        for (idx, (volume, dest)) in group.iter().enumerate() {
            push_dispense(&mut stages, *volume, *dest, source, idx + 1 < group.len());
        }
    }
    stages
}

/// Many-to-one: collect from several sources into the tip, then empty it into `destination`.
pub(crate) fn plan_consolidate(
    volumes: &[f64],
    sources: &[Location],
    destination: Location,
    params: &ModeParams,
) -> Vec<Stage> {
    let items: Vec<(f64, Location)> = expand_for_volume_constraints(
        volumes.iter().copied(),
        sources.iter().copied(),
        params.consolidate_ceiling(),
    )
    .into_iter()
    .filter(|(volume, _)| params.keeps(*volume))
    .collect();

    // Each member carries its own air gap; reserve room for the candidate's too.
    let groups = group_consecutive(&items, |total, count, next| {
        total + params.air_gap * (count + 1) as f64 + next <= params.capacity
    });

    let mut stages = Vec::new();
    for group in groups {
        for (volume, src) in group {
            push_aspirate(&mut stages, *volume, *src);
        }
        // The dispense stage adds the last air gap itself.
        let liquid: f64 = group.iter().map(|(volume, _)| volume).sum();
        let gaps = params.air_gap * (group.len() - 1) as f64;
        let last_source = group[group.len() - 1].1;
        push_dispense(&mut stages, liquid + gaps, destination, last_source, false);
    }
    stages
}
