//! Tip supply: the capability the planner consumes, and a rack-backed implementation.

use crate::error::OutOfTips;
use crate::location::{LabwareFormat, LabwareId, Location, Well};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

/// Yields the next usable tip location.
///
/// Every successful call permanently consumes the tips it returns.
pub trait TipSource {
    /// Reserves `channels` tips in one column and returns where to pick them up.
    fn next_tip(&mut self, channels: u8) -> Result<Location, OutOfTips>;

    /// Maximum volume of the tips that would be handed out next, if known.
    fn tip_max_volume(&self) -> Option<f64> {
        None
    }

    /// Takes back tips returned to `location` so they can be handed out again.
    fn return_tip(&mut self, _location: Location, _channels: u8) {}
}

/// A rack of tips with per-slot presence tracking.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TipRack {
    pub id: LabwareId,
    rows: u8,
    columns: u8,
    /// Maximum volume of the tips in this rack.
    pub tip_max_volume: f64,
    /// Column-major presence flags.
    present: Vec<bool>,
}

impl TipRack {
    /// A full rack of `rows` x `columns` tips.
    pub fn new(id: LabwareId, rows: u8, columns: u8, tip_max_volume: f64) -> Self {
        Self {
            id,
            rows,
            columns,
            tip_max_volume,
            present: vec![true; rows as usize * columns as usize],
        }
    }

    /// A full 8 x 12 rack.
    pub fn standard_96(id: LabwareId, tip_max_volume: f64) -> Self {
        Self::new(id, 8, 12, tip_max_volume)
    }

    fn format(&self) -> LabwareFormat {
        if self.rows == 8 && self.columns == 12 {
            LabwareFormat::Standard96
        } else {
            LabwareFormat::Irregular
        }
    }

    fn index(&self, row: u8, column: u8) -> usize {
        column as usize * self.rows as usize + row as usize
    }

    pub fn well(&self, row: u8, column: u8) -> Well {
        Well::new(self.id, self.format(), row, column)
    }

    pub fn has_tip(&self, row: u8, column: u8) -> bool {
        row < self.rows && column < self.columns && self.present[self.index(row, column)]
    }

    /// Number of tips still in the rack.
    pub fn remaining(&self) -> usize {
        self.present.iter().filter(|&&p| p).count()
    }

    /// Finds the first well, in column-major order, that starts a run of `num_tips`
    /// present tips within a single column.
    ///
    /// The search begins at `starting_tip` when it belongs to this rack.
    pub fn next_tip(&self, num_tips: u8, starting_tip: Option<Well>) -> Option<Well> {
        if num_tips == 0 || num_tips > self.rows {
            return None;
        }
        let start = starting_tip
            .filter(|w| w.labware == self.id)
            .map_or(0, |w| self.index(w.row, w.column));
        (start..self.present.len())
            .map(|idx| ((idx % self.rows as usize) as u8, (idx / self.rows as usize) as u8))
            .find(|&(row, column)| {
                u16::from(row) + u16::from(num_tips) <= u16::from(self.rows)
                    && (row..row + num_tips).all(|r| self.has_tip(r, column))
            })
            .map(|(row, column)| self.well(row, column))
    }

    /// Marks `num_tips` tips below `start_well` (inclusive) as used.
    pub fn use_tips(&mut self, start_well: Well, num_tips: u8) {
        self.set_column_run(start_well, num_tips, false);
    }

    /// Puts `num_tips` tips back starting at `start_well`.
    pub fn return_tips(&mut self, start_well: Well, num_tips: u8) {
        self.set_column_run(start_well, num_tips, true);
    }

    /// Treats every slot as holding an unused tip again.
    pub fn reset(&mut self) {
        self.present.fill(true);
    }

    fn set_column_run(&mut self, start_well: Well, num_tips: u8, value: bool) {
        if start_well.column >= self.columns {
            return;
        }
        let end = start_well.row.saturating_add(num_tips).min(self.rows);
        for row in start_well.row..end {
            let idx = self.index(row, start_well.column);
            self.present[idx] = value;
        }
    }
}

/// An ordered list of tip racks used by one pipette.
///
/// Racks are searched front to back. A starting tip skips every rack before the
/// one it belongs to.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TipRackSet {
    racks: Vec<TipRack>,
    starting_tip: Option<Well>,
}

impl TipRackSet {
    pub fn new(racks: Vec<TipRack>) -> Self {
        Self {
            racks,
            starting_tip: None,
        }
    }

    /// Begins the search at `well` instead of the first slot of the first rack.
    pub fn with_starting_tip(mut self, well: Well) -> Self {
        self.starting_tip = Some(well);
        self
    }

    pub fn racks(&self) -> &[TipRack] {
        &self.racks
    }

    pub fn racks_mut(&mut self) -> &mut [TipRack] {
        &mut self.racks
    }

    /// Total tips left across all racks.
    pub fn remaining(&self) -> usize {
        self.racks.iter().map(TipRack::remaining).sum()
    }

    /// Puts tips back after a return-tip.
    pub fn return_tips(&mut self, start_well: Well, num_tips: u8) {
        if let Some(rack) = self.racks.iter_mut().find(|r| r.id == start_well.labware) {
            rack.return_tips(start_well, num_tips);
        }
    }

    /// Refills every rack.
    pub fn reset(&mut self) {
        self.racks.iter_mut().for_each(TipRack::reset);
    }

    fn first_rack(&self) -> Option<usize> {
        match self.starting_tip {
            Some(start) => self.racks.iter().position(|r| r.id == start.labware),
            None => Some(0),
        }
    }
}

impl TipSource for TipRackSet {
    fn next_tip(&mut self, channels: u8) -> Result<Location, OutOfTips> {
        let first = self.first_rack().ok_or(OutOfTips { channels })?;
        let starting_tip = self.starting_tip;
        for (idx, rack) in self.racks.iter_mut().enumerate().skip(first) {
            let from = if idx == first { starting_tip } else { None };
            if let Some(well) = rack.next_tip(channels, from) {
                rack.use_tips(well, channels);
                trace!(rack = rack.id, tip = %well.name(), channels, "reserved tip");
                return Ok(well.location());
            }
            debug!(rack = rack.id, channels, "tip rack exhausted, moving to next rack");
        }
        Err(OutOfTips { channels })
    }

    fn tip_max_volume(&self) -> Option<f64> {
        let first = self.first_rack()?;
        self.racks
            .iter()
            .skip(first)
            .find(|r| r.remaining() > 0)
            .map(|r| r.tip_max_volume)
    }

    fn return_tip(&mut self, location: Location, channels: u8) {
        debug!(tip = %location.well.name(), channels, "tip returned to rack");
        self.return_tips(location.well, channels);
    }
}
