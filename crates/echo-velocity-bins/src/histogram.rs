// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Diagnostics: rebin move counts and the per-bin population histogram.

use std::fmt;

use crate::bin::Bin;

/// Width of a full histogram bar, in characters.
pub const BAR_WIDTH: usize = 80;

/// Bodies that changed bin during one [`crate::VelocityBins::set_bins`].
///
/// Bodies classified for the first time are not counted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RebinStats {
    /// Bodies moved to a faster (lower-index) bin.
    pub moved_faster: usize,
    /// Bodies moved to a slower (higher-index) bin.
    pub moved_slower: usize,
}

/// One histogram line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HistogramRow {
    /// Bin index (0 = fastest).
    pub index: usize,
    /// Bodies in the bin.
    pub n_bodies: usize,
    /// Lower velocity bound (not squared).
    pub min_vel: f64,
    /// Upper velocity bound (not squared).
    pub max_vel: f64,
}

/// Snapshot of the bin population after a rebuild.
///
/// `Display` renders a summary line followed by one `#`-bar per bin scaled to
/// [`BAR_WIDTH`]:
///
/// ```text
/// 10 bodies (moves: 1 faster, 2 slower), refMaxVel=10
///     0: |########            ...| (1) 5…10
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct BinHistogram {
    /// Size of the body→bin map.
    pub total_bodies: usize,
    /// Moves performed by the rebuild this snapshot follows.
    pub moves: RebinStats,
    /// Reference velocity (not squared), `None` before the first rebuild.
    pub ref_max_vel: Option<f64>,
    /// One row per bin, fastest first.
    pub rows: Vec<HistogramRow>,
}

impl BinHistogram {
    pub(crate) fn capture(
        bins: &[Bin],
        total_bodies: usize,
        moves: RebinStats,
        ref_max_vel_sq: Option<f64>,
    ) -> Self {
        let rows = bins
            .iter()
            .enumerate()
            .map(|(index, bin)| HistogramRow {
                index,
                n_bodies: bin.n_bodies(),
                min_vel: bin.min_vel_sq().sqrt(),
                max_vel: bin.max_vel_sq().sqrt(),
            })
            .collect();
        Self {
            total_bodies,
            moves,
            ref_max_vel: ref_max_vel_sq.map(f64::sqrt),
            rows,
        }
    }

    /// Summary line (bodies, moves, reference velocity).
    pub fn summary(&self) -> String {
        format!(
            "{} bodies (moves: {} faster, {} slower), refMaxVel={}",
            self.total_bodies,
            self.moves.moved_faster,
            self.moves.moved_slower,
            self.ref_max_vel.unwrap_or(0.0)
        )
    }

    /// Bar length for `row`, proportional to its share of all bodies.
    pub fn bar_len(&self, row: &HistogramRow) -> usize {
        if self.total_bodies == 0 {
            return 0;
        }
        #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let len = (BAR_WIDTH as f64 * (row.n_bodies as f64 / self.total_bodies as f64)) as usize;
        len.min(BAR_WIDTH)
    }

    /// Renders the bar line for `row`.
    pub fn row_line(&self, row: &HistogramRow) -> String {
        let filled = self.bar_len(row);
        format!(
            "\t{}: |{}{}| ({}) {}…{}",
            row.index,
            "#".repeat(filled),
            " ".repeat(BAR_WIDTH - filled),
            row.n_bodies,
            row.min_vel,
            row.max_vel
        )
    }
}

impl fmt::Display for BinHistogram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.summary())?;
        for row in &self.rows {
            writeln!(f, "{}", self.row_line(row))?;
        }
        Ok(())
    }
}

/// Decides when the next histogram may be emitted.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct HistogramThrottle {
    last: Option<u64>,
}

impl HistogramThrottle {
    /// Returns `true` (and records `step`) if nothing was emitted yet or at
    /// least `interval` steps passed since the last emission.
    pub(crate) fn admit(&mut self, step: u64, interval: u64) -> bool {
        let due = self
            .last
            .is_none_or(|last| step.saturating_sub(last) >= interval);
        if due {
            self.last = Some(step);
        }
        due
    }
}
