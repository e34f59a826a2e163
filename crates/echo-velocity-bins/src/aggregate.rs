// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Per-bin maximum squared velocity, safe to combine from many workers.
//!
//! Two strategies share the same result:
//!
//! - **Atomic max**: every bin stores the bit pattern of a non-negative `f64`
//!   in an `AtomicU64`. For non-negative IEEE-754 doubles the unsigned order
//!   of the bit patterns equals the numeric order, so `fetch_max` on the bits
//!   is an exact lock-free maximum.
//! - **Partial maxima**: a worker fills a private [`VelSqPartial`] (one slot
//!   per bin) and folds it in once, touching the shared atomics `n_bins`
//!   times instead of once per body.
//!
//! Max is commutative and idempotent, so any interleaving of workers yields
//! the same per-bin values.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::BinsError;

/// Lock-free running maximum of non-negative squared velocities.
#[derive(Default)]
pub(crate) struct AtomicVelSq(AtomicU64);

impl AtomicVelSq {
    /// Current maximum.
    pub(crate) fn get(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Relaxed))
    }

    /// Resets to `0.0` (bit pattern zero).
    pub(crate) fn reset(&mut self) {
        *self.0.get_mut() = 0;
    }

    /// Raises the maximum to `vel_sq` if larger.
    ///
    /// `vel_sq` must already be sanitized to a non-negative, non-NaN value.
    pub(crate) fn raise(&self, vel_sq: f64) {
        debug_assert!(vel_sq >= 0.0, "unsanitized velSq {vel_sq}");
        self.0.fetch_max(vel_sq.to_bits(), Ordering::Relaxed);
    }
}

impl fmt::Debug for AtomicVelSq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.get(), f)
    }
}

/// Rejects NaN and maps negative inputs (and `-0.0`) to `+0.0`.
pub(crate) fn sanitize(body: usize, vel_sq: f64) -> Result<f64, BinsError> {
    if vel_sq.is_nan() {
        return Err(BinsError::NonFiniteVelocity { body });
    }
    Ok(if vel_sq > 0.0 { vel_sq } else { 0.0 })
}

/// Resolves the bin holding `body` from the body→bin map.
pub(crate) fn bin_index(body_bins: &[Option<usize>], body: usize) -> Result<usize, BinsError> {
    body_bins
        .get(body)
        .copied()
        .flatten()
        .ok_or(BinsError::UnassignedBody { body })
}

/// Worker-private per-bin maxima, merged with
/// [`crate::VelocityBins::merge_partial`].
///
/// Borrows the body→bin map, so reclassification cannot run while a partial
/// is alive.
#[derive(Debug, Clone)]
pub struct VelSqPartial<'a> {
    body_bins: &'a [Option<usize>],
    maxima: Vec<f64>,
}

impl<'a> VelSqPartial<'a> {
    pub(crate) fn new(body_bins: &'a [Option<usize>], n_bins: usize) -> Self {
        Self {
            body_bins,
            maxima: vec![0.0; n_bins],
        }
    }

    /// Records `vel_sq` for `body` in this worker's buffer.
    pub fn use_body(&mut self, body: usize, vel_sq: f64) -> Result<(), BinsError> {
        let vel_sq = sanitize(body, vel_sq)?;
        let bin = bin_index(self.body_bins, body)?;
        if let Some(slot) = self.maxima.get_mut(bin) {
            if vel_sq > *slot {
                *slot = vel_sq;
            }
        }
        Ok(())
    }

    /// Per-bin maxima collected so far.
    pub fn maxima(&self) -> &[f64] {
        &self.maxima
    }

    pub(crate) fn into_maxima(self) -> Vec<f64> {
        self.maxima
    }
}
