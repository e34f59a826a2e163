// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Port through which the host engine reports per-body speeds.
//!
//! Body identifiers are dense indices `0..body_count()`; the binning code never
//! sees body storage, only squared speeds.

/// Source of per-body squared velocities, indexed by body id.
pub trait BodyVelocities {
    /// Number of bodies currently in the simulation.
    fn body_count(&self) -> usize;
    /// Squared velocity of body `body` (`body < body_count()`).
    fn vel_sq(&self, body: usize) -> f64;
}

impl BodyVelocities for [f64] {
    fn body_count(&self) -> usize {
        self.len()
    }

    fn vel_sq(&self, body: usize) -> f64 {
        self[body]
    }
}

impl BodyVelocities for Vec<f64> {
    fn body_count(&self) -> usize {
        self.len()
    }

    fn vel_sq(&self, body: usize) -> f64 {
        self[body]
    }
}

/// Linear velocity vectors; the squared norm is computed on demand.
impl BodyVelocities for [[f64; 3]] {
    fn body_count(&self) -> usize {
        self.len()
    }

    fn vel_sq(&self, body: usize) -> f64 {
        let [x, y, z] = self[body];
        x * x + y * y + z * z
    }
}

/// Adapter turning a closure into a [`BodyVelocities`] source.
///
/// ```
/// use echo_velocity_bins::{BodyVelocities, FnVelocities};
///
/// let speeds = FnVelocities::new(4, |id| id as f64);
/// assert_eq!(speeds.body_count(), 4);
/// assert_eq!(speeds.vel_sq(3), 3.0);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct FnVelocities<F> {
    count: usize,
    f: F,
}

impl<F> FnVelocities<F>
where
    F: Fn(usize) -> f64,
{
    /// Wraps `f` as the velocity source for `count` bodies.
    pub const fn new(count: usize, f: F) -> Self {
        Self { count, f }
    }
}

impl<F> BodyVelocities for FnVelocities<F>
where
    F: Fn(usize) -> f64,
{
    fn body_count(&self) -> usize {
        self.count
    }

    fn vel_sq(&self, body: usize) -> f64 {
        (self.f)(body)
    }
}

/// Largest squared velocity over all bodies (`0.0` for an empty scene).
///
/// NaN entries are skipped.
pub fn max_vel_sq<B>(bodies: &B) -> f64
where
    B: BodyVelocities + ?Sized,
{
    (0..bodies.body_count())
        .map(|id| bodies.vel_sq(id))
        .fold(0.0, f64::max)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;

    #[test]
    fn vectors_report_squared_norm() {
        let vels: [[f64; 3]; 2] = [[3.0, 4.0, 0.0], [0.0, 0.0, -2.0]];
        assert_eq!(vels[..].vel_sq(0), 25.0);
        assert_eq!(vels[..].vel_sq(1), 4.0);
        assert_eq!(max_vel_sq(&vels[..]), 25.0);
    }

    #[test]
    fn empty_scene_has_zero_max() {
        let none: Vec<f64> = Vec::new();
        assert_eq!(max_vel_sq(&none), 0.0);
    }

    #[test]
    fn max_skips_nan() {
        let speeds = vec![1.0, f64::NAN, 9.0];
        assert_eq!(max_vel_sq(&speeds), 9.0);
    }
}
