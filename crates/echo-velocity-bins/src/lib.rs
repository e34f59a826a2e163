// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
#![deny(
    warnings,
    clippy::all,
    clippy::pedantic,
    rust_2018_idioms,
    missing_docs,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic
)]
#![doc = r"Velocity bins for Echo's broad phase.

Rebuilding the broad phase every step is wasteful when most bodies barely
move. This crate groups bodies into speed-ordered bins; each bin carries a
displacement budget derived from the sweep margin the broad phase pads
bounding volumes with. Every step the host reports per-body speeds, each bin
accumulates a pessimistic displacement estimate, and a rebuild is requested
only once some bin exhausts its budget.

This crate provides:
- `VelocityBins`: classification, displacement accumulation and the trigger.
- `BinsConfig`: serde-backed tunables with validation.
- `BodyVelocities`: the port through which the host supplies squared speeds.
- Lock-free and map-reduce aggregation of per-bin maxima for parallel hosts.

Design notes:
- Bins shrink geometrically (`bin_coeff²` in squared speed); slow bins get
  large budgets and rarely trigger.
- The reference speed that sizes bins moves by a bounded relative step per
  rebuild, so one runaway body cannot reshuffle the whole scene.
- Errors are values (`BinsError`) split into configuration, invariant and
  usage kinds; nothing here aborts the process.

```
use echo_velocity_bins::{BinsConfig, VelocityBins};

let speeds_sq = vec![100.0, 20.0, 1.0];
let mut bins = VelocityBins::try_new(BinsConfig { n_bins: 3, bin_coeff: 2.0, ..BinsConfig::default() })?;
bins.set_bins(&speeds_sq, 100.0, 1.0)?;

bins.bin_vel_sq_initialize();
for (body, &v) in speeds_sq.iter().enumerate() {
    bins.bin_vel_sq_use(body, v)?;
}
bins.bin_vel_sq_finalize();
let rebuild = bins.increment_dists_should_collide(0.01);
assert!(!rebuild);
# Ok::<(), echo_velocity_bins::BinsError>(())
```
"]

/// Per-bin maxima aggregation (atomic and per-worker).
pub mod aggregate;
/// Speed bucket record.
pub mod bin;
/// The bins owner: classification, accumulation, trigger.
pub mod bins;
/// Tunables and validation.
pub mod config;
/// Error type.
pub mod error;
/// Diagnostic histogram.
pub mod histogram;
/// Host velocity port.
pub mod velocity;

pub use aggregate::VelSqPartial;
pub use bin::Bin;
pub use bins::VelocityBins;
pub use config::BinsConfig;
pub use error::{BinsError, ErrorKind};
pub use histogram::{BinHistogram, HistogramRow, RebinStats};
pub use velocity::{max_vel_sq, BodyVelocities, FnVelocities};
