// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Tunables for velocity binning.

use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::error::BinsError;

/// Smallest accepted bin count.
pub const MIN_BINS: usize = 1;
/// Largest accepted bin count.
pub const MAX_BINS: usize = 100;
/// Hysteresis fraction substituted when the configured one is out of range.
pub const DEFAULT_BIN_OVERLAP: f64 = 0.8;

/// Configuration for [`crate::VelocityBins`].
///
/// Deserializes from partial documents; missing fields take their defaults.
///
/// ```
/// use echo_velocity_bins::BinsConfig;
///
/// let mut cfg = BinsConfig { n_bins: 3, bin_coeff: 2.0, ..BinsConfig::default() };
/// cfg.validate().unwrap();
/// assert_eq!(cfg.bin_overlap, 0.8);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BinsConfig {
    /// Number of bins, ordered fastest to slowest. Must lie in `[1, 100]`.
    pub n_bins: usize,
    /// Geometric ratio between neighboring bins' velocities (`> 1`).
    ///
    /// Squared-velocity limits shrink by `bin_coeff²` per bin; displacement
    /// budgets shrink by `bin_coeff`.
    pub bin_coeff: f64,
    /// Hysteresis fraction in `(0, 1)`: a body already in bin `i` stays there
    /// while its squared velocity is above `bin_overlap²` times the bin minimum.
    pub bin_overlap: f64,
    /// Largest relative change of the reference velocity per rebuild, `[0, 1)`.
    pub max_ref_rel_step: f64,
    /// Minimum number of steps between two debug histograms.
    pub hist_interval: u64,
}

impl Default for BinsConfig {
    fn default() -> Self {
        Self {
            n_bins: 5,
            bin_coeff: 5.0,
            bin_overlap: DEFAULT_BIN_OVERLAP,
            max_ref_rel_step: 0.3,
            hist_interval: 100,
        }
    }
}

impl BinsConfig {
    /// Checks the configuration, correcting what can be corrected.
    ///
    /// An out-of-range `bin_overlap` is reset to [`DEFAULT_BIN_OVERLAP`] with a
    /// warning. Bin count, bin coefficient and reference step violations are
    /// returned as [`crate::ErrorKind::Configuration`] errors.
    pub fn validate(&mut self) -> Result<(), BinsError> {
        if !(MIN_BINS..=MAX_BINS).contains(&self.n_bins) {
            error!(n_bins = self.n_bins, "Number of bins must be >=1 and <=100");
            return Err(BinsError::InvalidBinCount {
                n_bins: self.n_bins,
            });
        }
        if !(self.bin_coeff.is_finite() && self.bin_coeff > 1.0) {
            error!(bin_coeff = self.bin_coeff, "bin coefficient must be > 1");
            return Err(BinsError::InvalidBinCoeff {
                bin_coeff: self.bin_coeff,
            });
        }
        if !(self.max_ref_rel_step.is_finite() && (0.0..1.0).contains(&self.max_ref_rel_step)) {
            error!(
                step = self.max_ref_rel_step,
                "max reference relative step must be in [0, 1)"
            );
            return Err(BinsError::InvalidMaxRefRelStep {
                step: self.max_ref_rel_step,
            });
        }
        // NaN fails both comparisons and lands here too.
        if !(self.bin_overlap > 0.0 && self.bin_overlap < 1.0) {
            warn!(
                was = self.bin_overlap,
                "binOverlap set to {DEFAULT_BIN_OVERLAP} (not in range (0…1))"
            );
            self.bin_overlap = DEFAULT_BIN_OVERLAP;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn defaults_validate_unchanged() {
        let mut cfg = BinsConfig::default();
        let before = cfg.clone();
        cfg.validate().unwrap();
        assert_eq!(cfg, before);
    }

    #[test]
    fn bin_count_bounds_are_inclusive() {
        for n_bins in [1, 100] {
            let mut cfg = BinsConfig {
                n_bins,
                ..BinsConfig::default()
            };
            assert!(cfg.validate().is_ok(), "n_bins={n_bins}");
        }
        for n_bins in [0, 101] {
            let mut cfg = BinsConfig {
                n_bins,
                ..BinsConfig::default()
            };
            let err = cfg.validate().unwrap_err();
            assert_eq!(err, BinsError::InvalidBinCount { n_bins });
            assert_eq!(err.kind(), ErrorKind::Configuration);
        }
    }

    #[test]
    fn out_of_range_overlap_is_corrected_not_rejected() {
        for bad in [0.0, 1.0, -0.5, 3.0, f64::NAN] {
            let mut cfg = BinsConfig {
                bin_overlap: bad,
                ..BinsConfig::default()
            };
            cfg.validate().unwrap();
            assert_eq!(cfg.bin_overlap, DEFAULT_BIN_OVERLAP, "was {bad}");
        }
        let mut cfg = BinsConfig {
            bin_overlap: 0.5,
            ..BinsConfig::default()
        };
        cfg.validate().unwrap();
        assert_eq!(cfg.bin_overlap, 0.5);
    }

    #[test]
    fn degenerate_coefficient_and_step_are_rejected() {
        let mut cfg = BinsConfig {
            bin_coeff: 1.0,
            ..BinsConfig::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(BinsError::InvalidBinCoeff { .. })
        ));
        let mut cfg = BinsConfig {
            max_ref_rel_step: 1.0,
            ..BinsConfig::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(BinsError::InvalidMaxRefRelStep { .. })
        ));
    }

    #[test]
    fn partial_json_fills_defaults() {
        let cfg: BinsConfig = serde_json::from_str(r#"{ "n_bins": 3, "bin_coeff": 2.0 }"#).unwrap();
        assert_eq!(cfg.n_bins, 3);
        assert_eq!(cfg.bin_coeff, 2.0);
        assert_eq!(cfg.hist_interval, BinsConfig::default().hist_interval);
    }

    #[test]
    fn unknown_json_fields_are_rejected() {
        let res: Result<BinsConfig, _> = serde_json::from_str(r#"{ "nBins": 3 }"#);
        assert!(res.is_err());
    }
}
