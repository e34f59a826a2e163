// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Error type shared by every fallible velocity-bin operation.

use thiserror::Error;

/// Broad classification of a [`BinsError`].
///
/// Hosts typically reject `Configuration` errors at startup, abandon the run on
/// `Invariant` errors, and treat `Usage` errors as an integration bug (or, for
/// freshly spawned bodies, as a request to rebuild early).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The configuration can never produce valid displacement budgets.
    Configuration,
    /// A structural invariant was violated mid-run; budgets are no longer trustworthy.
    Invariant,
    /// The host called the component outside its contract.
    Usage,
}

/// Errors raised by [`crate::VelocityBins`] and [`crate::BinsConfig`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BinsError {
    /// Bin count outside `[1, 100]`.
    #[error("number of bins must be >=1 and <=100 (got {n_bins})")]
    InvalidBinCount {
        /// Offending bin count.
        n_bins: usize,
    },
    /// Geometric bin ratio is not a finite value greater than one.
    #[error("bin coefficient must be finite and > 1 (got {bin_coeff})")]
    InvalidBinCoeff {
        /// Offending coefficient.
        bin_coeff: f64,
    },
    /// Relative step of the reference velocity is not in `[0, 1)`.
    #[error("max reference relative step must be finite and in [0, 1) (got {step})")]
    InvalidMaxRefRelStep {
        /// Offending step.
        step: f64,
    },
    /// No bin accepted a body during reclassification.
    #[error("body #{body} with velSq={vel_sq} not put in any bin")]
    UnclassifiedBody {
        /// Body identifier.
        body: usize,
        /// Squared velocity reported for the body.
        vel_sq: f64,
    },
    /// A velocity was reported for a body that has no bin yet.
    #[error("body #{body} has no bin (not classified since it was added)")]
    UnassignedBody {
        /// Body identifier.
        body: usize,
    },
    /// A NaN squared velocity was reported to the aggregator.
    #[error("body #{body} reported a non-finite squared velocity")]
    NonFiniteVelocity {
        /// Body identifier.
        body: usize,
    },
}

impl BinsError {
    /// Returns the broad classification of this error.
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidBinCount { .. }
            | Self::InvalidBinCoeff { .. }
            | Self::InvalidMaxRefRelStep { .. } => ErrorKind::Configuration,
            Self::UnclassifiedBody { .. } => ErrorKind::Invariant,
            Self::UnassignedBody { .. } | Self::NonFiniteVelocity { .. } => ErrorKind::Usage,
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;

    #[test]
    fn kinds_split_configuration_from_runtime_failures() {
        assert_eq!(
            BinsError::InvalidBinCount { n_bins: 0 }.kind(),
            ErrorKind::Configuration
        );
        assert_eq!(
            BinsError::InvalidBinCoeff { bin_coeff: 1.0 }.kind(),
            ErrorKind::Configuration
        );
        assert_eq!(
            BinsError::UnclassifiedBody {
                body: 3,
                vel_sq: f64::NAN
            }
            .kind(),
            ErrorKind::Invariant
        );
        assert_eq!(
            BinsError::UnassignedBody { body: 7 }.kind(),
            ErrorKind::Usage
        );
    }

    #[test]
    fn messages_name_the_offending_value() {
        let msg = BinsError::InvalidBinCount { n_bins: 101 }.to_string();
        assert!(msg.contains("101"), "{msg}");
        let msg = BinsError::UnassignedBody { body: 42 }.to_string();
        assert!(msg.contains("#42"), "{msg}");
    }
}
