// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Scene harness for Echo velocity bins.
//!
//! Simulates free particles with a heavy-tailed speed mix, drives the
//! velocity-bins rebuild trigger every step, and reports how often the broad
//! phase had to be rebuilt.

pub mod cli;
pub mod harness;
pub mod prng;
pub mod scene;
