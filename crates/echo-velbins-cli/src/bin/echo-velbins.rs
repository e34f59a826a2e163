// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! CLI entry point for the velocity-bins harness.

use anyhow::Result;
use echo_velbins_cli::cli::entrypoint;

fn main() -> Result<()> {
    entrypoint()
}
