// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Command-line surface of `echo-velbins`.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use echo_velocity_bins::BinsConfig;
use tracing_subscriber::EnvFilter;

use crate::harness::{run, RunOptions};
use crate::scene::SceneParams;

/// Arguments of `echo-velbins`.
#[derive(Parser, Debug)]
#[command(name = "echo-velbins")]
#[command(about = "Drive the velocity-bins rebuild trigger over a seeded particle scene")]
#[command(version)]
pub struct Cli {
    /// JSON file with bin settings; missing fields take their defaults
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Override the number of bins
    #[arg(long)]
    pub n_bins: Option<usize>,
    /// Override the geometric ratio between neighboring bins
    #[arg(long)]
    pub bin_coeff: Option<f64>,
    /// Override the hysteresis fraction
    #[arg(long)]
    pub bin_overlap: Option<f64>,
    /// Override the largest relative reference step per rebuild
    #[arg(long)]
    pub max_ref_rel_step: Option<f64>,
    /// Override the minimum steps between debug histograms
    #[arg(long)]
    pub hist_interval: Option<u64>,
    /// Initial number of particles
    #[arg(long, default_value_t = 1000)]
    pub bodies: usize,
    /// Steps to simulate
    #[arg(long, default_value_t = 2000)]
    pub steps: usize,
    /// Time step
    #[arg(long, default_value_t = 1e-3)]
    pub dt: f64,
    /// Sweep length handed to every rebuild
    #[arg(long, default_value_t = 0.05)]
    pub sweep_length: f64,
    /// Scene seed
    #[arg(long, default_value_t = 42)]
    pub seed: u64,
    /// Spawn one particle every N steps
    #[arg(long)]
    pub spawn_every: Option<usize>,
    /// Per-particle, per-step kick probability
    #[arg(long)]
    pub kick_probability: Option<f64>,
    /// Print the summary as JSON
    #[arg(long)]
    pub json: bool,
    /// Print the effective bin settings as JSON and exit
    #[arg(long)]
    pub print_config: bool,
}

impl Cli {
    /// Effective bin settings: file (or defaults), then flag overrides.
    ///
    /// # Errors
    /// Fails if the config file cannot be read or parsed.
    pub fn bins_config(&self) -> Result<BinsConfig> {
        let mut config = match &self.config {
            Some(path) => load_config(path)?,
            None => BinsConfig::default(),
        };
        if let Some(n) = self.n_bins {
            config.n_bins = n;
        }
        if let Some(c) = self.bin_coeff {
            config.bin_coeff = c;
        }
        if let Some(o) = self.bin_overlap {
            config.bin_overlap = o;
        }
        if let Some(s) = self.max_ref_rel_step {
            config.max_ref_rel_step = s;
        }
        if let Some(h) = self.hist_interval {
            config.hist_interval = h;
        }
        Ok(config)
    }

    /// Scene and integration settings.
    pub fn run_options(&self) -> RunOptions {
        let defaults = SceneParams::default();
        RunOptions {
            bodies: self.bodies,
            steps: self.steps,
            dt: self.dt,
            sweep_length: self.sweep_length,
            seed: self.seed,
            spawn_every: self.spawn_every,
            scene: SceneParams {
                kick_probability: self.kick_probability.unwrap_or(defaults.kick_probability),
                ..defaults
            },
        }
    }
}

fn load_config(path: &Path) -> Result<BinsConfig> {
    let file = File::open(path)
        .with_context(|| format!("failed to open config {}", path.display()))?;
    serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("failed to parse config {}", path.display()))
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // A subscriber may already be installed when embedded; keep it.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Parses arguments, runs the scene and prints the summary to stdout.
///
/// # Errors
/// Fails on unreadable configuration or any error raised by the bins.
#[allow(clippy::print_stdout)]
pub fn entrypoint() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let config = cli.bins_config()?;
    if cli.print_config {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    let summary = run(config, &cli.run_options())?;
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print!("{summary}");
    }
    Ok(())
}
