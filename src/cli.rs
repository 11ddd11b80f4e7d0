//! Argument parsing and the scoring command behind the `nomad` binary.

use std::io::Write;
use std::path::PathBuf;

use clap::Parser;
use tracing::{error, info};

use crate::config::{self, NomadSettings};
use crate::embedding::Embedder;
use crate::engine::{Nomad, NomadOptions, ScoreReport};
use crate::error::{NomadError, Result};
use crate::model::DeviceRequest;

/// Non-intrusive audio quality score of degraded audio against a
/// non-matching clean reference set. Lower is closer to the reference.
#[derive(Parser, Debug, Clone)]
#[command(name = "nomad", version, about, long_about = None)]
pub struct Cli {
    /// Non-matching reference: a .wav file or a directory of .wav files
    #[arg(long, value_name = "PATH")]
    pub nmr: PathBuf,

    /// Degraded audio: a .wav file or a directory of .wav files
    #[arg(long, value_name = "PATH")]
    pub deg: PathBuf,

    /// Compute device; auto picks the best backend compiled in
    #[arg(long, value_enum)]
    pub device: Option<DeviceRequest>,

    /// Where the model checkpoints are cached
    #[arg(long, value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Settings file (defaults to the per-user config.toml)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Threads used to embed audio
    #[arg(long, value_name = "N")]
    pub workers: Option<usize>,

    /// Print a score per degraded file before the overall score
    #[arg(long)]
    pub per_file: bool,

    /// Only score the first N seconds of each file
    #[arg(long, value_name = "SECONDS")]
    pub trim_seconds: Option<f32>,
}

impl Cli {
    /// Settings file and environment first, then flags given on the command line.
    pub fn resolve_settings(&self) -> Result<NomadSettings> {
        let settings = config::load_settings(self.config.as_deref())?;
        self.apply_overrides(settings)
    }

    fn apply_overrides(&self, mut settings: NomadSettings) -> Result<NomadSettings> {
        if let Some(device) = self.device {
            settings.device = device;
        }
        if let Some(dir) = &self.cache_dir {
            settings.cache_dir = dir.clone();
        }
        if let Some(workers) = self.workers {
            if workers == 0 {
                return Err(NomadError::invalid("--workers must be at least 1"));
            }
            settings.workers = workers;
        }
        if let Some(seconds) = self.trim_seconds {
            if !seconds.is_finite() || seconds <= 0.0 {
                return Err(NomadError::invalid("--trim-seconds must be positive"));
            }
            settings.trim_seconds = Some(seconds);
        }
        Ok(settings)
    }
}

/// Load the model, score `--deg` against `--nmr`, and write the result to `out`.
pub fn run(cli: &Cli, out: &mut dyn Write) -> Result<()> {
    let settings = cli.resolve_settings()?;
    info!(
        "Scoring {} against {}",
        cli.deg.display(),
        cli.nmr.display()
    );
    let nomad = Nomad::new(&NomadOptions::from(&settings))?;
    score_and_print(&nomad, cli, &settings, out)
}

/// Scoring half of [`run`], for any embedder.
pub fn score_and_print<E: Embedder + Clone + Send>(
    nomad: &Nomad<E>,
    cli: &Cli,
    settings: &NomadSettings,
    out: &mut dyn Write,
) -> Result<()> {
    let report = nomad.score_directories(&cli.nmr, &cli.deg, settings.trim_seconds)?;
    write_report(&report, cli.per_file, out).map_err(|err| NomadError::io("<stdout>", err))
}

/// Report a failed run. The stderr log layer is the only place it is printed.
pub fn report_failure(err: &NomadError) {
    error!("{err}");
}

fn write_report(report: &ScoreReport, per_file: bool, out: &mut dyn Write) -> std::io::Result<()> {
    if per_file {
        for file in &report.files {
            writeln!(out, "{}\t{}", file.name, file.score)?;
        }
    }
    writeln!(out, "{}", report.score)?;
    out.flush()
}
