use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info};
use serde::Serialize;

use refdiff::{DiffConfig, FileSource, RunReport};

/// Compare a screenshot against its reference and write diff artifacts
#[derive(Debug, Parser)]
#[command(name = "refdiff", version)]
struct Args {
    /// Reference PNG
    reference: PathBuf,
    /// Current capture PNG
    current: PathBuf,
    /// JSON config, either bare or with a `diff` section
    #[arg(long)]
    config: Option<PathBuf>,
    /// Output directory for artifacts
    #[arg(long, default_value = ".")]
    out: PathBuf,
    /// Override the pass threshold in percent
    #[arg(long)]
    threshold: Option<f64>,
}

fn load_config(args: &Args) -> Result<DiffConfig> {
    let mut cfg = match &args.config {
        Some(path) => {
            let text = fs::read_to_string(path).with_context(|| format!("reading config {}", path.display()))?;
            DiffConfig::from_json_str(&text).with_context(|| format!("parsing config {}", path.display()))?
        }
        None => DiffConfig::default(),
    };
    if let Some(pct) = args.threshold {
        cfg = cfg.with_threshold_pct(pct);
    }
    Ok(cfg)
}

fn write_json<T: Serialize>(dir: &Path, name: &str, value: &T) -> Result<()> {
    let path = dir.join(name);
    let text = serde_json::to_string_pretty(value)?;
    fs::write(&path, text).with_context(|| format!("writing {}", path.display()))
}

fn write_artifacts(dir: &Path, report: &RunReport) -> Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    let artifacts = report.encode_artifacts()?;
    fs::write(dir.join("diff.png"), &artifacts.diff_png)?;
    fs::write(dir.join("heatmap.png"), &artifacts.heatmap_png)?;
    if let Some(bytes) = &artifacts.reference_match_png {
        fs::write(dir.join("reference.match.png"), bytes)?;
    }
    write_json(dir, "diff.score.json", &report.score)?;
    write_json(dir, "diff.meta.json", &report.metadata)?;
    write_json(dir, "diff.groups.json", &report.groups)?;
    write_json(dir, "mask.suggest.json", &report.masks)?;
    Ok(())
}

fn run(args: &Args) -> Result<bool> {
    let cfg = load_config(args)?;
    let reference =
        fs::read(&args.reference).with_context(|| format!("reading reference {}", args.reference.display()))?;
    let mut source = FileSource::new(args.current.clone());
    let report = refdiff::compare_with_source(&mut source, &reference, &cfg)
        .with_context(|| format!("comparing {} against {}", args.current.display(), args.reference.display()))?;
    write_artifacts(&args.out, &report)?;
    info!("artifacts written to {}", args.out.display());
    println!("{}", report.score.summary());
    Ok(report.passed())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    match run(&args) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            error!("{:#}", e);
            ExitCode::from(2)
        }
    }
}
