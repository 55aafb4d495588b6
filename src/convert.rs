use anyhow::{bail, Context, Result};
use clap::Args as ClapArgs;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use crate::config::{self, OptMap};
use crate::converter::{BatchEvent, BatchReport, Converter};

#[derive(ClapArgs, Debug, Clone)]
pub struct Args {
  /// Output directory for converted configuration files.
  #[arg(short, long, default_value = "./out")]
  pub out_dir: PathBuf,
}

pub async fn run(config_path: &Path, args: Args) -> Result<()> {
  let config = config::load_config(config_path)?;
  if config.subscriptions.is_empty() {
    println!("no subscriptions configured in {}", config_path.display());
    return Ok(());
  }

  let converter_cfg = &config.converter;
  if converter_cfg.base_url.is_empty() {
    bail!("converter.base_url is missing from {}", config_path.display());
  }
  if converter_cfg.config_url.is_empty() {
    bail!("converter.config_url is missing from {}", config_path.display());
  }

  println!("found {} subscriptions", config.subscriptions.len());
  println!("conversion service: {}", converter_cfg.base_url);
  println!("ruleset config: {}", converter_cfg.config_url);
  if !converter_cfg.opts.is_empty() {
    println!("global options: {}", render_opts(&converter_cfg.opts));
  }

  if args.out_dir.exists() {
    println!("using output directory {}", args.out_dir.display());
  } else {
    std::fs::create_dir_all(&args.out_dir)
      .with_context(|| format!("failed to create output directory {}", args.out_dir.display()))?;
    println!("created output directory {}", args.out_dir.display());
  }

  let converter = Converter::new(
    converter_cfg.base_url.clone(),
    converter_cfg.config_url.clone(),
    converter_cfg.opts.clone(),
  )?;
  let report = converter.batch_convert(&config.subscriptions, &args.out_dir).await;

  print!("{}", render_report(&report));
  Ok(())
}

fn render_opts(opts: &OptMap) -> String {
  opts
    .iter()
    .map(|(key, value)| format!("{key}={}", value.render()))
    .collect::<Vec<_>>()
    .join(" ")
}

/// Render the batch outcome as console text. Pure over the report so it can
/// be tested without running a batch.
pub fn render_report(report: &BatchReport) -> String {
  let mut out = String::new();
  for event in &report.events {
    match event {
      BatchEvent::Skipped { index, name, reason } => {
        let _ = writeln!(
          out,
          "[{}/{}] {name}: skipped ({})",
          index + 1,
          report.total,
          reason.describe()
        );
      }
      BatchEvent::Converted {
        index,
        name,
        dst_path,
        outcome,
      } => {
        if let Some(failure) = &outcome.error {
          let _ = writeln!(
            out,
            "[{}/{}] {name}: failed ({}: {})",
            index + 1,
            report.total,
            failure.kind.describe(),
            failure.message
          );
        } else {
          let _ = writeln!(
            out,
            "[{}/{}] {name}: wrote {} ({} bytes)",
            index + 1,
            report.total,
            dst_path.display(),
            outcome.bytes
          );
        }
      }
    }
  }

  let _ = writeln!(out, "conversion results:");
  for (path, ok) in report.results() {
    let _ = writeln!(out, "  {}: {}", path.display(), if ok { "ok" } else { "failed" });
  }
  let _ = writeln!(
    out,
    "{}/{} subscriptions converted successfully",
    report.success_count(),
    report.total
  );
  out
}
