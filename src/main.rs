use anyhow::{Context as AnyhowContext, Result};
use clap::Parser;
use std::fs::File;
use std::io::{self, BufWriter};
use std::process::ExitCode;
use tracing::info;

use codesift::cli::Args;
use codesift::diff::ChangedLines;
use codesift::logging::{self, Verbosity};
use codesift::output::OutputFormatter;
use codesift::source::collect_inputs;
use codesift::{DetectorRegistry, Engine};

fn main() -> ExitCode {
    let args = Args::parse();
    logging::init(Verbosity::from_flags(args.verbose, args.quiet));

    match run(&args) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(1)
        }
    }
}

fn run(args: &Args) -> Result<ExitCode> {
    if args.list_detectors {
        list_detectors();
        return Ok(ExitCode::SUCCESS);
    }
    args.validate().context("Invalid arguments")?;

    let path = args.path.as_deref().context("--path is required")?;
    let mut builder = Engine::builder().with_config(args.engine_config()?);
    if let Some(diff) = &args.diff {
        let changed = ChangedLines::load(diff)
            .with_context(|| format!("Cannot read diff: {}", diff.display()))?;
        builder = builder.with_changed_lines(changed);
    }
    let engine = builder.build().context("Invalid engine configuration")?;

    let inputs = collect_inputs(path, args.language)
        .with_context(|| format!("Cannot collect sources under {}", path.display()))?;
    if inputs.is_empty() {
        anyhow::bail!("No supported source files found under {}", path.display());
    }
    info!(files = inputs.len(), "analyzing {}", path.display());

    let result = engine.scan(&inputs)?;

    match &args.output_file {
        Some(output) => {
            let file = File::create(output)
                .with_context(|| format!("Cannot create output file: {}", output.display()))?;
            let mut writer = BufWriter::new(file);
            OutputFormatter::emit(&result, args.format, &mut writer, &output.display().to_string())?;
            info!(output = %output.display(), "report written");
        }
        None => {
            let stdout = io::stdout();
            let mut lock = stdout.lock();
            OutputFormatter::emit(&result, args.format, &mut lock, "stdout")?;
        }
    }

    if let Some(threshold) = args.fail_on {
        if result.has_findings_at_or_above(threshold) {
            return Ok(ExitCode::from(2));
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn list_detectors() {
    for detector in DetectorRegistry::global().all() {
        println!(
            "{:<28} {:<12} {:<9} {}",
            detector.id(),
            detector.category().as_str(),
            detector.severity().as_str(),
            detector.description()
        );
    }
}
