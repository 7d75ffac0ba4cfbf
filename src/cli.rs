use anyhow::{Context as AnyhowContext, Result};
use clap::{Parser, ValueEnum};
use std::path::{Path, PathBuf};

use crate::config::EngineConfig;
use crate::detectors::Severity;
use crate::source::Language;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Text,
    Comments,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Text => "text",
            OutputFormat::Comments => "comments",
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "codesift")]
#[command(about = "Static defect detector - find security, performance and quality issues in source code", long_about = None)]
pub struct Args {
    /// Path to file or directory to analyze
    #[arg(long, value_name = "PATH", required_unless_present = "list_detectors")]
    pub path: Option<PathBuf>,

    /// Language of a single-file path (inferred from the extension if not specified)
    #[arg(short, long)]
    pub language: Option<Language>,

    /// Engine config file (JSON or YAML)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Output format (json, text, comments)
    #[arg(short = 'f', long, default_value = "json")]
    pub format: OutputFormat,

    /// Output file path (prints to stdout if not specified)
    #[arg(short = 'O', long, value_name = "FILE")]
    pub output_file: Option<PathBuf>,

    /// Drop findings below this severity
    #[arg(long, value_name = "SEVERITY")]
    pub min_severity: Option<Severity>,

    /// Run only this detector. Can be specified multiple times.
    #[arg(long = "detector", value_name = "ID")]
    pub detectors: Vec<String>,

    /// Unified diff; only findings on lines it adds are reported
    #[arg(long, value_name = "PATCH")]
    pub diff: Option<PathBuf>,

    /// Exit with status 2 when any finding is at or above this severity
    #[arg(long, value_name = "SEVERITY")]
    pub fail_on: Option<Severity>,

    /// Worker threads (defaults to one per core)
    #[arg(long, value_name = "N")]
    pub threads: Option<usize>,

    /// Print the built-in detectors and exit
    #[arg(long)]
    pub list_detectors: bool,

    /// Increase verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long)]
    pub quiet: bool,
}

impl Args {
    pub fn validate(&self) -> Result<()> {
        if let Some(ref path) = self.path {
            validate_path(path)?;
        }
        if let Some(ref config) = self.config {
            if !config.is_file() {
                anyhow::bail!("Config file does not exist: {}", config.display());
            }
        }
        if let Some(ref diff) = self.diff {
            if !diff.is_file() {
                anyhow::bail!("Diff file does not exist: {}", diff.display());
            }
        }
        if self.threads == Some(0) {
            anyhow::bail!("--threads must be greater than zero");
        }
        Ok(())
    }

    /// Config file (if any) with command-line flags layered on top.
    pub fn engine_config(&self) -> Result<EngineConfig> {
        let mut config = match &self.config {
            Some(path) => EngineConfig::load(path)
                .with_context(|| format!("Cannot load config: {}", path.display()))?,
            None => EngineConfig::default(),
        };
        if self.min_severity.is_some() {
            config.min_severity = self.min_severity;
        }
        if !self.detectors.is_empty() {
            config.only_detectors = Some(self.detectors.clone());
        }
        if self.threads.is_some() {
            config.threads = self.threads;
        }
        Ok(config)
    }
}

pub fn validate_path(path: &Path) -> Result<()> {
    if !path.exists() {
        anyhow::bail!("Path does not exist: {}", path.display());
    }

    if path.is_file() {
        std::fs::metadata(path).with_context(|| format!("Cannot read file: {}", path.display()))?;
    } else if path.is_dir() {
        std::fs::read_dir(path)
            .with_context(|| format!("Cannot read directory: {}", path.display()))?;
    } else {
        anyhow::bail!("Path is neither a file nor a directory: {}", path.display());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn parse(args: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("codesift").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_parse_flags() {
        let args = parse(&[
            "--path",
            "src",
            "--format",
            "comments",
            "--min-severity",
            "medium",
            "--detector",
            "sql-injection",
            "--detector",
            "weak-hash",
            "--fail-on",
            "high",
            "-vv",
        ]);
        assert_eq!(args.path, Some(PathBuf::from("src")));
        assert_eq!(args.format, OutputFormat::Comments);
        assert_eq!(args.min_severity, Some(Severity::Medium));
        assert_eq!(args.detectors, vec!["sql-injection", "weak-hash"]);
        assert_eq!(args.fail_on, Some(Severity::High));
        assert_eq!(args.verbose, 2);
    }

    #[test]
    fn test_language_flag() {
        let args = parse(&["--path", "script", "--language", "python"]);
        assert_eq!(args.language, Some(Language::Python));
    }

    #[test]
    fn test_path_required_unless_listing() {
        assert!(Args::try_parse_from(["codesift"]).is_err());
        let args = parse(&["--list-detectors"]);
        assert!(args.list_detectors);
        assert!(args.path.is_none());
    }

    #[test]
    fn test_output_format_as_str() {
        assert_eq!(OutputFormat::Json.as_str(), "json");
        assert_eq!(OutputFormat::Text.as_str(), "text");
        assert_eq!(OutputFormat::Comments.as_str(), "comments");
    }

    #[test]
    fn test_validate_path_file_exists() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("App.java");
        fs::write(&file_path, "class App {}").unwrap();

        assert!(validate_path(&file_path).is_ok());
        assert!(validate_path(temp_dir.path()).is_ok());
    }

    #[test]
    fn test_validate_path_not_exists() {
        let path = Path::new("/nonexistent/path/that/does/not/exist");
        assert!(validate_path(path).is_err());
    }

    #[test]
    fn test_validate_missing_config() {
        let temp_dir = TempDir::new().unwrap();
        let args = parse(&[
            "--path",
            temp_dir.path().to_str().unwrap(),
            "--config",
            "/nonexistent/codesift.yaml",
        ]);
        let err = args.validate().unwrap_err();
        assert!(err.to_string().contains("Config file does not exist"));
    }

    #[test]
    fn test_flags_override_config_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("codesift.yaml");
        fs::write(
            &config_path,
            "min_severity: low\nthresholds:\n  max_parameters: 3\n",
        )
        .unwrap();
        let args = parse(&[
            "--path",
            temp_dir.path().to_str().unwrap(),
            "--config",
            config_path.to_str().unwrap(),
            "--min-severity",
            "high",
            "--detector",
            "deep-nesting",
        ]);
        assert!(args.validate().is_ok());

        let config = args.engine_config().unwrap();
        assert_eq!(config.min_severity, Some(Severity::High));
        assert_eq!(config.thresholds.max_parameters, 3);
        assert_eq!(config.only_detectors, Some(vec!["deep-nesting".to_string()]));
    }
}
