// CarLink CLI - headless record linkage runs

mod exit_codes;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use rand::rngs::StdRng;
use rand::SeedableRng;

use carlink_io::{build_store, export_labeled, load_source};
use carlink_linkage::model::Source;
use carlink_linkage::{LinkError, LinkageConfig, RecordStore};

use exit_codes::{
    EXIT_ERROR, EXIT_INVALID_CONFIG, EXIT_RUNTIME, EXIT_SUCCESS, EXIT_TRAINING, EXIT_USAGE,
};

#[derive(Parser)]
#[command(name = "clink")]
#[command(about = "Cross-source record linkage for vehicle listings")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run linkage from a TOML config file
    #[command(after_help = "\
Examples:
  clink run linkage.toml
  clink run linkage.toml --json
  clink run linkage.toml --output result.json")]
    Run {
        /// Path to the linkage config file
        config: PathBuf,

        /// Output JSON to stdout instead of human summary only
        #[arg(long)]
        json: bool,

        /// Write JSON output to file
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Validate a linkage config without running
    Validate {
        /// Path to the linkage config file
        config: PathBuf,
    },

    /// Write labeled train/val/test pair files for a downstream matcher
    #[command(after_help = "\
Examples:
  clink export linkage.toml
  clink export linkage.toml --out data/labeled")]
    Export {
        /// Path to the linkage config file
        config: PathBuf,

        /// Output directory for the pair files
        #[arg(long, default_value = "export")]
        out: PathBuf,
    },
}

struct CliError {
    code: u8,
    message: String,
}

fn cli_err(code: u8, message: impl Into<String>) -> CliError {
    CliError { code, message: message.into() }
}

fn error_code(err: &LinkError) -> u8 {
    match err {
        LinkError::ConfigParse(_) | LinkError::ConfigValidation(_) => EXIT_INVALID_CONFIG,
        LinkError::TrainingInsufficient { .. } => EXIT_TRAINING,
        LinkError::Schema { .. }
        | LinkError::IdParse { .. }
        | LinkError::DuplicateId { .. }
        | LinkError::Io(_) => EXIT_RUNTIME,
    }
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run { config, json, output } => cmd_run(config, json, output),
        Commands::Validate { config } => cmd_validate(config),
        Commands::Export { config, out } => cmd_export(config, out),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(e) => {
            eprintln!("error: {}", e.message);
            ExitCode::from(e.code)
        }
    }
}

fn read_config(path: &Path) -> Result<LinkageConfig, CliError> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| cli_err(EXIT_USAGE, format!("cannot read config: {e}")))?;
    LinkageConfig::from_toml(&raw).map_err(|e| cli_err(error_code(&e), e.to_string()))
}

/// Load both sources' CSVs (paths resolved relative to the config file) and
/// assemble the canonical store.
fn load_store(config: &LinkageConfig, base_dir: &Path) -> Result<RecordStore, CliError> {
    let read_csv = |file: &str| {
        let path = base_dir.join(file);
        std::fs::read_to_string(&path)
            .map_err(|e| cli_err(EXIT_RUNTIME, format!("cannot read {}: {e}", path.display())))
    };

    let a = load_source(&read_csv(&config.sources.a.file)?, &config.sources.a, Source::A)
        .map_err(|e| cli_err(error_code(&e), e.to_string()))?;
    let b = load_source(&read_csv(&config.sources.b.file)?, &config.sources.b, Source::B)
        .map_err(|e| cli_err(error_code(&e), e.to_string()))?;

    build_store(a, b).map_err(|e| cli_err(error_code(&e), e.to_string()))
}

fn cmd_run(config_path: PathBuf, json_output: bool, output_file: Option<PathBuf>) -> Result<(), CliError> {
    let config = read_config(&config_path)?;
    let base_dir = config_path.parent().unwrap_or_else(|| Path::new("."));
    let store = load_store(&config, base_dir)?;

    let result = carlink_linkage::run(&config, &store)
        .map_err(|e| cli_err(error_code(&e), e.to_string()))?;

    let json_str = serde_json::to_string_pretty(&result)
        .map_err(|e| cli_err(EXIT_ERROR, format!("JSON serialization error: {e}")))?;

    if let Some(ref path) = output_file {
        std::fs::write(path, &json_str)
            .map_err(|e| cli_err(EXIT_RUNTIME, format!("cannot write output: {e}")))?;
        eprintln!("wrote {}", path.display());
    }

    if json_output {
        println!("{json_str}");
    }

    // Human summary to stderr
    let s = &result.summary;
    eprintln!(
        "{} [{} + {}]: {} x {} records, {} candidates -> {} links ({} blocks skipped)",
        result.meta.config_name,
        result.meta.blocking,
        result.meta.classifier,
        s.records_a,
        s.records_b,
        s.candidate_pairs,
        s.predicted_pairs,
        s.skipped_blocks,
    );
    eprintln!(
        "precision {:.3}  recall {:.3}  f1 {:.3}  blocking ceiling {:.3}  ({} eval pairs)",
        s.metrics.precision, s.metrics.recall, s.metrics.f1, s.blocking_ceiling, s.eval_pairs,
    );

    Ok(())
}

fn cmd_validate(config_path: PathBuf) -> Result<(), CliError> {
    let config = read_config(&config_path)?;
    eprintln!(
        "valid: '{}' — {} compared fields, {} blocking, {} classifier",
        config.name,
        config.compare.fields.len(),
        config.blocking.describe(),
        config.classifier.kind,
    );
    Ok(())
}

fn cmd_export(config_path: PathBuf, out_dir: PathBuf) -> Result<(), CliError> {
    let config = read_config(&config_path)?;
    let base_dir = config_path.parent().unwrap_or_else(|| Path::new("."));
    let store = load_store(&config, base_dir)?;

    let mut rng = StdRng::seed_from_u64(config.split.seed);
    let (train, val, test) = store.correspondence().split_three(
        config.split.train_fraction,
        config.split.val_fraction,
        &mut rng,
    );

    std::fs::create_dir_all(&out_dir)
        .map_err(|e| cli_err(EXIT_RUNTIME, format!("cannot create {}: {e}", out_dir.display())))?;

    for (name, subset) in [
        ("pairs_train.txt", &train),
        ("pairs_val.txt", &val),
        ("pairs_test.txt", &test),
    ] {
        let lines = export_labeled(&store, subset, &mut rng)
            .map_err(|e| cli_err(error_code(&e), e.to_string()))?;
        let path = out_dir.join(name);
        std::fs::write(&path, lines.join("\n") + "\n")
            .map_err(|e| cli_err(EXIT_RUNTIME, format!("cannot write {}: {e}", path.display())))?;
        eprintln!("wrote {} ({} labeled pairs)", path.display(), lines.len());
    }

    Ok(())
}
