//! csvadjust CLI - Apply configured rules to CSV files
//!
//! ```bash
//! csvadjust run                       # Adjust every CSV of the configured read directory
//! csvadjust file input.csv -o out.csv # Adjust a single file
//! csvadjust check                     # Validate the configuration and its rules
//! csvadjust rules                     # Show available rule types
//! ```
//!
//! The configuration is `csvAdjuster.json` in the working directory unless
//! `--config`, `--path` or the `CSVADJUST_CONFIG` variable say otherwise.

use clap::{Parser, Subcommand};
use csvadjust::{
    adjust_bytes, adjust_directory, adjust_file, rules_description, AdjustConfig, RuleSet,
    CONFIG_ENV_VAR,
};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "csvadjust")]
#[command(about = "Apply conditional rules and field transformations to CSV files", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Where to find the configuration.
#[derive(clap::Args, Debug, Clone)]
struct ConfigArgs {
    /// Configuration file name (default: csvAdjuster.json)
    #[arg(short, long)]
    config: Option<String>,

    /// Directory containing the configuration file (default: current directory)
    #[arg(short, long)]
    path: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Adjust every CSV file in the configured read directory
    Run {
        #[command(flatten)]
        config: ConfigArgs,
    },

    /// Adjust a single CSV file
    File {
        /// Input CSV file
        input: PathBuf,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        config: ConfigArgs,
    },

    /// Load the configuration and parse its rules
    Check {
        #[command(flatten)]
        config: ConfigArgs,
    },

    /// Show available rule types and their required fields
    Rules,
}

fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "csvadjust=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run { config } => cmd_run(&config),
        Commands::File {
            input,
            output,
            config,
        } => cmd_file(&input, output.as_deref(), &config),
        Commands::Check { config } => cmd_check(&config),
        Commands::Rules => cmd_rules(),
    };

    if let Err(e) = result {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}

fn load_config(args: &ConfigArgs) -> Result<AdjustConfig, Box<dyn std::error::Error>> {
    let config = match (&args.config, &args.path, std::env::var(CONFIG_ENV_VAR)) {
        (None, None, Ok(from_env)) => {
            tracing::debug!(var = CONFIG_ENV_VAR, path = %from_env, "using configuration from environment");
            AdjustConfig::from_file(Path::new(&from_env))?
        }
        (file_name, path, _) => AdjustConfig::load_config(file_name.as_deref(), path.as_deref())?,
    };
    Ok(config)
}

fn cmd_run(args: &ConfigArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(args)?;
    let rules = RuleSet::from_config(&config)?;

    let reports = adjust_directory(&config, &rules)?;

    for report in &reports {
        eprintln!(
            "{} -> {}: {}",
            report.input.display(),
            report.output.display(),
            report.stats.summary()
        );
        for failure in report.failures.iter().take(5) {
            eprintln!("   row {}: {}", failure.row, failure.error);
        }
    }
    eprintln!("{} file(s) adjusted", reports.len());

    Ok(())
}

fn cmd_file(
    input: &Path,
    output: Option<&Path>,
    args: &ConfigArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(args)?;
    let rules = RuleSet::from_config(&config)?;

    let stats = match output {
        Some(out) => adjust_file(&config.csv, &rules, input, out)?.stats,
        None => {
            let bytes = std::fs::read(input)?;
            let adjusted =
                adjust_bytes(&bytes, &config.csv, &rules).map_err(|e| e.in_file(input))?;
            std::io::stdout().write_all(&adjusted.bytes)?;
            adjusted.stats
        }
    };

    eprintln!("{}: {}", input.display(), stats.summary());
    Ok(())
}

fn cmd_check(args: &ConfigArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(args)?;
    let rules = RuleSet::from_config(&config)?;

    println!("Read directory:  {}", config.read_dir().display());
    println!("Write directory: {}", config.write_dir().display());
    println!("Encoding:        {}", config.csv.file_encoding);
    println!("Dialect:         {:?}", config.csv.dialect);
    println!("Match mode:      {:?}", rules.match_mode);
    println!("Unmatched rows:  {:?}", rules.unmatched);
    println!("On row error:    {:?}", rules.on_row_error);

    println!("\nConditionals ({}):", rules.conditionals.len());
    for c in &rules.conditionals {
        println!("  {}", serde_json::to_string(c)?);
    }
    println!("\nTransformers ({}):", rules.transformers.len());
    for t in &rules.transformers {
        println!("  {}", serde_json::to_string(t)?);
    }

    Ok(())
}

fn cmd_rules() -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", rules_description());
    Ok(())
}
