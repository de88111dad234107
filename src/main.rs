use std::io::Read;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use wayguard::config::WayguardConfig;
use wayguard::detect::engine::{AlertEngine, EvaluationInput};

#[derive(Parser)]
#[command(
    name = "wayguard",
    about = "Live location sharing with inactivity and safe-zone alerts",
    version,
    long_about = None
)]
struct Cli {
    /// Path to a TOML config file (defaults are used when absent)
    #[arg(long, global = true, env = "WAYGUARD_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the daemon (API server + session monitor)
    Serve {
        /// Bind address, overrides [server].bind
        #[arg(long)]
        bind: Option<String>,
    },

    /// Evaluate a single location snapshot read from a JSON file
    Evaluate {
        /// Input file, or "-" for stdin
        #[arg(long, default_value = "-")]
        input: String,

        /// JSON output for machine parsing
        #[arg(long)]
        json: bool,
    },

    /// Print a freshly generated tracking code
    Code,

    /// Print the effective configuration as TOML
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = WayguardConfig::resolve(cli.config.as_deref())?;

    wayguard::init_logging(&config.logging);

    match cli.command {
        Commands::Serve { bind } => {
            if let Some(bind) = bind {
                config.server.bind = bind;
            }
            tracing::info!(bind = %config.server.bind, "Starting wayguard daemon");
            wayguard::serve(config).await?;
        }
        Commands::Evaluate { input, json } => {
            let raw = read_input(&input)?;
            let request: EvaluationInput =
                serde_json::from_str(&raw).context("failed to parse evaluation input")?;

            let engine = AlertEngine::from_config(&config.alert, &config.detection)?;
            let assessment = engine.assess_input(request).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&assessment)?);
            } else {
                let verdict = &assessment.verdict;
                println!("\n=== wayguard Evaluation ===");
                println!("Anomaly:    {}", if verdict.anomaly_detected() { "YES" } else { "no" });
                let kinds: Vec<String> = verdict.kinds().iter().map(|k| k.to_string()).collect();
                println!("Kinds:      {}", if kinds.is_empty() { "-".to_string() } else { kinds.join(", ") });
                if let Some(minutes) = verdict.inactivity_duration_minutes() {
                    println!("Inactive:   {} min", minutes);
                }
                println!("Outside:    {}", verdict.is_outside_safe_zone());
                println!("Source:     {}", assessment.message_source.label());
                println!("\n{}", assessment.alert_message);
                println!("===========================\n");
            }
        }
        Commands::Code => {
            println!("{}", wayguard::tracking::generate_code());
        }
        Commands::Config => {
            print!("{}", toml::to_string_pretty(&config)?);
        }
    }

    Ok(())
}

fn read_input(path: &str) -> Result<String> {
    if path == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("failed to read stdin")?;
        return Ok(buf);
    }
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path))
}
