mod commands;
mod input;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use commands::amortize::AmortizeArgs;
use commands::pool::PoolArgs;
use commands::price::PriceArgs;
use commands::waterfall::WaterfallArgs;

/// Asset-backed securities waterfall simulation and tranche pricing
#[derive(Parser)]
#[command(
    name = "absw",
    version,
    about = "Asset-backed securities waterfall simulation and tranche pricing",
    long_about = "A CLI for running loan pools through a tranched liability structure. \
                  Supports single-loan amortization, pool cash flows, sequential and \
                  pro-rata waterfalls, and Monte Carlo coupon pricing with ratings."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "warn", global = true, env = "ABSW_LOG")]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Amortization schedule for a single loan
    Amortize(AmortizeArgs),
    /// Asset-side cash flows and pool statistics for a loan file
    Pool(PoolArgs),
    /// Run one waterfall of a loan pool through a deal
    Waterfall(WaterfallArgs),
    /// Price a deal's tranches by Monte Carlo coupon search
    Price(PriceArgs),
    /// Print version information
    Version,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Csv,
    Minimal,
}

fn init_tracing(log_level: &str) {
    // Logs go to stderr so stdout stays parseable
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::Amortize(args) => commands::amortize::run_amortize(args),
        Commands::Pool(args) => commands::pool::run_pool(args),
        Commands::Waterfall(args) => commands::waterfall::run_waterfall(args),
        Commands::Price(args) => commands::price::run_price(args),
        Commands::Version => {
            println!("absw {}", env!("CARGO_PKG_VERSION"));
            return;
        }
    };

    match result {
        Ok(value) => {
            output::format_output(&cli.output, &value);
            process::exit(0);
        }
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    }
}
