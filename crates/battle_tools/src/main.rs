//! Hex Battle - Development Tools

use std::path::{Path, PathBuf};

use battle_core::hex::HexGridPosition;
use battle_tools::query::{self, OpenPositionQuery, PathQuery};
use battle_tools::validate;
use battle_tools::Result;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "battle-tools")]
#[command(about = "Development tools for Hex Battle")]
struct Cli {
    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate scenario files
    Validate {
        /// Scenario file or directory of scenarios
        #[arg(default_value = "assets/scenarios")]
        path: PathBuf,
    },
    /// Find the closest free position on a scenario's board
    OpenPosition {
        /// Scenario file
        scenario: PathBuf,
        /// Target q
        #[arg(allow_hyphen_values = true)]
        q: i32,
        /// Target r
        #[arg(allow_hyphen_values = true)]
        r: i32,
        /// Footprint radius
        #[arg(long, default_value_t = 1)]
        radius: i32,
        /// Prefer the side away from this position, as `q,r`
        #[arg(long, value_parser = parse_position, allow_hyphen_values = true)]
        behind: Option<HexGridPosition>,
        /// Unit id that does not block the search
        #[arg(long)]
        ignore: Option<u64>,
    },
    /// Search a path on a scenario's board
    Path {
        /// Scenario file
        scenario: PathBuf,
        /// Start, as `q,r`
        #[arg(value_parser = parse_position, allow_hyphen_values = true)]
        from: HexGridPosition,
        /// Destination, as `q,r`
        #[arg(value_parser = parse_position, allow_hyphen_values = true)]
        to: HexGridPosition,
        /// Footprint radius
        #[arg(long, default_value_t = 1)]
        radius: i32,
        /// Stop within this distance of the destination
        #[arg(long, default_value_t = 0)]
        reach: i32,
        /// Unit id that does not block the search
        #[arg(long)]
        ignore: Option<u64>,
    },
    /// Run a scenario headless
    Simulate {
        /// Scenario file
        scenario: PathBuf,
        /// Maximum ticks to run
        #[arg(long, default_value_t = 600)]
        ticks: u32,
    },
}

fn parse_position(text: &str) -> std::result::Result<HexGridPosition, String> {
    let (q, r) = text
        .split_once(',')
        .ok_or_else(|| format!("expected `q,r`, got `{text}`"))?;
    let q = q.trim().parse::<i32>().map_err(|e| format!("bad q: {e}"))?;
    let r = r.trim().parse::<i32>().map_err(|e| format!("bad r: {e}"))?;
    Ok(HexGridPosition::new(q, r))
}

fn print_json(value: &impl Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn run_validate(path: &Path, json: bool) -> Result<bool> {
    tracing::info!("Validating scenarios in: {}", path.display());
    let summary = validate::validate_data_directory(path)?;
    if json {
        print_json(&summary)?;
    } else {
        for file in &summary.files {
            for issue in &file.issues {
                println!("{}: {issue}", file.path);
            }
        }
        println!("{} file(s), {} issue(s)", summary.files.len(), summary.issue_count());
    }
    Ok(summary.is_valid())
}

fn run(cli: Cli) -> Result<bool> {
    match cli.command {
        Commands::Validate { path } => run_validate(&path, cli.json),
        Commands::OpenPosition {
            scenario,
            q,
            r,
            radius,
            behind,
            ignore,
        } => {
            let scenario = query::load_scenario(&scenario)?;
            let found = query::open_position(
                &scenario,
                &OpenPositionQuery {
                    target: HexGridPosition::new(q, r),
                    radius,
                    behind_from: behind,
                    ignore,
                },
            )?;
            if cli.json {
                print_json(&found)?;
            } else {
                match found {
                    Some(position) => println!("{position}"),
                    None => println!("no open position"),
                }
            }
            Ok(found.is_some())
        }
        Commands::Path {
            scenario,
            from,
            to,
            radius,
            reach,
            ignore,
        } => {
            let scenario = query::load_scenario(&scenario)?;
            let result = query::find_path(
                &scenario,
                &PathQuery {
                    from,
                    to,
                    radius,
                    reach,
                    ignore,
                },
            )?;
            if cli.json {
                print_json(&result)?;
            } else if result.reached {
                let cells: Vec<String> = result.path.iter().map(ToString::to_string).collect();
                println!("{} ({} iterations)", cells.join(" -> "), result.iterations);
            } else {
                println!("no path after {} iterations", result.iterations);
            }
            Ok(result.reached)
        }
        Commands::Simulate { scenario, ticks } => {
            let scenario = query::load_scenario(&scenario)?;
            let report = query::simulate(&scenario, ticks)?;
            if cli.json {
                print_json(&report)?;
            } else {
                println!(
                    "{} ticks, {} events, blue {} / red {}, hash {:016x}",
                    report.ticks,
                    report.events.len(),
                    report.blue_active,
                    report.red_active,
                    report.state_hash
                );
            }
            Ok(true)
        }
    }
}

fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            tracing::error!("Command failed: {e}");
            std::process::exit(1);
        }
    }
}
