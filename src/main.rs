//! DERBY: race-day betting pool scoring and standings.
//!
//! Entry point. Loads configuration, initialises structured logging,
//! restores the event from the state file, and runs one desk command
//! against it. `serve` keeps running and exposes the read-only dashboard.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use derby::config::AppConfig;
use derby::dashboard::{self, routes::DashboardState};
use derby::engine::scoring;
use derby::engine::{DerbyEvent, EventDefaults};
use derby::import;
use derby::session::Session;
use derby::snapshot::{EventSnapshot, LegacyExport};
use derby::storage::{JsonFileStore, SnapshotStore};
use derby::types::Podium;

const DEFAULT_CONFIG: &str = "config.toml";

#[derive(Parser)]
#[command(name = "derby")]
#[command(author, version, about = "Race-day betting pool scoring", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the TOML config file
    #[arg(long, default_value = DEFAULT_CONFIG)]
    config: PathBuf,

    /// State file (overrides event.state_file from the config)
    #[arg(long)]
    state: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Number horses 1..COUNT and close horse setup
    SetupHorses {
        count: u32,
    },

    /// Add a single horse to the roster
    AddHorse {
        number: String,
    },

    /// Remove a horse no race refers to
    RemoveHorse {
        number: String,
    },

    /// Close horse setup (adds the default roster if none was entered)
    CompleteHorseSetup,

    /// Register a bettor
    AddBettor {
        name: String,
    },

    /// Remove a bettor and all of their picks
    RemoveBettor {
        name: String,
    },

    /// Register bettors from a file, one name per line
    ImportBettors {
        file: PathBuf,

        /// File is a CSV sheet; names come from the first "name" column
        #[arg(long)]
        csv: bool,
    },

    /// Number of bettors required before bettor setup can close
    SetBettorTarget {
        count: u32,
    },

    /// Close bettor setup and start racing
    CompleteBettorSetup,

    /// Record a race result and the picks made on it
    Finalize {
        /// Race number
        #[arg(short, long)]
        race: u32,

        /// Winning horse
        #[arg(long)]
        first: String,

        /// Second-place horse
        #[arg(long)]
        second: String,

        /// Third-place horse
        #[arg(long)]
        third: String,

        /// Picks file with one `Name:Horse` per line
        #[arg(long)]
        picks: Option<PathBuf>,
    },

    /// Print the picks recorded for a race, one `Name:Horse` per line
    Picks {
        race: u32,
    },

    /// Move on to the next race
    Advance,

    /// Change how many races the event has
    SetTotalRaces {
        total: u32,
    },

    /// Print the leaderboard
    Standings {
        /// Only show bettors whose name contains this text
        #[arg(short, long)]
        search: Option<String>,

        /// Print CSV with one points column per finalized race
        #[arg(long)]
        csv: bool,
    },

    /// Print how many bettors scored 3, 2, 1, or 0 in each finalized race
    Breakdown,

    /// Write the event as a JSON snapshot (stdout if no file is given)
    Export {
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Replace the event with one loaded from a JSON snapshot
    Import {
        file: PathBuf,

        /// File is in the flat export format of the old web page
        #[arg(long)]
        legacy: bool,
    },

    /// Clear part or all of the event
    Reset {
        #[arg(value_enum)]
        scope: ResetScope,
    },

    /// Print phase, progress, and headline numbers
    Status,

    /// Run the read-only dashboard, reloading the state file periodically
    Serve {
        /// Port (overrides dashboard.port from the config)
        #[arg(short, long)]
        port: Option<u16>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ResetScope {
    All,
    Horses,
    Bettors,
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!(error = %format!("{e:#}"), "Command failed");
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let cli = Cli::parse();
    init_logging();

    let cfg = load_config(&cli.config)?;
    let state_path = cli
        .state
        .clone()
        .unwrap_or_else(|| PathBuf::from(&cfg.event.state_file));
    let store = JsonFileStore::new(&state_path);
    let defaults = cfg.event_defaults();

    if let Commands::Serve { port } = cli.command {
        let port = port.unwrap_or(cfg.dashboard.port);
        return serve(&cfg, store, defaults, port).await;
    }

    let mut session = Session::open(store, defaults)?;
    run_command(cli.command, &mut session, defaults)
}

/// Execute one state-changing or reporting command.
fn run_command(
    command: Commands,
    session: &mut Session<JsonFileStore>,
    defaults: EventDefaults,
) -> Result<()> {
    match command {
        Commands::SetupHorses { count } => {
            session.apply(|event| event.setup_horses(count))?;
            info!(count, "Horse setup complete");
            println!("Horses 1-{count} added, horse setup complete.");
        }
        Commands::AddHorse { number } => {
            session.apply(|event| event.add_horse(&number))?;
            info!(horse = %number, "Horse added");
            println!("Added horse #{number}.");
        }
        Commands::RemoveHorse { number } => {
            session.apply(|event| event.remove_horse(&number))?;
            info!(horse = %number, "Horse removed");
            println!("Removed horse #{number}.");
        }
        Commands::CompleteHorseSetup => {
            session.apply(|event| event.complete_horse_setup())?;
            let horses = session.event().list_horses();
            info!(horses = horses.len(), "Horse setup complete");
            println!("Horse setup complete with {} horses.", horses.len());
        }
        Commands::AddBettor { name } => {
            let id = session.apply(|event| event.add_bettor(&name))?;
            info!(bettor = %name, id = %id, "Bettor added");
            println!("Added bettor {name} ({id}).");
        }
        Commands::RemoveBettor { name } => {
            session.apply(|event| event.remove_bettor(&name))?;
            info!(bettor = %name, "Bettor removed with picks");
            println!("Removed bettor {name} and their picks.");
        }
        Commands::ImportBettors { file, csv } => {
            let text = read_file(&file)?;
            let names = if csv {
                import::parse_bettor_csv(&text)
                    .with_context(|| format!("Failed to parse bettor CSV {}", file.display()))?
            } else {
                import::parse_names(&text)
            };
            let report = session.apply(|event| Ok(event.add_bettors_bulk(&names)))?;
            info!(
                added = report.added.len(),
                skipped = report.skipped.len(),
                rejected = report.rejected.len(),
                "Bettors imported"
            );
            println!("Added {} bettor(s).", report.added.len());
            if !report.skipped.is_empty() {
                println!("Skipped (already registered): {}", report.skipped.join(", "));
            }
            for (name, reason) in &report.rejected {
                warn!(bettor = %name, error = %reason, "Bettor rejected");
                println!("Rejected {name:?}: {reason}");
            }
        }
        Commands::SetBettorTarget { count } => {
            session.apply(|event| event.set_target_bettor_count(count))?;
            println!("Bettor target set to {count}.");
        }
        Commands::CompleteBettorSetup => {
            session.apply(|event| event.complete_bettor_setup())?;
            let bettors = session.event().roster().bettor_count();
            info!(bettors, "Bettor setup complete");
            println!("Bettor setup complete with {bettors} bettors. Racing is open.");
        }
        Commands::Finalize {
            race,
            first,
            second,
            third,
            picks,
        } => {
            let picks = match picks {
                Some(path) => import::parse_picks(&read_file(&path)?)
                    .into_picks()
                    .with_context(|| format!("Picks file {} not accepted", path.display()))?,
                None => Default::default(),
            };
            let podium = Podium::new(first, second, third);
            let pick_count = picks.len();
            session.apply(|event| event.finalize_race(race, podium.clone(), picks))?;
            info!(race, result = %podium, picks = pick_count, "Race finalized");
            println!("Race {race} finalized: {podium} ({pick_count} picks).");
        }
        Commands::Picks { race } => {
            let event = session.event();
            let Some(found) = event.get_race(race) else {
                anyhow::bail!("race {race} has not been recorded");
            };
            if !found.is_finalized() {
                println!("Race {race} is pending; no picks recorded.");
            } else {
                println!("{}", import::format_picks(&event.picks_for(race)));
            }
        }
        Commands::Advance => {
            let current = session.apply(|event| event.advance_race())?;
            let total = session.event().config().total_races;
            info!(current_race = current, total_races = total, "Advanced");
            if current > total {
                println!("All {total} races run. Event complete.");
            } else {
                println!("Now on race {current} of {total}.");
            }
        }
        Commands::SetTotalRaces { total } => {
            session.apply(|event| event.set_total_races(total))?;
            info!(total_races = total, "Race count changed");
            println!("Event now has {total} races.");
        }
        Commands::Standings { search, csv } => {
            let event = session.event();
            let standings = event.compute_standings();
            let standings = match search.as_deref() {
                Some(term) => scoring::filter_standings(&standings, term),
                None => standings,
            };
            if csv {
                let text = scoring::render_csv(&standings, event.ledger())
                    .context("Failed to write standings CSV")?;
                print!("{text}");
            } else {
                print!("{}", scoring::render_leaderboard(&standings));
            }
        }
        Commands::Breakdown => {
            let rows = session.event().race_breakdown();
            if rows.is_empty() {
                println!("No races finalized yet.");
            }
            for row in rows {
                println!(
                    "Race {:>2}: {} winner, {} second, {} third, {} no points",
                    row.race_number, row.first, row.second, row.third, row.no_points
                );
            }
        }
        Commands::Export { out } => {
            let json = serde_json::to_string_pretty(&session.event().export_snapshot())
                .context("Failed to serialise export")?;
            match out {
                Some(path) => {
                    std::fs::write(&path, json)
                        .with_context(|| format!("Failed to write export to {}", path.display()))?;
                    info!(path = %path.display(), "Event exported");
                    println!("Exported to {}.", path.display());
                }
                None => println!("{json}"),
            }
        }
        Commands::Import { file, legacy } => {
            let text = read_file(&file)?;
            let snapshot: EventSnapshot = if legacy {
                let old: LegacyExport = serde_json::from_str(&text)
                    .with_context(|| format!("Failed to parse legacy export {}", file.display()))?;
                old.into()
            } else {
                serde_json::from_str(&text)
                    .with_context(|| format!("Failed to parse snapshot {}", file.display()))?
            };
            session.apply(|event| {
                *event = DerbyEvent::import_snapshot(&snapshot, defaults)?;
                Ok(())
            })?;
            let stats = session.event().stats();
            info!(
                path = %file.display(),
                horses = stats.total_horses,
                bettors = stats.total_bettors,
                races = stats.completed_races,
                "Event imported"
            );
            println!(
                "Imported {} horses, {} bettors, {} completed races.",
                stats.total_horses, stats.total_bettors, stats.completed_races
            );
        }
        Commands::Reset { scope } => {
            match scope {
                ResetScope::All => session.apply(|event| {
                    event.reset_all();
                    Ok(())
                })?,
                ResetScope::Horses => session.apply(|event| event.reset_horses())?,
                ResetScope::Bettors => session.apply(|event| event.reset_bettors())?,
            }
            warn!(phase = %session.event().phase(), "Event reset");
            println!("Reset done. Phase: {}.", session.event().phase());
        }
        Commands::Status => print_status(session.event()),
        Commands::Serve { .. } => anyhow::bail!("serve does not run against a session"),
    }
    Ok(())
}

fn print_status(event: &DerbyEvent) {
    let cfg = event.config();
    let stats = event.stats();
    let summary = event.summary();

    println!("Phase:        {}", event.phase());
    println!("Current race: {} of {}", cfg.current_race.min(cfg.total_races), cfg.total_races);
    println!("Horses:       {}", stats.total_horses);
    match cfg.target_bettor_count {
        Some(target) => println!("Bettors:      {} (target {target})", stats.total_bettors),
        None => println!("Bettors:      {}", stats.total_bettors),
    }
    println!("Completed:    {} of {}", summary.completed_races, summary.total_races);
    if let (Some(lead), Some(avg)) = (summary.leading_score, summary.average_score) {
        println!("Leading:      {lead} pts (average {avg:.1})");
    }
}

/// Serve the dashboard until Ctrl+C, reloading the state file on an interval
/// so changes made by other `derby` invocations show up.
async fn serve(cfg: &AppConfig, store: JsonFileStore, defaults: EventDefaults, port: u16) -> Result<()> {
    if !cfg.dashboard.enabled {
        warn!("dashboard.enabled is false in config; serving anyway because it was asked for");
    }

    let event = Session::open(store.clone(), defaults)?.into_event();
    let state = Arc::new(DashboardState::new(cfg.event.name.clone(), event));
    let server = dashboard::spawn_dashboard(state.clone(), port).await?;

    let mut interval = tokio::time::interval(Duration::from_secs(cfg.dashboard.refresh_secs));
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    info!(
        port,
        state_file = %store.path().display(),
        refresh_secs = cfg.dashboard.refresh_secs,
        "Serving dashboard. Press Ctrl+C to stop."
    );

    loop {
        tokio::select! {
            _ = interval.tick() => {
                match reload(&store, defaults) {
                    Ok(Some(event)) => state.replace(event).await,
                    Ok(None) => {}
                    Err(e) => warn!(error = %format!("{e:#}"), "Reload failed, keeping last good state"),
                }
            }
            _ = &mut shutdown => {
                info!("Shutdown signal received.");
                break;
            }
        }
    }

    server.abort();
    Ok(())
}

fn reload(store: &JsonFileStore, defaults: EventDefaults) -> Result<Option<DerbyEvent>> {
    let Some(snapshot) = store.load()? else {
        return Ok(None);
    };
    Ok(Some(DerbyEvent::import_snapshot(&snapshot, defaults)?))
}

fn load_config(path: &Path) -> Result<AppConfig> {
    if !path.exists() {
        info!(path = %path.display(), "No config file, using defaults");
        return Ok(AppConfig::default());
    }
    let path = path
        .to_str()
        .with_context(|| format!("Config path is not valid UTF-8: {}", path.display()))?;
    AppConfig::load(path)
}

fn read_file(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

/// Initialise the `tracing` subscriber.
///
/// Logs go to stderr so command output on stdout stays pipeable.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("derby=info"));

    let json_logging = std::env::var("DERBY_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .init();
    }
}
