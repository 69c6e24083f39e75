use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, Level};

use muxsim::grading::{evaluate, simulator_snapshot, Mission};
use muxsim::probe::{ProbeCoordinator, ProbeTransport, PROBE_COMMAND};
use muxsim::replay::{parse_script, render_summary, Replay};
use muxsim::scenario::{self, SCENARIOS};
use muxsim::settings::SimulatorSettings;

#[derive(Parser)]
#[command(name = "muxsim", version, about = "Deterministic tmux practice simulator")]
struct Cli {
    /// More log output on stderr (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    /// Simulator settings file (TOML)
    #[arg(long, global = true)]
    settings: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a script and print the resulting state
    Replay {
        script: PathBuf,
        /// Scenario to start from
        #[arg(long)]
        scenario: Option<String>,
        /// Print the full state as JSON
        #[arg(long)]
        json: bool,
    },
    /// Replay a script, then grade a mission against the result
    Grade { mission: PathBuf, script: PathBuf },
    /// Grade a mission against live output read from stdin
    Probe { mission: PathBuf },
    /// List the built-in scenarios
    Scenarios,
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt().with_max_level(level).with_writer(io::stderr).with_target(false).init();
}

fn load_settings(path: Option<&Path>) -> Result<SimulatorSettings> {
    match path {
        Some(p) => SimulatorSettings::load(p),
        None => Ok(SimulatorSettings::default()),
    }
}

fn load_mission(path: &Path) -> Result<Mission> {
    let content = fs::read_to_string(path).with_context(|| format!("reading mission {}", path.display()))?;
    Mission::from_json_str(&content).with_context(|| format!("parsing mission {}", path.display()))
}

fn replay_script(path: &Path, scenario_name: Option<&str>, settings: SimulatorSettings) -> Result<Replay> {
    let content = fs::read_to_string(path).with_context(|| format!("reading script {}", path.display()))?;
    let steps = parse_script(&content).with_context(|| format!("parsing script {}", path.display()))?;
    let state = scenario::build(scenario_name.unwrap_or(scenario::DEFAULT_SCENARIO), settings);
    let mut replay = Replay::new(state);
    replay.run(&steps);
    info!(steps = steps.len(), virtual_ms = replay.now, "replay finished");
    Ok(replay)
}

/// Prints the probe command to stderr for whoever drives the live shell.
struct StderrTransport;

impl ProbeTransport for StderrTransport {
    fn dispatch(&mut self, reason: &str) -> Result<()> {
        let mut err = io::stderr().lock();
        writeln!(err, "# probe ({}): {}", reason, PROBE_COMMAND).context("writing probe request")?;
        Ok(())
    }
}

fn run_probe(mission: &Mission, settings: SimulatorSettings) -> Result<()> {
    let mut coordinator = ProbeCoordinator::new(StderrTransport, settings.probe);
    let started = Instant::now();
    let elapsed = || started.elapsed().as_millis() as u64;
    coordinator.request("start", elapsed());

    let mut stdin = io::stdin().lock();
    let mut buf = [0u8; 8192];
    loop {
        let n = stdin.read(&mut buf).context("reading live output")?;
        if n == 0 {
            break;
        }
        let now = elapsed();
        coordinator.ingest(&String::from_utf8_lossy(&buf[..n]), now);
        coordinator.tick(now);
    }
    coordinator.finish(elapsed());
    info!(
        dispatched = coordinator.scheduler().dispatch_seq,
        acked = coordinator.scheduler().ack_seq,
        "live stream ended"
    );

    let result = evaluate(&coordinator.snapshot(), mission);
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let settings = load_settings(cli.settings.as_deref())?;

    match cli.command {
        Commands::Replay { script, scenario, json } => {
            let replay = replay_script(&script, scenario.as_deref(), settings)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&replay.state)?);
            } else {
                print!("{}", render_summary(&replay.state));
            }
            Ok(())
        }
        Commands::Grade { mission, script } => {
            let mission = load_mission(&mission)?;
            let replay = replay_script(&script, mission.initial_scenario.as_deref(), settings)?;
            let result = evaluate(&simulator_snapshot(&replay.state), &mission);
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(())
        }
        Commands::Probe { mission } => {
            let mission = load_mission(&mission)?;
            run_probe(&mission, settings)
        }
        Commands::Scenarios => {
            for name in SCENARIOS {
                println!("{}", name);
            }
            Ok(())
        }
    }
}
