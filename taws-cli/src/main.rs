//! otaws: replay recorded aircraft tracks through the terrain awareness
//! alarm engine.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use comfy_table::{Cell, Table};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use taws_core::bank::DetectorBank;
use taws_core::config::{self, Config};
use taws_core::detector::{DetectorKind, DetectorState, DETECTOR_TABLE};
use taws_core::kinematics::Kinematics;
use taws_core::session::{Session, SessionStore};
use taws_core::terrain::{FlatTerrain, TerrainSource};
use taws_core::types::{Sample, TawsError};

mod input;

#[derive(Parser)]
#[command(name = "otaws", version, about = "Terrain awareness alarm replay")]
struct Cli {
    /// Debug logging (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a track file and report alarm changes
    Replay {
        /// Track file, one `lat,lon,alt_ft[,t_s]` per line (`-` for stdin)
        track: PathBuf,

        /// Terrain grid file
        #[arg(long, conflicts_with = "flat")]
        terrain: Option<PathBuf>,

        /// Flat terrain elevation in feet (default: sea level)
        #[arg(long, allow_negative_numbers = true)]
        flat: Option<f64>,

        /// Config file (default: ~/.otaws/config.yaml)
        #[arg(long, env = "OTAWS_CONFIG")]
        config: Option<PathBuf>,

        /// Crew-inhibit a detector for the whole replay (repeatable)
        #[arg(long, value_name = "DETECTOR")]
        inhibit: Vec<String>,

        /// One JSON object per sample instead of change lines
        #[arg(long)]
        json: bool,
    },

    /// List the registered detectors
    Detectors,

    /// Print the effective config
    Config {
        /// Write the default config to ~/.otaws/config.yaml
        #[arg(long)]
        write: bool,
    },
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Replay {
            track,
            terrain,
            flat,
            config,
            inhibit,
            json,
        } => cmd_replay(track, terrain, flat, config, &inhibit, json),
        Commands::Detectors => cmd_detectors(),
        Commands::Config { write } => cmd_config(write),
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn fail(msg: String) -> ! {
    eprintln!("Error: {msg}");
    std::process::exit(1);
}

// ---------------------------------------------------------------------------
// replay
// ---------------------------------------------------------------------------

/// One `--json` output line.
#[derive(Serialize)]
struct ReplayRecord<'a> {
    index: usize,
    sample: Sample,
    t_s: Option<f64>,
    active_count: u8,
    active: Vec<&'static str>,
    states: Vec<DetectorState>,
    kinematics: Option<&'a Kinematics>,
}

fn cmd_replay(
    track: PathBuf,
    terrain: Option<PathBuf>,
    flat: Option<f64>,
    config_path: Option<PathBuf>,
    inhibit: &[String],
    json: bool,
) {
    let config = match &config_path {
        Some(path) => config::load_config_from(path)
            .unwrap_or_else(|e| fail(format!("loading config {}: {e}", path.display()))),
        None => config::load_config(),
    };
    let bank = DetectorBank::new(config).unwrap_or_else(|e| fail(e.to_string()));

    let terrain: Arc<dyn TerrainSource> = match terrain {
        Some(path) => Arc::new(
            input::load_grid(&path)
                .unwrap_or_else(|e| fail(format!("loading terrain {}: {e}", path.display()))),
        ),
        None => Arc::new(FlatTerrain(flat.unwrap_or(0.0))),
    };

    let reader = input::open_track(&track)
        .unwrap_or_else(|e| fail(format!("opening {}: {e}", track.display())));
    let points = input::read_track(reader)
        .unwrap_or_else(|e| fail(format!("reading {}: {e}", track.display())));

    let mut store = SessionStore::with_capacity(Arc::new(bank), terrain, 1);
    let handle = store.create().unwrap_or_else(|e| fail(e.to_string()));
    for name in inhibit {
        let kind: DetectorKind = name.parse().unwrap_or_else(|e: TawsError| fail(e.to_string()));
        store
            .inhibit(handle, kind)
            .unwrap_or_else(|e| fail(e.to_string()));
    }

    let mut last = 0u8;
    let mut peak = 0u8;
    for (index, p) in points.iter().enumerate() {
        let pushed = match p.t_s {
            Some(t) => store.push_timed(handle, p.lat, p.lon, p.altitude_ft, t),
            None => store.push(handle, p.lat, p.lon, p.altitude_ft),
        };
        let count = pushed.unwrap_or_else(|e| fail(e.to_string()));
        let session = store.session(handle).unwrap_or_else(|e| fail(e.to_string()));

        if json {
            let record = ReplayRecord {
                index,
                sample: Sample::new(p.lat, p.lon, p.altitude_ft),
                t_s: p.t_s,
                active_count: count,
                active: session.alarm_table().active().map(|a| a.name).collect(),
                states: DETECTOR_TABLE.iter().map(|s| session.state(s.kind)).collect(),
                kinematics: session.kinematics(),
            };
            match serde_json::to_string(&record) {
                Ok(line) => println!("{line}"),
                Err(e) => fail(e.to_string()),
            }
        } else if count != last {
            let names: Vec<&str> = session.alarm_table().active().map(|a| a.name).collect();
            println!(
                "#{index:<5} {:>9.5} {:>10.5} {:>7.0} ft  {last} -> {count}  [{}]",
                p.lat,
                p.lon,
                p.altitude_ft,
                names.join(", ")
            );
        }
        last = count;
        peak = peak.max(count);
    }

    if json {
        return;
    }

    let session = store.session(handle).unwrap_or_else(|e| fail(e.to_string()));
    println!();
    println!("Replay complete: {}", track.display());
    println!(
        "  Samples: {} accepted, {} rejected",
        session.accepted_samples(),
        session.rejected_samples()
    );
    println!("  Active alarms: {last} at end, {peak} peak");
    println!();
    print_alarm_table(session);
}

fn print_alarm_table(session: &Session) {
    let mut table = Table::new();
    table.set_header(vec!["Alarm", "Importance", "Priority", "State", "Active"]);

    for (alarm, spec) in session.alarms().iter().zip(DETECTOR_TABLE) {
        let mut state = session.state(spec.kind).to_string();
        if session.is_inhibited(spec.kind) {
            state.push_str(" (crew)");
        }
        table.add_row(vec![
            Cell::new(alarm.name),
            Cell::new(alarm.importance),
            Cell::new(alarm.priority),
            Cell::new(state),
            Cell::new(if alarm.active { "yes" } else { "-" }),
        ]);
    }

    println!("{table}");
}

// ---------------------------------------------------------------------------
// detectors / config
// ---------------------------------------------------------------------------

fn cmd_detectors() {
    let mut table = Table::new();
    table.set_header(vec!["#", "Detector", "Importance", "Priority"]);
    for (i, spec) in DETECTOR_TABLE.iter().enumerate() {
        table.add_row(vec![
            Cell::new(i),
            Cell::new(spec.name),
            Cell::new(spec.importance),
            Cell::new(spec.priority),
        ]);
    }
    println!("{table}");
}

fn cmd_config(write: bool) {
    if write {
        let path = config::save_config(&Config::default())
            .unwrap_or_else(|e| fail(format!("writing config: {e}")));
        println!("Wrote {}", path.display());
        return;
    }

    println!("# {}", config::config_file().display());
    print!("{}", config::serialize_config(&config::load_config()));
}
