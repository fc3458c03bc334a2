//! taws-core: terrain awareness alarm engine.
//!
//! No async, no I/O beyond the config file: push aircraft samples into a
//! session, get back the number of active alarms. The `otaws` CLI in
//! `taws-cli` replays recorded tracks through this crate.

pub mod alarms;
pub mod bank;
pub mod config;
pub mod detector;
pub mod kinematics;
pub mod session;
pub mod terrain;
pub mod types;

// Re-export commonly used types at crate root
pub use alarms::AlarmTable;
pub use bank::DetectorBank;
pub use config::Config;
pub use detector::{DetectorKind, DetectorState, DETECTOR_TABLE};
pub use session::{Session, SessionHandle, SessionStore};
pub use terrain::{FlatTerrain, GridTerrain, NoTerrain, TerrainSource};
pub use types::*;
