//! keepsake-store — Project accessor over a keepsake repository.
//!
//!   - `repository`: URI parsing and metadata file I/O
//!   - `daemon`: write-side sessions (`Daemon`, `DaemonLauncher`, `LocalDaemon`)
//!   - `daemon_cache`: single-slot session cache with TTL since creation
//!   - `project`: experiments by id, listing, best checkpoint, delete/stop

pub mod daemon;
pub mod daemon_cache;
pub mod project;
pub mod repository;

pub use daemon::{Daemon, DaemonLauncher, LocalDaemon, LocalLauncher};
pub use daemon_cache::{DaemonCache, DEFAULT_DAEMON_TIMEOUT};
pub use project::{CheckpointSpec, Experiment, ExperimentSpec, Experiments, Project, ProjectOptions, DEFAULT_HEARTBEAT_TIMEOUT};
pub use repository::Repository;
