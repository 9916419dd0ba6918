//! Workspace lifecycle, upload registry and the experiment pairing cache.
//!
//! Every operation takes an explicit [`SessionContext`]; nothing here reads
//! ambient state. A session is opened by [`WorkspaceManager::open_session`],
//! bound to a workspace by [`WorkspaceManager::resolve_workspace`] (which
//! loads the registry from disk), and then fed uploads and pairing cycles.

mod cache;
pub mod mzml;
mod pairing;
pub mod params;
mod parser;
mod registry;
mod removal;
mod report;
mod session;
mod workspace;

pub use cache::{CacheEntry, ParseCache, SummaryRow, SummaryTable};
pub use mzml::MzmlParser;
pub use pairing::{experiment_identity, run_pairing_cycle, CycleOutcome};
pub use params::{ImageFormat, ParameterOverrides, Parameters};
pub use parser::{Calibration, ExperimentParser, ParsedExperiment, SpectrumRow, SpectrumTable};
pub use registry::{import_directory, ingest, FileRegistry, IngestOutcome, UploadedFile};
pub use removal::{remove_experiments, reset_all, RemovedExperiment};
pub use report::{ProgressGuard, RecordingReporter, ReportEvent, Reporter};
pub use session::SessionContext;
pub use workspace::{
    ensure_directories, AccessGate, TokenGate, WorkspaceHandle, WorkspaceInfo, WorkspaceManager,
};

pub use mzdock_core::{AppConfig, Bucket, DockError, Mode, PairingConfig, Result};
