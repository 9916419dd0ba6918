mod bucket;
pub mod config;
mod error;
mod fsutil;

pub use bucket::Bucket;
pub use config::{AppConfig, Mode, PairingConfig};
pub use error::{DockError, Result};
pub use fsutil::{atomic_write_bytes, atomic_write_json_pretty, ensure_dir, reset_directory};
