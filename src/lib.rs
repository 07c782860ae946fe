pub mod backup;
pub mod commands;
pub mod config;
pub mod download;
pub mod error;
pub mod fetcher;
pub mod parser;
pub mod paths;
pub mod remote;
pub mod update;
mod validation;

use tracing_subscriber::EnvFilter;

pub use commands::{AppState, ServerListing, UpdateStatus};
pub use error::{AppError, ErrorKind, Result};
pub use fetcher::{FetchSettings, Fetcher, StopHandle};
pub use parser::{parse_body, parse_line, ServerRecord};

/// Install the log output used by the binary. `log` records from every
/// module are routed through the subscriber; `RUST_LOG` overrides the level.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if let Err(e) = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
    {
        eprintln!("Failed to initialise logging: {}", e);
    }
}
