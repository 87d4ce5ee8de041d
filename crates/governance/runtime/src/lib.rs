//! # governance-runtime
//!
//! Composition root of the governance subsystem. [`GovernanceConfig`]
//! layers defaults, an optional file and `GOVERNANCE_*` environment
//! variables; [`GovernanceRuntime`] builds every component from it so that
//! they share a single verifier, storage backend and identity service.
//!
//! ```no_run
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! use governance_runtime::{init_tracing, GovernanceConfig, GovernanceRuntime};
//!
//! let config = GovernanceConfig::load(Some(std::path::Path::new("governance.toml")))?;
//! init_tracing(&config.logging)?;
//! let runtime = GovernanceRuntime::from_config(config).await?;
//! # let _ = runtime;
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(rust_2018_idioms)]

mod config;
mod error;
mod runtime;
pub mod telemetry;

pub use config::{GovernanceConfig, LoggingConfig};
pub use error::{ConfigError, ConfigResult, RuntimeError, RuntimeResult};
pub use runtime::{GovernanceRuntime, RuntimeBuilder};
pub use telemetry::init_tracing;
