//! tierwatch daemon
//!
//! Wires the ranking client, the reconciliation scheduler, the mail ingestor
//! and the supervisor into one process:
//! - [`config`]: TOML settings with environment overrides
//! - [`adapters`]: channel-backed code and report sinks
//! - [`app`]: component wiring and lifecycle
//! - [`commands`]: operator commands
//! - [`sim`]: seeded end-to-end simulation
//!
//! The chat platform, the card renderer and the mailbox session are bound by
//! the host process, which embeds [`App`] and maps its slash commands onto
//! [`Console`]. The `tierwatch` binary only validates configurations, decodes
//! card tags and runs the simulation.
//!
//! ```rust,ignore
//! let settings = Settings::load("tierwatch.toml")?;
//! let (source, icons) = http_source(&settings.api)?;
//! let app = App::build(
//!     &settings,
//!     Collaborators {
//!         source,
//!         icons: Some(icons),
//!         renderer,
//!         cards,
//!         summary: Some(summary),
//!         holds: Some(holds),
//!         codes: Some(codes),
//!         logs: Some(logs),
//!         mailbox: Some(imap),
//!     },
//! );
//! app.start();
//! let console = app.console();
//! // ... serve commands until the platform disconnects
//! app.shutdown().await;
//! ```

#![warn(unreachable_pub)]

pub mod adapters;
pub mod app;
pub mod commands;
pub mod config;
pub mod sim;

pub use app::{http_source, App, Collaborators};
pub use commands::Console;
pub use config::{ConfigError, Settings};
pub use sim::{run_simulation, SimConfig, SimReport};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
