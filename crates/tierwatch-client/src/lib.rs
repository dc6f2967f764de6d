//! Resilient ranking API client
//!
//! - [`KeyPool`]: credential pool with a shared rotation cursor
//! - [`ResilientClient`]: rotates keys on 429, maps 404 to absent, never
//!   loops on other failures
//! - [`DataSource`]: standing, recent activity and account level lookups
//! - [`AssetCache`]: single-flight icon downloads

#![warn(unreachable_pub)]

pub mod assets;
pub mod error;
pub mod keys;
pub mod resilient;
pub mod source;
pub mod transport;

pub use assets::AssetCache;
pub use error::{ClientError, ClientResult};
pub use keys::KeyPool;
pub use resilient::ResilientClient;
pub use source::{Activity, DataSource, HttpDataSource, Standing, UNRANKED};
pub use transport::{HttpTransport, RawResponse, Transport, DEFAULT_TIMEOUT};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
