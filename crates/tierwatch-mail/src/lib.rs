//! Mailbox ingestion of one-time sign-in codes
//!
//! - [`MailIngestor`]: polling loop with a lazily (re)established session
//! - [`Classifier`]: allow-list AND NOT deny-list sender check
//! - [`CodeExtractor`]: ordered six-digit code patterns
//! - [`CodeHistory`]: process-lifetime dedup of delivered codes
//!
//! The mailbox protocol itself is reached through [`MailboxConnector`].

#![warn(unreachable_pub)]

pub mod classify;
pub mod error;
pub mod extract;
pub mod history;
pub mod ingest;
pub mod mailbox;
pub mod sink;

pub use classify::{Classifier, Verdict};
pub use error::{MailError, MailResult};
pub use extract::CodeExtractor;
pub use history::CodeHistory;
pub use ingest::{Delivery, FoundCode, IngestConfig, MailIngestor, MAIL_NAME};
pub use mailbox::{MailMessage, Mailbox, MailboxConnector};
pub use sink::CodeSink;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
