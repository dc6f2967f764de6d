//! Change-detected reconciliation of ranking state into chat cards
//!
//! - [`ChangeCache`]: last published fingerprint per player, the only
//!   publish gate
//! - [`DataTag`]: hidden machine-readable tag carried by every card
//! - [`reconstruct`]: rebuilds slots and baselines from channel history
//! - [`Publisher`]: idempotent edit-or-create into message slots
//! - [`HoldScanner`]: time-limited hold commands read from a channel
//! - [`Scheduler`]: the jittered, single-flight reconciliation loop
//!
//! # Example
//!
//! ```ignore
//! let scheduler = Scheduler::builder(config, entities, source, renderer, cards, sink)
//!     .with_summary_channel(summary, None)
//!     .build();
//! scheduler.start();
//! ```

#![warn(unreachable_pub)]

pub mod cache;
pub mod channel;
pub mod error;
pub mod holds;
pub mod model;
pub mod publish;
pub mod reconstruct;
pub mod render;
pub mod scheduler;
pub mod slots;
pub mod tag;

#[cfg(test)]
mod testing;

pub use cache::ChangeCache;
pub use channel::{Attachment, ChannelMessage, ChatChannel, PublishError};
pub use error::SchedulerError;
pub use holds::{HoldScanner, HoldSnapshot};
pub use model::{Entity, Fingerprint, MessageId, Observation, Reading, ReadingKind};
pub use publish::{PublishMode, PublishReceipt, Publisher};
pub use reconstruct::{reconstruct, RestoreReport};
pub use render::{CardAssets, CardRequest, IconSource, NoIcons, RenderError, Renderer, SummaryRow};
pub use scheduler::{
    CycleOutcome, CycleReport, EntityOutcome, JitterPolicy, Scheduler, SchedulerBuilder,
    SchedulerConfig,
};
pub use slots::{SlotMap, SUMMARY_SLOT};
pub use tag::{DataTag, TagError};

/// Common imports
pub mod prelude {
    pub use crate::{
        Attachment, ChangeCache, ChatChannel, CycleOutcome, CycleReport, Entity, MessageId,
        Observation, PublishError, Renderer, Scheduler, SchedulerConfig, SlotMap,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
