//! Mailbox boundary
//!
//! The IMAP session and RFC 822 decoding live outside this crate. Both
//! traits are blocking; the ingestor only calls them from `spawn_blocking`.

use crate::error::MailResult;
use chrono::{DateTime, NaiveDate, Utc};

/// A decoded message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailMessage {
    /// Mailbox UID
    pub uid: u32,
    /// `Date` header
    pub date: DateTime<Utc>,
    /// `From` header
    pub sender: String,
    /// Decoded subject
    pub subject: String,
    /// First plain-text part
    pub body: String,
}

impl MailMessage {
    /// Text the classifier inspects: sender, subject and body
    #[must_use]
    pub fn classification_text(&self) -> String {
        format!("From: {}\nSubject: {}\n{}", self.sender, self.subject, self.body)
    }
}

/// An open, selected mailbox
pub trait Mailbox: Send + 'static {
    /// UIDs of messages received on or after `date`
    fn search_since(&mut self, date: NaiveDate) -> MailResult<Vec<u32>>;

    /// Fetch and decode one message
    fn fetch(&mut self, uid: u32) -> MailResult<MailMessage>;

    /// Close the session
    fn logout(&mut self) -> MailResult<()>;
}

/// Opens mailbox sessions
pub trait MailboxConnector: Send + Sync + 'static {
    /// Connect, log in and select the inbox
    fn connect(&self) -> MailResult<Box<dyn Mailbox>>;
}
