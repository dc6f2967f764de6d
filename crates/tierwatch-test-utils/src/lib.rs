//! Testing utilities for the tierwatch workspace
//!
//! In-memory stand-ins for every external collaborator, plus fixtures.

#![allow(missing_docs)]

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tierwatch_client::{
    Activity, ClientError, ClientResult, DataSource, RawResponse, Standing, Transport,
};
use tierwatch_core::{
    Attachment, CardRequest, ChannelMessage, ChatChannel, Entity, MessageId, PublishError,
    RenderError, Renderer, SummaryRow,
};
use tierwatch_mail::{CodeSink, MailError, MailMessage, MailResult, Mailbox, MailboxConnector};
use tierwatch_runtime::{ReportSink, WatchdogReport};

// ---------------------------------------------------------------------------
// Chat channel
// ---------------------------------------------------------------------------

#[derive(Default)]
struct ChannelState {
    next_id: u64,
    messages: Vec<(ChannelMessage, Option<Attachment>)>,
    creates: usize,
    edits: usize,
    deletes: usize,
    fail_next_edit: Option<PublishError>,
    unavailable: bool,
}

/// Chat channel kept in memory, oldest message first
#[derive(Default)]
pub struct MemoryChannel {
    state: Mutex<ChannelState>,
}

impl MemoryChannel {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn seed(&self, content: &str, posted_at: DateTime<Utc>) -> MessageId {
        let mut state = self.state.lock();
        state.next_id += 1;
        let id = MessageId(state.next_id);
        state.messages.push((
            ChannelMessage {
                id,
                content: content.to_string(),
                posted_at,
            },
            None,
        ));
        id
    }

    pub fn messages(&self) -> Vec<ChannelMessage> {
        self.state.lock().messages.iter().map(|(m, _)| m.clone()).collect()
    }

    pub fn content(&self, id: MessageId) -> Option<String> {
        self.state
            .lock()
            .messages
            .iter()
            .find(|(m, _)| m.id == id)
            .map(|(m, _)| m.content.clone())
    }

    pub fn attachment(&self, id: MessageId) -> Option<Attachment> {
        self.state
            .lock()
            .messages
            .iter()
            .find(|(m, _)| m.id == id)
            .and_then(|(_, a)| a.clone())
    }

    pub fn remove(&self, id: MessageId) {
        self.state.lock().messages.retain(|(m, _)| m.id != id);
    }

    pub fn len(&self) -> usize {
        self.state.lock().messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn creates(&self) -> usize {
        self.state.lock().creates
    }

    pub fn edits(&self) -> usize {
        self.state.lock().edits
    }

    pub fn deletes(&self) -> usize {
        self.state.lock().deletes
    }

    pub fn fail_next_edit(&self, error: PublishError) {
        self.state.lock().fail_next_edit = Some(error);
    }

    /// Make every operation fail with a platform error
    pub fn set_unavailable(&self, unavailable: bool) {
        self.state.lock().unavailable = unavailable;
    }

    fn check_available(state: &ChannelState) -> Result<(), PublishError> {
        if state.unavailable {
            Err(PublishError::Platform("channel unavailable".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ChatChannel for MemoryChannel {
    async fn history(&self, limit: usize) -> Result<Vec<ChannelMessage>, PublishError> {
        let state = self.state.lock();
        Self::check_available(&state)?;
        Ok(state
            .messages
            .iter()
            .rev()
            .take(limit)
            .map(|(m, _)| m.clone())
            .collect())
    }

    async fn create(
        &self,
        content: &str,
        attachment: Option<&Attachment>,
    ) -> Result<MessageId, PublishError> {
        let mut state = self.state.lock();
        Self::check_available(&state)?;
        state.next_id += 1;
        state.creates += 1;
        let id = MessageId(state.next_id);
        state.messages.push((
            ChannelMessage {
                id,
                content: content.to_string(),
                posted_at: Utc::now(),
            },
            attachment.cloned(),
        ));
        Ok(id)
    }

    async fn edit(
        &self,
        id: MessageId,
        content: &str,
        attachment: Option<&Attachment>,
    ) -> Result<(), PublishError> {
        let mut state = self.state.lock();
        Self::check_available(&state)?;
        if let Some(error) = state.fail_next_edit.take() {
            return Err(error);
        }
        let (message, stored) = state
            .messages
            .iter_mut()
            .find(|(m, _)| m.id == id)
            .ok_or(PublishError::NotFound(id))?;
        message.content = content.to_string();
        *stored = attachment.cloned();
        state.edits += 1;
        Ok(())
    }

    async fn delete(&self, id: MessageId) -> Result<(), PublishError> {
        let mut state = self.state.lock();
        Self::check_available(&state)?;
        let before = state.messages.len();
        state.messages.retain(|(m, _)| m.id != id);
        if state.messages.len() == before {
            return Err(PublishError::NotFound(id));
        }
        state.deletes += 1;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// HTTP transport
// ---------------------------------------------------------------------------

/// Transport answering from a queue; falls back to a fixed response
pub struct ScriptedTransport {
    queue: Mutex<VecDeque<ClientResult<RawResponse>>>,
    fallback: ClientResult<RawResponse>,
    calls: Mutex<Vec<(String, Option<String>)>>,
}

impl ScriptedTransport {
    pub fn new(fallback: ClientResult<RawResponse>) -> Arc<Self> {
        Arc::new(Self {
            queue: Mutex::new(VecDeque::new()),
            fallback,
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn always(status: u16) -> Arc<Self> {
        Self::new(Ok(RawResponse::new(status, Vec::new())))
    }

    pub fn push(&self, response: ClientResult<RawResponse>) {
        self.queue.lock().push_back(response);
    }

    pub fn push_json(&self, status: u16, body: &str) {
        self.push(Ok(RawResponse::new(status, body.as_bytes().to_vec())));
    }

    /// `(url, key)` of every request, in order
    pub fn calls(&self) -> Vec<(String, Option<String>)> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn get(&self, url: &str, key: Option<&str>) -> ClientResult<RawResponse> {
        self.calls
            .lock()
            .push((url.to_string(), key.map(str::to_string)));
        self.queue
            .lock()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone())
    }
}

// ---------------------------------------------------------------------------
// Data source
// ---------------------------------------------------------------------------

#[derive(Default)]
struct SourceState {
    standings: HashMap<String, ClientResult<Option<Standing>>>,
    activity: HashMap<String, ClientResult<Option<Activity>>>,
    levels: HashMap<String, ClientResult<Option<u32>>>,
}

/// Data source answering from per-player tables
///
/// Unset players are not found; activity and level default to absent.
#[derive(Default)]
pub struct ScriptedSource {
    state: Mutex<SourceState>,
    lookups: AtomicUsize,
}

impl ScriptedSource {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_standing(&self, id: &str, result: ClientResult<Option<Standing>>) {
        self.state.lock().standings.insert(id.to_string(), result);
    }

    pub fn set_activity(&self, id: &str, result: ClientResult<Option<Activity>>) {
        self.state.lock().activity.insert(id.to_string(), result);
    }

    pub fn set_level(&self, id: &str, result: ClientResult<Option<u32>>) {
        self.state.lock().levels.insert(id.to_string(), result);
    }

    /// Make every lookup for `id` time out
    pub fn fail(&self, id: &str) {
        self.set_standing(id, Err(ClientError::Timeout));
        self.set_activity(id, Err(ClientError::Timeout));
        self.set_level(id, Err(ClientError::Timeout));
    }

    pub fn standing_of(&self, id: &str) -> Option<Standing> {
        match self.state.lock().standings.get(id) {
            Some(Ok(standing)) => standing.clone(),
            _ => None,
        }
    }

    /// Standing lookups served so far
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DataSource for ScriptedSource {
    async fn standing(&self, id: &str, _region: &str) -> ClientResult<Option<Standing>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.state
            .lock()
            .standings
            .get(id)
            .cloned()
            .unwrap_or(Ok(None))
    }

    async fn recent_activity(&self, id: &str, _region: &str) -> ClientResult<Option<Activity>> {
        self.state
            .lock()
            .activity
            .get(id)
            .cloned()
            .unwrap_or(Ok(None))
    }

    async fn account_level(&self, id: &str, _region: &str) -> ClientResult<Option<u32>> {
        self.state.lock().levels.get(id).cloned().unwrap_or(Ok(None))
    }
}

// ---------------------------------------------------------------------------
// Renderer
// ---------------------------------------------------------------------------

pub const PNG_MAGIC: &[u8] = &[0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1a, b'\n'];

/// Renderer producing a PNG signature followed by the drawn text
#[derive(Default)]
pub struct StubRenderer {
    cards: AtomicUsize,
    summaries: AtomicUsize,
}

impl StubRenderer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn cards(&self) -> usize {
        self.cards.load(Ordering::SeqCst)
    }

    pub fn summaries(&self) -> usize {
        self.summaries.load(Ordering::SeqCst)
    }
}

impl Renderer for StubRenderer {
    fn render_card(&self, request: &CardRequest) -> Result<Vec<u8>, RenderError> {
        self.cards.fetch_add(1, Ordering::SeqCst);
        let mut png = PNG_MAGIC.to_vec();
        png.extend_from_slice(request.entity.name.as_bytes());
        png.extend_from_slice(request.observation.tier_label.as_bytes());
        Ok(png)
    }

    fn render_summary(&self, rows: &[SummaryRow]) -> Result<Vec<u8>, RenderError> {
        self.summaries.fetch_add(1, Ordering::SeqCst);
        let mut png = PNG_MAGIC.to_vec();
        for row in rows {
            png.extend_from_slice(format!("{}.{};", row.position, row.name).as_bytes());
        }
        Ok(png)
    }
}

// ---------------------------------------------------------------------------
// Mailbox
// ---------------------------------------------------------------------------

#[derive(Default)]
struct ServerState {
    messages: Vec<MailMessage>,
    connects: usize,
    logouts: usize,
    fail_next_search: bool,
    refuse_login: bool,
}

/// Mail server shared by every session it hands out
#[derive(Default)]
pub struct MemoryMailServer {
    state: Mutex<ServerState>,
}

impl MemoryMailServer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn deliver(&self, message: MailMessage) {
        self.state.lock().messages.push(message);
    }

    pub fn connects(&self) -> usize {
        self.state.lock().connects
    }

    pub fn logouts(&self) -> usize {
        self.state.lock().logouts
    }

    /// Drop the connection on the next search
    pub fn fail_next_search(&self) {
        self.state.lock().fail_next_search = true;
    }

    pub fn refuse_login(&self, refuse: bool) {
        self.state.lock().refuse_login = refuse;
    }

    pub fn connector(self: &Arc<Self>) -> Arc<MemoryConnector> {
        Arc::new(MemoryConnector(Arc::clone(self)))
    }
}

/// Opens sessions on a [`MemoryMailServer`]
pub struct MemoryConnector(Arc<MemoryMailServer>);

impl MailboxConnector for MemoryConnector {
    fn connect(&self) -> MailResult<Box<dyn Mailbox>> {
        let mut state = self.0.state.lock();
        if state.refuse_login {
            return Err(MailError::Connection("login refused".into()));
        }
        state.connects += 1;
        Ok(Box::new(MemorySession(Arc::clone(&self.0))))
    }
}

struct MemorySession(Arc<MemoryMailServer>);

impl Mailbox for MemorySession {
    fn search_since(&mut self, date: NaiveDate) -> MailResult<Vec<u32>> {
        let mut state = self.0.state.lock();
        if std::mem::take(&mut state.fail_next_search) {
            return Err(MailError::Connection("connection reset by peer".into()));
        }
        // The local day may start ahead of the UTC date of a fresh message.
        Ok(state
            .messages
            .iter()
            .filter(|m| m.date.date_naive() >= date.pred_opt().unwrap_or(date))
            .map(|m| m.uid)
            .collect())
    }

    fn fetch(&mut self, uid: u32) -> MailResult<MailMessage> {
        self.0
            .state
            .lock()
            .messages
            .iter()
            .find(|m| m.uid == uid)
            .cloned()
            .ok_or_else(|| MailError::Parse {
                uid,
                reason: "no such message".into(),
            })
    }

    fn logout(&mut self) -> MailResult<()> {
        self.0.state.lock().logouts += 1;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Sinks
// ---------------------------------------------------------------------------

/// Code sink that records deliveries
#[derive(Default)]
pub struct RecordingCodeSink {
    codes: Mutex<Vec<String>>,
    refuse: Mutex<bool>,
}

impl RecordingCodeSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn codes(&self) -> Vec<String> {
        self.codes.lock().clone()
    }

    pub fn refuse(&self, refuse: bool) {
        *self.refuse.lock() = refuse;
    }
}

#[async_trait]
impl CodeSink for RecordingCodeSink {
    async fn deliver(&self, code: &str) -> MailResult<()> {
        if *self.refuse.lock() {
            return Err(MailError::Delivery("sink refused".into()));
        }
        self.codes.lock().push(code.to_string());
        Ok(())
    }
}

/// Report sink that records crashes and watchdog reports
#[derive(Default)]
pub struct RecordingReportSink {
    crashes: Mutex<Vec<(String, String)>>,
    reports: Mutex<Vec<WatchdogReport>>,
    latency: Mutex<Option<std::time::Duration>>,
}

impl RecordingReportSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn crashes(&self) -> Vec<(String, String)> {
        self.crashes.lock().clone()
    }

    pub fn reports(&self) -> Vec<WatchdogReport> {
        self.reports.lock().clone()
    }

    pub fn set_latency(&self, latency: Option<std::time::Duration>) {
        *self.latency.lock() = latency;
    }
}

#[async_trait]
impl ReportSink for RecordingReportSink {
    async fn crash(&self, source: &str, error: &str) {
        self.crashes
            .lock()
            .push((source.to_string(), error.to_string()));
    }

    async fn watchdog(&self, report: &WatchdogReport) {
        self.reports.lock().push(report.clone());
    }

    async fn latency(&self) -> Option<std::time::Duration> {
        *self.latency.lock()
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

const NAMES: &[&str] = &["Alice#EUW", "Bruno#1234", "Chiara#ITA", "Dario#777", "Elena#SKY"];

/// Player `i` of a fixed roster
pub fn entity(i: usize) -> Entity {
    let name = match NAMES.get(i) {
        Some(name) => (*name).to_string(),
        None => format!("Player{i}#SIM"),
    };
    Entity::new(format!("puuid-{i}"), name, "eu")
}

pub fn roster(n: usize) -> Vec<Entity> {
    (0..n).map(entity).collect()
}

pub fn standing(label: &str, ordinal: i64, progress: i64) -> Standing {
    Standing {
        tier_label: label.to_string(),
        score: ordinal * 100 + progress,
        tier_progress: progress,
        tier_ordinal: ordinal,
        icon_url: Some(format!("https://media.example/tiers/{ordinal}.png")),
    }
}

pub fn activity(agent: &str) -> Activity {
    Activity {
        agent: agent.to_string(),
        icon_url: Some(format!("https://media.example/agents/{}.png", agent.to_lowercase())),
    }
}

/// Sign-in mail from the publisher carrying `code`
pub fn code_mail(uid: u32, minutes_ago: i64, code: &str) -> MailMessage {
    MailMessage {
        uid,
        date: Utc::now() - Duration::minutes(minutes_ago),
        sender: "Riot Games <noreply@mail.accounts.riotgames.com>".to_string(),
        subject: "Your sign-in code".to_string(),
        body: format!("Riot Games\nYour verification code is {code}\nIt expires soon."),
    }
}
