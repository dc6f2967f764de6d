//! Card rendering boundary
//!
//! Image composition is CPU-bound and lives outside this crate. Calls are
//! moved off the async workers with `spawn_blocking`.

use crate::model::{Entity, Observation};
use async_trait::async_trait;
use std::sync::Arc;
use tierwatch_client::AssetCache;

/// Resolves icon URLs to image bytes
#[async_trait]
pub trait IconSource: Send + Sync {
    /// Bytes behind `url`, `None` when unavailable
    async fn icon(&self, url: &str) -> Option<Arc<[u8]>>;
}

#[async_trait]
impl IconSource for AssetCache {
    async fn icon(&self, url: &str) -> Option<Arc<[u8]>> {
        self.get(url).await
    }
}

/// Icon source that never has an icon
#[derive(Debug, Clone, Copy, Default)]
pub struct NoIcons;

#[async_trait]
impl IconSource for NoIcons {
    async fn icon(&self, _url: &str) -> Option<Arc<[u8]>> {
        None
    }
}

/// Icons fetched for a card
#[derive(Debug, Clone, Default)]
pub struct CardAssets {
    /// Tier icon
    pub tier_icon: Option<Arc<[u8]>>,
    /// Agent portrait
    pub agent_icon: Option<Arc<[u8]>>,
}

/// Everything needed to draw one player card
#[derive(Debug, Clone)]
pub struct CardRequest {
    /// Player
    pub entity: Entity,
    /// State to draw
    pub observation: Observation,
    /// Icons
    pub assets: CardAssets,
}

/// One line of the summary board
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryRow {
    /// 1-based position
    pub position: usize,
    /// Display name
    pub name: String,
    /// Tier label
    pub tier_label: String,
    /// Progress inside the tier
    pub tier_progress: i64,
    /// Absolute rating
    pub score: i64,
}

/// Failure to produce an image
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RenderError {
    /// Renderer rejected the input
    #[error("render failed: {0}")]
    Failed(String),

    /// Blocking worker panicked or was cancelled
    #[error("render worker lost: {0}")]
    Worker(String),
}

/// Produces PNG bytes for cards and the summary board
pub trait Renderer: Send + Sync + 'static {
    /// Draw one player card
    fn render_card(&self, request: &CardRequest) -> Result<Vec<u8>, RenderError>;

    /// Draw the summary board
    fn render_summary(&self, rows: &[SummaryRow]) -> Result<Vec<u8>, RenderError>;
}

/// Draw a card on the blocking pool
pub async fn render_card_offloaded(
    renderer: Arc<dyn Renderer>,
    request: CardRequest,
) -> Result<Vec<u8>, RenderError> {
    tokio::task::spawn_blocking(move || renderer.render_card(&request))
        .await
        .map_err(|e| RenderError::Worker(e.to_string()))?
}

/// Draw the summary board on the blocking pool
pub async fn render_summary_offloaded(
    renderer: Arc<dyn Renderer>,
    rows: Vec<SummaryRow>,
) -> Result<Vec<u8>, RenderError> {
    tokio::task::spawn_blocking(move || renderer.render_summary(&rows))
        .await
        .map_err(|e| RenderError::Worker(e.to_string()))?
}

/// Rank players for the summary board, best first
#[must_use]
pub fn summary_rows<'a, I>(entries: I) -> Vec<SummaryRow>
where
    I: IntoIterator<Item = (&'a Entity, &'a Observation)>,
{
    let mut ranked: Vec<(&Entity, &Observation)> = entries.into_iter().collect();
    ranked.sort_by(|a, b| b.1.ladder_score().cmp(&a.1.ladder_score()));
    ranked
        .into_iter()
        .enumerate()
        .map(|(i, (entity, obs))| SummaryRow {
            position: i + 1,
            name: entity.short_name().to_string(),
            tier_label: obs.tier_label.clone(),
            tier_progress: obs.tier_progress,
            score: obs.score,
        })
        .collect()
}
