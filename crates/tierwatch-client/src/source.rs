//! Ranking lookups for one tracked player
//!
//! Three documents are read per player:
//! - standing: current tier, score, progress within tier, tier ordinal, icon
//! - recent activity: agent played in the most recent match
//! - account level: only needed when the player has no tier

use crate::error::ClientResult;
use crate::resilient::ResilientClient;
use async_trait::async_trait;
use serde::Deserialize;

/// Tier label used when the API reports no competitive tier
pub const UNRANKED: &str = "UNRANKED";

/// Default API root
pub const DEFAULT_BASE_URL: &str = "https://api.henrikdev.xyz/valorant";

/// Current competitive standing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Standing {
    /// Display label of the tier, e.g. `Gold 2`
    pub tier_label: String,
    /// Absolute rating
    pub score: i64,
    /// Progress inside the current tier
    pub tier_progress: i64,
    /// Numeric ordinal of the tier, used for ranking
    pub tier_ordinal: i64,
    /// Tier icon
    pub icon_url: Option<String>,
}

/// Most recent match activity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Activity {
    /// Agent played
    pub agent: String,
    /// Agent portrait
    pub icon_url: Option<String>,
}

/// Source of per-player ranking data
///
/// `Ok(None)` means the upstream answered but has nothing for this player.
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Current standing
    async fn standing(&self, id: &str, region: &str) -> ClientResult<Option<Standing>>;

    /// Agent used in the latest match
    async fn recent_activity(&self, id: &str, region: &str) -> ClientResult<Option<Activity>>;

    /// Account level
    async fn account_level(&self, id: &str, region: &str) -> ClientResult<Option<u32>>;
}

/// [`DataSource`] backed by the public ranking API
#[derive(Debug, Clone)]
pub struct HttpDataSource {
    client: ResilientClient,
    base_url: String,
}

impl HttpDataSource {
    /// Source using [`DEFAULT_BASE_URL`]
    #[must_use]
    pub fn new(client: ResilientClient) -> Self {
        Self::with_base_url(client, DEFAULT_BASE_URL)
    }

    /// Source rooted at `base_url`
    #[must_use]
    pub fn with_base_url(client: ResilientClient, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    /// Underlying client
    #[inline]
    #[must_use]
    pub fn client(&self) -> &ResilientClient {
        &self.client
    }

    fn standing_url(&self, id: &str, region: &str) -> String {
        format!("{}/v2/by-puuid/mmr/{region}/{id}", self.base_url)
    }

    fn matches_url(&self, id: &str, region: &str) -> String {
        format!("{}/v3/by-puuid/matches/{region}/{id}?size=1", self.base_url)
    }

    fn account_url(&self, id: &str) -> String {
        format!("{}/v2/by-puuid/account/{id}", self.base_url)
    }
}

#[async_trait]
impl DataSource for HttpDataSource {
    async fn standing(&self, id: &str, region: &str) -> ClientResult<Option<Standing>> {
        let doc: Option<Envelope<MmrData>> = self
            .client
            .fetch_json(&self.standing_url(id, region), "standing")
            .await?;
        Ok(doc.map(|doc| doc.data.current_data.into_standing()))
    }

    async fn recent_activity(&self, id: &str, region: &str) -> ClientResult<Option<Activity>> {
        let doc: Option<Envelope<Vec<MatchData>>> = self
            .client
            .fetch_json(&self.matches_url(id, region), "recent activity")
            .await?;
        Ok(doc.and_then(|doc| find_agent(doc.data, id)))
    }

    async fn account_level(&self, id: &str, _region: &str) -> ClientResult<Option<u32>> {
        let doc: Option<Envelope<AccountData>> = self
            .client
            .fetch_json(&self.account_url(id), "account level")
            .await?;
        Ok(doc.map(|doc| doc.data.account_level))
    }
}

fn find_agent(matches: Vec<MatchData>, id: &str) -> Option<Activity> {
    let last = matches.into_iter().next()?;
    last.players
        .all_players
        .into_iter()
        .find(|p| p.puuid == id)
        .map(|p| Activity {
            agent: p.character.unwrap_or_else(|| "Unknown".to_string()),
            icon_url: p.assets.agent.small,
        })
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    data: T,
}

#[derive(Debug, Default, Deserialize)]
struct MmrData {
    #[serde(default)]
    current_data: CurrentData,
}

#[derive(Debug, Default, Deserialize)]
struct CurrentData {
    currenttierpatched: Option<String>,
    #[serde(default)]
    currenttier: Option<i64>,
    #[serde(default)]
    elo: Option<i64>,
    #[serde(default)]
    ranking_in_tier: Option<i64>,
    #[serde(default)]
    images: Images,
}

impl CurrentData {
    fn into_standing(self) -> Standing {
        Standing {
            tier_label: self
                .currenttierpatched
                .filter(|label| !label.is_empty())
                .unwrap_or_else(|| UNRANKED.to_string()),
            score: self.elo.unwrap_or(0),
            tier_progress: self.ranking_in_tier.unwrap_or(0),
            tier_ordinal: self.currenttier.unwrap_or(0),
            icon_url: self.images.large,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct Images {
    large: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct MatchData {
    #[serde(default)]
    players: Players,
}

#[derive(Debug, Default, Deserialize)]
struct Players {
    #[serde(default)]
    all_players: Vec<Player>,
}

#[derive(Debug, Default, Deserialize)]
struct Player {
    #[serde(default)]
    puuid: String,
    character: Option<String>,
    #[serde(default)]
    assets: PlayerAssets,
}

#[derive(Debug, Default, Deserialize)]
struct PlayerAssets {
    #[serde(default)]
    agent: AgentAssets,
}

#[derive(Debug, Default, Deserialize)]
struct AgentAssets {
    small: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct AccountData {
    #[serde(default)]
    account_level: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn standing_document_maps_fields() {
        let doc: Envelope<MmrData> = serde_json::from_str(
            r#"{"status":200,"data":{"current_data":{
                "currenttierpatched":"Gold 2","currenttier":13,"elo":1234,
                "ranking_in_tier":34,"images":{"large":"https://img/gold2.png"}}}}"#,
        )
        .unwrap();

        assert_eq!(
            doc.data.current_data.into_standing(),
            Standing {
                tier_label: "Gold 2".into(),
                score: 1234,
                tier_progress: 34,
                tier_ordinal: 13,
                icon_url: Some("https://img/gold2.png".into()),
            }
        );
    }

    #[test]
    fn missing_tier_is_unranked() {
        let doc: Envelope<MmrData> =
            serde_json::from_str(r#"{"data":{"current_data":{"currenttierpatched":null}}}"#)
                .unwrap();
        let standing = doc.data.current_data.into_standing();
        assert_eq!(standing.tier_label, UNRANKED);
        assert_eq!(standing.score, 0);
    }

    #[test]
    fn agent_is_taken_from_the_matching_player() {
        let doc: Envelope<Vec<MatchData>> = serde_json::from_str(
            r#"{"data":[{"players":{"all_players":[
                {"puuid":"other","character":"Sage"},
                {"puuid":"me","character":"Jett","assets":{"agent":{"small":"https://img/jett.png"}}}
            ]}}]}"#,
        )
        .unwrap();

        let activity = find_agent(doc.data, "me").unwrap();
        assert_eq!(activity.agent, "Jett");
        assert_eq!(activity.icon_url.as_deref(), Some("https://img/jett.png"));
        assert!(find_agent(Vec::new(), "me").is_none());
    }
}
