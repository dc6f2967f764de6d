//! Hidden data tag embedded in every published card
//!
//! Format: `||data:<status>:<score>:<progress>:<hold>[:<agent>]||`, with the
//! literal `None` standing for "no hold". Free-text fields are stripped of
//! `:` and `|` on encode so that every encoded tag decodes.

use crate::model::{Entity, Fingerprint, Observation, UNAVAILABLE, UNKNOWN_AGENT};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

const NO_HOLD: &str = "None";

static TAG_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\|\|data:([^|]*)\|\|").unwrap_or_else(|e| unreachable!("tag regex: {e}"))
});

static NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\*\*(.+?)\*\*").unwrap_or_else(|e| unreachable!("name regex: {e}")));

/// Why a message body did not yield a tag
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TagError {
    /// No tag in the body
    #[error("no data tag")]
    Missing,

    /// A tag is present but cannot be read
    #[error("malformed data tag: {0}")]
    Malformed(String),
}

/// Decoded card tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataTag {
    /// Tier label
    pub status: String,
    /// Absolute rating
    pub score: i64,
    /// Progress inside the tier
    pub tier_progress: i64,
    /// Hold label, `None` when no hold was active
    pub hold: Option<String>,
    /// Agent of the latest match, absent in older cards
    pub last_agent: Option<String>,
}

impl DataTag {
    /// Tag describing `observation`
    #[must_use]
    pub fn from_observation(observation: &Observation) -> Self {
        Self {
            status: observation.tier_label.clone(),
            score: observation.score,
            tier_progress: observation.tier_progress,
            hold: observation.hold.clone(),
            last_agent: Some(observation.last_agent.clone()),
        }
    }

    /// Find and decode the tag in a message body
    pub fn decode(body: &str) -> Result<Self, TagError> {
        let caps = TAG_RE.captures(body).ok_or(TagError::Missing)?;
        let inner = caps.get(1).map_or("", |m| m.as_str());
        let parts: Vec<&str> = inner.split(':').collect();
        if !(4..=5).contains(&parts.len()) {
            return Err(TagError::Malformed(format!(
                "expected 4 or 5 fields, found {}",
                parts.len()
            )));
        }

        let status = parts[0].trim();
        if status.is_empty() {
            return Err(TagError::Malformed("empty status".into()));
        }
        let score = parse_number(parts[1], "score")?;
        let tier_progress = parse_number(parts[2], "progress")?;
        let hold = match parts[3].trim() {
            "" | NO_HOLD => None,
            label => Some(label.to_string()),
        };
        let last_agent = parts
            .get(4)
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        Ok(Self {
            status: status.to_string(),
            score,
            tier_progress,
            hold,
            last_agent,
        })
    }

    /// Baseline fingerprint; ordinal and account level are not carried
    #[must_use]
    pub fn to_fingerprint(&self) -> Fingerprint {
        Fingerprint {
            tier_label: self.status.clone(),
            score: self.score,
            tier_progress: self.tier_progress,
            hold: self.hold.clone(),
            last_agent: self
                .last_agent
                .clone()
                .unwrap_or_else(|| UNKNOWN_AGENT.to_string()),
            tier_ordinal: None,
            account_level: None,
        }
    }
}

impl fmt::Display for DataTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hold = sanitize_hold(self.hold.as_deref()).unwrap_or_else(|| NO_HOLD.to_string());
        let mut status = sanitize(&self.status);
        if status.is_empty() {
            status = UNAVAILABLE.to_string();
        }
        write!(
            f,
            "||data:{}:{}:{}:{}",
            status,
            self.score,
            self.tier_progress,
            hold
        )?;
        if let Some(agent) = &self.last_agent {
            write!(f, ":{}", sanitize(agent))?;
        }
        f.write_str("||")
    }
}

/// Strip the tag delimiters and surrounding blanks from free text
#[must_use]
pub fn sanitize(text: &str) -> String {
    let cleaned: String = text.chars().filter(|c| !matches!(c, ':' | '|')).collect();
    cleaned.trim().to_string()
}

/// Tag-safe hold label; blank labels mean no hold
#[must_use]
pub fn sanitize_hold(hold: Option<&str>) -> Option<String> {
    hold.map(sanitize).filter(|h| !h.is_empty() && h != NO_HOLD)
}

/// Body of a player card: bold name, region, hidden tag
#[must_use]
pub fn card_body(entity: &Entity, observation: &Observation) -> String {
    format!(
        "**{}**\n{}\n{}",
        entity.name,
        entity.region.to_uppercase(),
        DataTag::from_observation(observation)
    )
}

/// Bold name fragment of a card body
#[must_use]
pub fn card_name(body: &str) -> Option<&str> {
    NAME_RE
        .captures(body)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
}

fn parse_number(field: &str, what: &str) -> Result<i64, TagError> {
    field
        .trim()
        .parse()
        .map_err(|_| TagError::Malformed(format!("{what} is not a number: {field:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn observation() -> Observation {
        Observation {
            tier_label: "Platinum 3".into(),
            score: 1560,
            tier_progress: 60,
            tier_ordinal: 17,
            account_level: 0,
            hold: Some("⛔ BANNED 2h 5m".into()),
            last_agent: "KAY/O".into(),
        }
    }

    #[test]
    fn decodes_legacy_four_field_tag() {
        let tag = DataTag::decode("**Bob#EUW**\n||data:Gold 1:1100:12:None||").unwrap();
        assert_eq!(tag.status, "Gold 1");
        assert_eq!(tag.hold, None);
        assert_eq!(tag.last_agent, None);
        assert_eq!(tag.to_fingerprint().last_agent, UNKNOWN_AGENT);
        assert_eq!(tag.to_fingerprint().tier_ordinal, None);
    }

    #[test]
    fn missing_and_malformed_tags_are_distinguished() {
        assert_eq!(DataTag::decode("just chatting"), Err(TagError::Missing));
        assert!(matches!(
            DataTag::decode("||data:Gold 1:abc:12:None||"),
            Err(TagError::Malformed(_))
        ));
        assert!(matches!(
            DataTag::decode("||data:Gold 1:12||"),
            Err(TagError::Malformed(_))
        ));
    }

    #[test]
    fn card_body_round_trips_through_decoder() {
        let entity = Entity::new("p1", "Alice#EUW", "eu");
        let obs = observation();
        let body = card_body(&entity, &obs);

        assert_eq!(card_name(&body), Some("Alice#EUW"));
        let decoded = DataTag::decode(&body).unwrap();
        assert!(decoded.to_fingerprint().matches(&obs.fingerprint()));
    }

    #[test]
    fn delimiters_in_free_text_are_stripped() {
        let mut obs = observation();
        obs.hold = Some("BANNED: 1h 2m".into());
        obs.last_agent = "A|B".into();
        let tag = DataTag::from_observation(&obs).to_string();

        let decoded = DataTag::decode(&tag).unwrap();
        assert_eq!(decoded.hold.as_deref(), Some("BANNED 1h 2m"));
        assert_eq!(decoded.last_agent.as_deref(), Some("AB"));
        assert!(decoded.to_fingerprint().matches(&obs.fingerprint()));
    }

    proptest! {
        #[test]
        fn any_encoded_tag_decodes(
            status in "[^\\s]{1,16}",
            score in -1i64..10_000,
            progress in 0i64..100,
            hold in proptest::option::of(".{1,20}"),
            agent in ".{0,12}",
        ) {
            let obs = Observation {
                tier_label: status,
                score,
                tier_progress: progress,
                tier_ordinal: 0,
                account_level: 0,
                hold,
                last_agent: agent,
            };
            let tag = DataTag::from_observation(&obs).to_string();
            prop_assert!(DataTag::decode(&tag).is_ok());
        }
    }
}
