//! Data model for tracked players and their observations

use crate::tag::{sanitize, sanitize_hold};
use std::fmt;

/// Tier label of a player whose standing could not be obtained
pub const UNAVAILABLE: &str = "ERROR";

/// Agent label when the last match is unknown
pub const UNKNOWN_AGENT: &str = "Unknown";

/// A tracked player, fixed for the process lifetime
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Entity {
    /// Stable upstream identifier
    pub id: String,
    /// Display name, `Name#TAG`
    pub name: String,
    /// Upstream region code
    pub region: String,
}

impl Entity {
    /// Create an entity
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            region: region.into(),
        }
    }

    /// Name without the `#TAG` suffix
    #[must_use]
    pub fn short_name(&self) -> &str {
        self.name.split('#').next().unwrap_or(&self.name)
    }

    /// Case-insensitive display-name comparison
    #[must_use]
    pub fn is_named(&self, name: &str) -> bool {
        self.name.trim().eq_ignore_ascii_case(name.trim())
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Identifier of a message published in a chat channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageId(pub u64);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Upstream state of one player at one instant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    /// Tier display label
    pub tier_label: String,
    /// Absolute rating
    pub score: i64,
    /// Progress inside the tier
    pub tier_progress: i64,
    /// Tier ordinal
    pub tier_ordinal: i64,
    /// Account level, only looked up for unranked players
    pub account_level: u32,
    /// Active hold label
    pub hold: Option<String>,
    /// Agent of the latest match
    pub last_agent: String,
}

impl Observation {
    /// Placeholder for a player with no data and no baseline
    #[must_use]
    pub fn unavailable() -> Self {
        Self {
            tier_label: UNAVAILABLE.to_string(),
            score: 0,
            tier_progress: 0,
            tier_ordinal: 0,
            account_level: 0,
            hold: None,
            last_agent: UNKNOWN_AGENT.to_string(),
        }
    }

    /// Whether the player has no competitive tier to show
    #[must_use]
    pub fn is_unranked(&self) -> bool {
        is_unranked_label(&self.tier_label)
    }

    /// Sort key of the summary board
    #[inline]
    #[must_use]
    pub fn ladder_score(&self) -> i64 {
        self.tier_ordinal * 100 + self.tier_progress
    }

    /// Equality key of this observation
    #[must_use]
    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint {
            tier_label: sanitize(&self.tier_label),
            score: self.score,
            tier_progress: self.tier_progress,
            hold: sanitize_hold(self.hold.as_deref()),
            last_agent: sanitize(&self.last_agent),
            tier_ordinal: Some(self.tier_ordinal),
            account_level: Some(self.account_level),
        }
    }
}

/// Whether a tier label means "no tier"
#[must_use]
pub fn is_unranked_label(label: &str) -> bool {
    label.eq_ignore_ascii_case(tierwatch_client::UNRANKED) || label.eq_ignore_ascii_case(UNAVAILABLE)
}

/// Comparable digest of an [`Observation`]
///
/// Free-text fields are stored in their tag-safe form so that a fingerprint
/// decoded from a published card equals the one of the observation that
/// produced it. Ordinal and account level are not published in the tag, so
/// a reconstructed fingerprint holds them as unknown.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint {
    /// Tier display label
    pub tier_label: String,
    /// Absolute rating
    pub score: i64,
    /// Progress inside the tier
    pub tier_progress: i64,
    /// Active hold label
    pub hold: Option<String>,
    /// Agent of the latest match
    pub last_agent: String,
    /// Tier ordinal, unknown after reconstruction
    pub tier_ordinal: Option<i64>,
    /// Account level, unknown after reconstruction
    pub account_level: Option<u32>,
}

impl Fingerprint {
    /// Whether every field is known
    #[inline]
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.tier_ordinal.is_some() && self.account_level.is_some()
    }

    /// Whether `other` carries the same state as this baseline
    ///
    /// Fields unknown in `self` are not compared.
    #[must_use]
    pub fn matches(&self, other: &Fingerprint) -> bool {
        fn known_eq<T: PartialEq>(baseline: Option<T>, candidate: Option<T>) -> bool {
            baseline.map_or(true, |b| Some(b) == candidate)
        }

        self.tier_label == other.tier_label
            && self.score == other.score
            && self.tier_progress == other.tier_progress
            && self.hold == other.hold
            && self.last_agent == other.last_agent
            && known_eq(self.tier_ordinal, other.tier_ordinal)
            && known_eq(self.account_level, other.account_level)
    }

    /// Approximate observation, unknown fields read as zero
    #[must_use]
    pub fn to_observation(&self) -> Observation {
        Observation {
            tier_label: self.tier_label.clone(),
            score: self.score,
            tier_progress: self.tier_progress,
            tier_ordinal: self.tier_ordinal.unwrap_or(0),
            account_level: self.account_level.unwrap_or(0),
            hold: self.hold.clone(),
            last_agent: self.last_agent.clone(),
        }
    }

    /// Replace unknown fields with the values of `observation`
    #[must_use]
    pub fn filled_from(mut self, observation: &Observation) -> Self {
        self.tier_ordinal.get_or_insert(observation.tier_ordinal);
        self.account_level.get_or_insert(observation.account_level);
        self
    }
}

/// Outcome of producing an observation for one player
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reading {
    /// Upstream answered
    Fresh(Observation),
    /// Upstream failed, rebuilt from the last committed baseline
    Degraded(Observation),
    /// Upstream failed and no baseline exists
    Absent,
}

/// Discriminant of a [`Reading`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadingKind {
    /// See [`Reading::Fresh`]
    Fresh,
    /// See [`Reading::Degraded`]
    Degraded,
    /// See [`Reading::Absent`]
    Absent,
}

impl Reading {
    /// Discriminant
    #[inline]
    #[must_use]
    pub fn kind(&self) -> ReadingKind {
        match self {
            Self::Fresh(_) => ReadingKind::Fresh,
            Self::Degraded(_) => ReadingKind::Degraded,
            Self::Absent => ReadingKind::Absent,
        }
    }

    /// Whether the reading did not come straight from upstream
    #[inline]
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        !matches!(self, Self::Fresh(_))
    }

    /// Observation to publish; absent readings become the placeholder
    #[must_use]
    pub fn into_observation(self) -> Observation {
        match self {
            Self::Fresh(obs) | Self::Degraded(obs) => obs,
            Self::Absent => Observation::unavailable(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn gold() -> Observation {
        Observation {
            tier_label: "Gold 2".into(),
            score: 1234,
            tier_progress: 34,
            tier_ordinal: 13,
            account_level: 0,
            hold: None,
            last_agent: "Jett".into(),
        }
    }

    #[test]
    fn reconstructed_baseline_ignores_unknown_fields() {
        let mut baseline = gold().fingerprint();
        baseline.tier_ordinal = None;
        baseline.account_level = None;
        assert!(!baseline.is_complete());
        assert!(baseline.matches(&gold().fingerprint()));

        let mut moved = gold();
        moved.tier_progress = 40;
        assert!(!baseline.matches(&moved.fingerprint()));
    }

    #[test]
    fn absent_reading_becomes_placeholder() {
        let obs = Reading::Absent.into_observation();
        assert_eq!(obs.tier_label, UNAVAILABLE);
        assert!(obs.is_unranked());
        assert!(Reading::Degraded(gold()).is_degraded());
        assert_eq!(Reading::Fresh(gold()).kind(), ReadingKind::Fresh);
    }

    #[test]
    fn entity_names() {
        let entity = Entity::new("p1", "Alice#EUW", "eu");
        assert_eq!(entity.short_name(), "Alice");
        assert!(entity.is_named(" alice#euw "));
        assert!(!entity.is_named("Alice#NA1"));
    }

    #[test]
    fn ladder_score_orders_by_tier_then_progress() {
        let mut a = gold();
        let mut b = gold();
        a.tier_ordinal = 14;
        a.tier_progress = 0;
        b.tier_progress = 99;
        assert!(a.ladder_score() > b.ladder_score());
    }

    proptest! {
        #[test]
        fn equal_observations_have_equal_fingerprints(
            label in "[A-Z][a-z]{0,8}( [1-3])?",
            score in -5i64..5000,
            progress in 0i64..100,
            ordinal in 0i64..30,
            agent in "[A-Za-z/]{1,10}",
        ) {
            let obs = Observation {
                tier_label: label,
                score,
                tier_progress: progress,
                tier_ordinal: ordinal,
                account_level: 0,
                hold: None,
                last_agent: agent,
            };
            let copy = obs.clone();
            prop_assert_eq!(obs.fingerprint(), copy.fingerprint());
            prop_assert!(obs.fingerprint().matches(&copy.fingerprint()));
            prop_assert!(obs.fingerprint().to_observation() == obs);
        }
    }
}
