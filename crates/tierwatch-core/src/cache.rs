//! Change-detection cache
//!
//! Holds the fingerprint of the last successfully published observation per
//! player. It is the only gate deciding whether a card is republished, and
//! it is written strictly after a successful publish.

use crate::model::{Fingerprint, Observation};
use dashmap::DashMap;

/// Last published fingerprint per player
#[derive(Debug, Default)]
pub struct ChangeCache {
    entries: DashMap<String, Fingerprint>,
}

impl ChangeCache {
    /// Empty cache
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `observation` differs from the last published state
    #[must_use]
    pub fn should_publish(&self, entity_id: &str, observation: &Observation) -> bool {
        match self.entries.get(entity_id) {
            Some(baseline) => !baseline.matches(&observation.fingerprint()),
            None => true,
        }
    }

    /// Record `observation` as published
    pub fn commit(&self, entity_id: &str, observation: &Observation) {
        self.entries
            .insert(entity_id.to_string(), observation.fingerprint());
    }

    /// Record a degraded observation as published
    ///
    /// The observation was rebuilt from the baseline, so fields the baseline
    /// did not know stay unknown instead of turning into placeholder zeros.
    pub fn commit_degraded(&self, entity_id: &str, observation: &Observation) {
        let mut fingerprint = observation.fingerprint();
        if let Some(baseline) = self.entries.get(entity_id) {
            fingerprint.tier_ordinal = baseline.tier_ordinal;
            fingerprint.account_level = baseline.account_level;
        }
        self.entries.insert(entity_id.to_string(), fingerprint);
    }

    /// Seed a baseline recovered from the channel history
    pub fn restore(&self, entity_id: &str, fingerprint: Fingerprint) {
        self.entries.insert(entity_id.to_string(), fingerprint);
    }

    /// Last published fingerprint
    #[must_use]
    pub fn baseline(&self, entity_id: &str) -> Option<Fingerprint> {
        self.entries.get(entity_id).map(|entry| entry.value().clone())
    }

    /// Number of players with a baseline
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no baseline is known
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obs(progress: i64) -> Observation {
        Observation {
            tier_label: "Diamond 1".into(),
            score: 1800,
            tier_progress: progress,
            tier_ordinal: 18,
            account_level: 0,
            hold: None,
            last_agent: "Omen".into(),
        }
    }

    #[test]
    fn commit_suppresses_identical_observation() {
        let cache = ChangeCache::new();
        assert!(cache.should_publish("p1", &obs(10)));

        cache.commit("p1", &obs(10));
        assert!(!cache.should_publish("p1", &obs(10)));
        assert!(cache.should_publish("p1", &obs(11)));
        assert!(cache.should_publish("p2", &obs(10)));
    }

    #[test]
    fn degraded_commit_keeps_unknown_fields_unknown() {
        let cache = ChangeCache::new();
        let mut restored = obs(10).fingerprint();
        restored.tier_ordinal = None;
        restored.account_level = None;
        cache.restore("p1", restored.clone());

        let degraded = restored.to_observation();
        cache.commit_degraded("p1", &degraded);

        let baseline = cache.baseline("p1").unwrap();
        assert_eq!(baseline.tier_ordinal, None);
        assert!(!cache.should_publish("p1", &obs(10)));
    }
}
