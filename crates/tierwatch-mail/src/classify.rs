//! Sender classification
//!
//! A message is relevant when it names the game publisher explicitly and
//! matches none of the exclusion patterns. Both lists are always evaluated:
//! uptime monitors and alert relays quote the publisher's name too.

use once_cell::sync::Lazy;
use regex::Regex;

const ALLOW: &[&str] = &[
    r"riot\s+games",
    r"from\s+riot\s+games",
    r"team\s+riot\s+games",
    r"riot\s+games\s+(?:inc|team|support)",
];

const DENY: &[&str] = &[
    r"monitor\s+is\s+(?:up|down)",
    r"uptime\s+monitor",
    r"status\s+change",
    r"service\s+monitor",
    r"ping\s+monitor",
    r"healthcheck",
    r"alert\s*:",
    r"notification\s+from",
    r"automated\s+alert",
];

static DEFAULT: Lazy<Classifier> = Lazy::new(|| {
    Classifier::from_patterns(ALLOW, DENY)
        .unwrap_or_else(|e| unreachable!("built-in classifier pattern: {e}"))
});

/// Classification of one message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Sent by the publisher and not an automated relay
    Relevant,
    /// No allow pattern matched
    UnknownSender,
    /// An exclusion pattern matched
    Excluded(String),
}

impl Verdict {
    /// Whether codes should be extracted
    #[inline]
    #[must_use]
    pub fn is_relevant(&self) -> bool {
        matches!(self, Self::Relevant)
    }
}

/// Allow-list AND NOT deny-list matcher
#[derive(Debug, Clone)]
pub struct Classifier {
    allow: Vec<Regex>,
    deny: Vec<Regex>,
}

impl Default for Classifier {
    fn default() -> Self {
        DEFAULT.clone()
    }
}

impl Classifier {
    /// Compile a classifier from pattern lists; matching is case-insensitive
    pub fn from_patterns(allow: &[&str], deny: &[&str]) -> Result<Self, regex::Error> {
        let compile = |patterns: &[&str]| {
            patterns
                .iter()
                .map(|p| Regex::new(&format!("(?i){p}")))
                .collect::<Result<Vec<_>, _>>()
        };
        Ok(Self {
            allow: compile(allow)?,
            deny: compile(deny)?,
        })
    }

    /// Classify `text`
    #[must_use]
    pub fn classify(&self, text: &str) -> Verdict {
        let allowed = self.allow.iter().any(|re| re.is_match(text));
        let excluded = self.deny.iter().find(|re| re.is_match(text));
        match (allowed, excluded) {
            (false, _) => Verdict::UnknownSender,
            (true, Some(re)) => Verdict::Excluded(re.as_str().trim_start_matches("(?i)").to_string()),
            (true, None) => Verdict::Relevant,
        }
    }

    /// Whether `text` is relevant
    #[must_use]
    pub fn is_relevant(&self, text: &str) -> bool {
        self.classify(text).is_relevant()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publisher_mail_is_relevant() {
        let c = Classifier::default();
        assert!(c.is_relevant("From: noreply@riotgames.com\nSubject: Code\nRiot Games Team"));
        assert!(c.is_relevant("sent by RIOT   GAMES support"));
    }

    #[test]
    fn other_senders_are_ignored() {
        assert_eq!(
            Classifier::default().classify("From: bank\nYour code is 123456"),
            Verdict::UnknownSender
        );
    }

    #[test]
    fn relays_quoting_the_publisher_are_excluded() {
        let verdict = Classifier::default().classify("Alert: Riot Games login monitor is DOWN");
        assert!(matches!(verdict, Verdict::Excluded(_)));
        assert!(!Classifier::default().is_relevant("Notification from Riot Games status page"));
    }
}
