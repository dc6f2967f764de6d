//! Delivered-code history

use dashmap::DashSet;

/// Codes already delivered during this process lifetime
#[derive(Debug, Default)]
pub struct CodeHistory {
    codes: DashSet<String>,
}

impl CodeHistory {
    /// Empty history
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `code`; `false` if it was already recorded
    pub fn record(&self, code: &str) -> bool {
        self.codes.insert(code.to_string())
    }

    /// Drop `code` so it can be delivered again
    pub fn forget(&self, code: &str) -> bool {
        self.codes.remove(code).is_some()
    }

    /// Whether `code` was delivered
    #[must_use]
    pub fn contains(&self, code: &str) -> bool {
        self.codes.contains(code)
    }

    /// Number of recorded codes
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.codes.len()
    }

    /// Whether nothing was recorded
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_once() {
        let history = CodeHistory::new();
        assert!(history.record("123456"));
        assert!(!history.record("123456"));
        assert!(history.forget("123456"));
        assert!(history.record("123456"));
        assert_eq!(history.len(), 1);
    }
}
