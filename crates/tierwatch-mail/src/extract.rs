//! One-time code extraction

use once_cell::sync::Lazy;
use regex::Regex;

/// Ordered patterns; the first match wins
const PATTERNS: &[&str] = &[
    r"(?:verification\s*code|security\s*code|authentication\s*code|access\s*code)(?:\s*is)?[:;\s]*([0-9]{6})",
    r"(?:your|il\s*tuo)\s*(?:verification|security|authentication|access)?\s*code(?:\s*is)?[:;\s]*([0-9]{6})",
    r"(?:codice\s*di\s*(?:verifica|sicurezza|accesso))[:;\s]*([0-9]{6})",
    r"use\s*(?:this\s*)?code[:;\s]*([0-9]{6})",
    r"enter\s*(?:this\s*)?code[:;\s]*([0-9]{6})",
    r"رمز\s+تسجيل\s+الدخول[:\s]*([0-9]{6})",
];

static DEFAULT: Lazy<CodeExtractor> = Lazy::new(|| {
    CodeExtractor::from_patterns(PATTERNS)
        .unwrap_or_else(|e| unreachable!("built-in code pattern: {e}"))
});

/// Finds a six-digit code in message text
#[derive(Debug, Clone)]
pub struct CodeExtractor {
    patterns: Vec<Regex>,
}

impl Default for CodeExtractor {
    fn default() -> Self {
        DEFAULT.clone()
    }
}

impl CodeExtractor {
    /// Compile an extractor; each pattern must have one capture group
    pub fn from_patterns(patterns: &[&str]) -> Result<Self, regex::Error> {
        let patterns = patterns
            .iter()
            .map(|p| Regex::new(&format!("(?i){p}")))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    /// Code in `text`, trying patterns in order
    #[must_use]
    pub fn extract(&self, text: &str) -> Option<String> {
        self.patterns.iter().find_map(|re| {
            re.captures(text)
                .and_then(|caps| caps.get(1))
                .map(|m| m.as_str().to_string())
        })
    }

    /// Code from the body, else from the subject
    #[must_use]
    pub fn extract_from(&self, body: &str, subject: &str) -> Option<String> {
        self.extract(body).or_else(|| self.extract(subject))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn recognises_phrasings() {
        let x = CodeExtractor::default();
        assert_eq!(x.extract("Your verification code is: 482913").as_deref(), Some("482913"));
        assert_eq!(x.extract("Il tuo codice di verifica: 112233").as_deref(), Some("112233"));
        assert_eq!(x.extract("Please enter this code 000111").as_deref(), Some("000111"));
        assert_eq!(x.extract("رمز تسجيل الدخول: 654321").as_deref(), Some("654321"));
        assert_eq!(x.extract("Order 123456 shipped"), None);
    }

    #[test]
    fn earlier_pattern_wins() {
        let x = CodeExtractor::default();
        let text = "use this code 111111 or your security code is 222222";
        assert_eq!(x.extract(text).as_deref(), Some("222222"));
    }

    #[test]
    fn body_is_checked_before_subject() {
        let x = CodeExtractor::default();
        assert_eq!(
            x.extract_from("access code: 333333", "Your code is 444444").as_deref(),
            Some("333333")
        );
        assert_eq!(x.extract_from("hello", "Your code is 444444").as_deref(), Some("444444"));
    }

    proptest! {
        #[test]
        fn any_six_digit_code_is_found(code in "[0-9]{6}") {
            let text = format!("Riot Games\nYour verification code is {code}\nThanks");
            prop_assert_eq!(CodeExtractor::default().extract(&text), Some(code));
        }
    }
}
