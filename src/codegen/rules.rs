//! Keyword → abbreviation table used for the subject token of a code

use serde::{Deserialize, Serialize};

/// Built-in rules, evaluated top to bottom. First match wins, so broader
/// keywords sit below the more specific ones they overlap with.
const BUILTIN_RULES: &[(&str, &str)] = &[
    ("project", "PM"),
    ("quality", "QA"),
    ("test", "TST"),
    ("plan", "PLN"),
    ("design", "DSN"),
    ("develop", "DEV"),
    ("review", "REV"),
    ("meeting", "MTG"),
    ("research", "RSC"),
    ("document", "DOC"),
    ("training", "TRN"),
    ("support", "SUP"),
    ("maintenance", "MNT"),
    ("analys", "ANL"),
    ("report", "RPT"),
    ("audit", "AUD"),
    ("deploy", "DPL"),
    ("admin", "ADM"),
    ("finance", "FIN"),
    ("procure", "PRC"),
];

/// Abbreviation used when a name carries no ASCII letters at all
const FALLBACK_SUBJECT: &str = "CAT";

/// One (substring pattern, abbreviation) pair
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordRule {
    pub pattern: String,
    pub abbreviation: String,
}

impl KeywordRule {
    pub fn new(pattern: impl Into<String>, abbreviation: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            abbreviation: abbreviation.into(),
        }
    }

    fn matches(&self, lowered_name: &str) -> bool {
        !self.pattern.is_empty() && lowered_name.contains(&self.pattern.to_lowercase())
    }
}

/// Ordered rule table
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeywordRules {
    rules: Vec<KeywordRule>,
}

impl Default for KeywordRules {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl KeywordRules {
    /// Built-in table with `extra` rules evaluated first
    pub fn new(extra: Vec<KeywordRule>) -> Self {
        let mut rules = extra;
        rules.extend(
            BUILTIN_RULES
                .iter()
                .map(|(pattern, abbr)| KeywordRule::new(*pattern, *abbr)),
        );
        Self { rules }
    }

    /// Exactly the given rules, no built-ins
    pub fn from_rules(rules: Vec<KeywordRule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[KeywordRule] {
        &self.rules
    }

    /// Abbreviation of the first rule whose pattern occurs in `name`
    /// (case-insensitive)
    pub fn lookup(&self, name: &str) -> Option<&str> {
        let lowered = name.to_lowercase();
        self.rules
            .iter()
            .find(|rule| rule.matches(&lowered))
            .map(|rule| rule.abbreviation.as_str())
    }

    /// Subject token for a category name: a rule abbreviation, or the
    /// consonant-leaning fallback.
    pub fn subject_token(&self, name: &str) -> String {
        match self.lookup(name) {
            Some(abbr) => abbr.to_ascii_uppercase(),
            None => fallback_subject(name),
        }
    }
}

fn is_vowel(c: char) -> bool {
    matches!(c, 'A' | 'E' | 'I' | 'O' | 'U' | 'Y')
}

/// First letter of the name, then the following consonants, padded with the
/// remaining letters in order when there are fewer than three consonants.
fn fallback_subject(name: &str) -> String {
    let letters: Vec<char> = name
        .chars()
        .filter(|c| c.is_ascii_alphabetic())
        .map(|c| c.to_ascii_uppercase())
        .collect();

    let Some((&first, rest)) = letters.split_first() else {
        return FALLBACK_SUBJECT.to_string();
    };

    let mut picked: Vec<usize> = rest
        .iter()
        .enumerate()
        .filter(|(_, c)| !is_vowel(**c))
        .map(|(i, _)| i)
        .take(2)
        .collect();

    if picked.len() < 2 {
        for i in 0..rest.len() {
            if picked.len() == 2 {
                break;
            }
            if !picked.contains(&i) {
                picked.push(i);
            }
        }
        picked.sort_unstable();
    }

    std::iter::once(first)
        .chain(picked.into_iter().map(|i| rest[i]))
        .collect()
}
