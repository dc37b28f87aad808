//! Output quality gate.
//!
//! Checks run in a fixed order and stop at the first failure:
//! length, generic-phrase density, lexical diversity, then structure
//! (only for long texts).

use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, LazyLock};

use arc_swap::ArcSwap;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::ValidationConfig;

static BULLET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^[ \t]*(?:[-*•+]|\d{1,3}[.)])[ \t]+\S").expect("valid regex"));

static LABELED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^[ \t]*[*_]{0,2}[\p{L}\p{N}][\p{L}\p{N} _/()-]{0,40}[*_]{0,2}:[ \t]+\S").expect("valid regex"));

/// Why a text was rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum Rejection {
    Empty,
    TooShort { length: usize, min: usize },
    TooGeneric { count: usize, max: usize },
    Repetitive { ratio: f64, min: f64 },
    Unstructured,
}

impl Rejection {
    /// Short stable label, used for metrics and logs.
    pub fn label(&self) -> &'static str {
        match self {
            Rejection::Empty => "empty",
            Rejection::TooShort { .. } => "too short",
            Rejection::TooGeneric { .. } => "too generic",
            Rejection::Repetitive { .. } => "repetitive",
            Rejection::Unstructured => "unstructured",
        }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::Empty => f.write_str("empty"),
            Rejection::TooShort { length, min } => {
                write!(f, "too short ({length} < {min} chars)")
            }
            Rejection::TooGeneric { count, max } => {
                write!(f, "too generic ({count} boilerplate phrases > {max})")
            }
            Rejection::Repetitive { ratio, min } => {
                write!(f, "repetitive (lexical diversity {ratio:.2} < {min:.2})")
            }
            Rejection::Unstructured => f.write_str("unstructured"),
        }
    }
}

/// Result of validating one text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationVerdict {
    pub passed: bool,
    pub reason: Option<Rejection>,
}

impl ValidationVerdict {
    pub fn accepted() -> Self {
        Self {
            passed: true,
            reason: None,
        }
    }

    pub fn rejected(reason: Rejection) -> Self {
        Self {
            passed: false,
            reason: Some(reason),
        }
    }
}

/// Judges generated text against a swappable [`ValidationConfig`].
#[derive(Debug)]
pub struct ContentValidator {
    policy: ArcSwap<ValidationConfig>,
}

impl ContentValidator {
    pub fn new(policy: ValidationConfig) -> Self {
        Self {
            policy: ArcSwap::from_pointee(policy),
        }
    }

    pub fn policy(&self) -> Arc<ValidationConfig> {
        self.policy.load_full()
    }

    /// Replace the thresholds; in-flight validations finish on the old ones.
    pub fn update_policy(&self, policy: ValidationConfig) {
        self.policy.store(Arc::new(policy));
        tracing::info!("Content validation policy updated");
    }

    pub fn validate(&self, text: &str, component_type: &str) -> ValidationVerdict {
        let policy = self.policy.load();
        match check(&policy, text.trim(), component_type) {
            Ok(()) => ValidationVerdict::accepted(),
            Err(reason) => {
                tracing::debug!(component_type, reason = %reason, "Content rejected");
                ValidationVerdict::rejected(reason)
            }
        }
    }
}

impl Default for ContentValidator {
    fn default() -> Self {
        Self::new(ValidationConfig::default())
    }
}

fn check(policy: &ValidationConfig, text: &str, component_type: &str) -> Result<(), Rejection> {
    let length = text.chars().count();
    if length == 0 {
        return Err(Rejection::Empty);
    }

    let min = policy
        .min_length
        .get(component_type)
        .copied()
        .unwrap_or(policy.default_min_length);
    if length < min {
        return Err(Rejection::TooShort { length, min });
    }

    let count = generic_phrase_count(text, &policy.generic_phrases);
    if count > policy.max_generic_phrases {
        return Err(Rejection::TooGeneric {
            count,
            max: policy.max_generic_phrases,
        });
    }

    let min_ratio = policy
        .min_diversity
        .get(component_type)
        .copied()
        .unwrap_or(policy.default_min_diversity);
    let ratio = lexical_diversity(text);
    if ratio < min_ratio {
        return Err(Rejection::Repetitive {
            ratio,
            min: min_ratio,
        });
    }

    if length > policy.structure_threshold && !has_structure(text) {
        return Err(Rejection::Unstructured);
    }

    Ok(())
}

/// Occurrences of any configured phrase, case-insensitive.
pub fn generic_phrase_count(text: &str, phrases: &[String]) -> usize {
    let lower = text.to_lowercase();
    phrases
        .iter()
        .map(|phrase| phrase.trim().to_lowercase())
        .filter(|phrase| !phrase.is_empty())
        .map(|phrase| lower.matches(phrase.as_str()).count())
        .sum()
}

/// Unique words over total words; 0 when there are no words.
pub fn lexical_diversity(text: &str) -> f64 {
    let words: Vec<String> = text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect();
    if words.is_empty() {
        return 0.0;
    }
    let unique: HashSet<&str> = words.iter().map(String::as_str).collect();
    unique.len() as f64 / words.len() as f64
}

/// At least one sign of organised content.
pub fn has_structure(text: &str) -> bool {
    let paired = (text.contains('{') && text.contains('}'))
        || (text.contains('[') && text.contains(']'));
    let line_breaks = text.matches('\n').count();
    let terminators = text.chars().filter(|c| matches!(c, '.' | '!' | '?')).count();
    let bullets = BULLET.find_iter(text).count();
    let labeled = LABELED.find_iter(text).count();

    paired || line_breaks > 2 || terminators > 3 || bullets > 2 || labeled > 1
}
