use crate::config::StockMarkerConfig;
use crate::models::StockStatus;
use anyhow::{Context, Result};
use regex::RegexSet;
use thiserror::Error;

// ── Text ──────────────────────────────────────────────────────────────────────

/// Collapse runs of whitespace (including newlines from nested markup) to single spaces.
pub fn normalise_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

// ── Price ─────────────────────────────────────────────────────────────────────

/// Parse a displayed price into a number.
///
/// Keeps digits, separators and a leading minus. When both `.` and `,` appear the
/// right-most one is the decimal point; a lone separator character is a decimal
/// point if it occurs once and a thousands separator if it repeats.
/// "€1.299,50" → 1299.5 | "$1,299.50" → 1299.5 | "12,90 €" → 12.9 | "N/A" → None
pub fn parse_price(s: &str) -> Option<f64> {
    let s = s.trim();
    if !s.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }

    let negative = s
        .chars()
        .find(|c| c.is_ascii_digit() || *c == '-')
        .is_some_and(|c| c == '-');

    let kept: String = s
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == ',')
        .collect();
    let kept = kept.trim_matches(|c| c == '.' || c == ',');

    let decimal = match (kept.rfind('.'), kept.rfind(',')) {
        (Some(dot), Some(comma)) => Some(if dot > comma { '.' } else { ',' }),
        (Some(_), None) if kept.matches('.').count() == 1 => Some('.'),
        (None, Some(_)) if kept.matches(',').count() == 1 => Some(','),
        _ => None,
    };

    let mut number = String::with_capacity(kept.len() + 1);
    if negative {
        number.push('-');
    }
    for c in kept.chars() {
        if c.is_ascii_digit() {
            number.push(c);
        } else if Some(c) == decimal {
            number.push('.');
        }
    }

    number.parse().ok()
}

// ── Stock status ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct StockMarkers {
    out_of_stock: Vec<String>,
    in_stock: Vec<String>,
}

impl StockMarkers {
    pub fn new(config: &StockMarkerConfig) -> Self {
        let lower = |v: &[String]| v.iter().map(|m| m.to_lowercase()).collect();
        Self {
            out_of_stock: lower(&config.out_of_stock),
            in_stock: lower(&config.in_stock),
        }
    }

    /// Out-of-stock markers win over in-stock ones ("ska në stok" contains "në stok").
    pub fn classify(&self, text: &str) -> StockStatus {
        let text = normalise_whitespace(text);
        if text.is_empty() {
            return StockStatus::Unknown;
        }
        let lower = text.to_lowercase();
        if self.out_of_stock.iter().any(|m| lower.contains(m.as_str())) {
            StockStatus::OutOfStock
        } else if self.in_stock.iter().any(|m| lower.contains(m.as_str())) {
            StockStatus::InStock
        } else {
            StockStatus::Raw(text)
        }
    }
}

impl Default for StockMarkers {
    fn default() -> Self {
        Self::new(&StockMarkerConfig::default())
    }
}

// ── Title ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TitleRejection {
    #[error("empty title")]
    Empty,

    #[error("title {title:?} looks like a badge (pattern {pattern:?})")]
    Badge { title: String, pattern: String },
}

/// Rejects titles that are really promotional badges rendered in the title slot.
#[derive(Debug, Clone)]
pub struct TitleValidator {
    patterns: RegexSet,
}

impl TitleValidator {
    pub fn new<I, S>(patterns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = RegexSet::new(patterns).context("Invalid badge pattern")?;
        Ok(Self { patterns })
    }

    /// Returns the whitespace-normalised title when it is usable as a product name.
    pub fn check(&self, title: &str) -> Result<String, TitleRejection> {
        let title = normalise_whitespace(title);
        if title.is_empty() {
            return Err(TitleRejection::Empty);
        }
        if let Some(idx) = self.patterns.matches(&title).into_iter().next() {
            return Err(TitleRejection::Badge {
                title,
                pattern: self.patterns.patterns()[idx].clone(),
            });
        }
        Ok(title)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
