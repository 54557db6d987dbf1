//! One-off fetch diagnostics: is the storefront serving real HTML to us, and which
//! item selectors does it match?

use crate::scraper::selectors::SelectorChain;
use scraper::Html;

/// Lower-case body fragments that indicate an anti-bot interstitial instead of a page.
const BLOCK_MARKERS: [&str; 4] = [
    "cloudflare",
    "captcha",
    "checking your browser",
    "attention required",
];

#[derive(Debug, Clone, PartialEq)]
pub struct ProbeReport {
    pub body_len: usize,
    pub block_markers: Vec<&'static str>,
    pub selector_hits: Vec<(String, usize)>,
}

impl ProbeReport {
    pub fn looks_blocked(&self) -> bool {
        !self.block_markers.is_empty() && self.selector_hits.iter().all(|(_, n)| *n == 0)
    }
}

pub fn diagnose(html: &str, items: &SelectorChain) -> ProbeReport {
    let lower = html.to_lowercase();
    let block_markers = BLOCK_MARKERS
        .iter()
        .copied()
        .filter(|m| lower.contains(m))
        .collect();

    let doc = Html::parse_document(html);
    ProbeReport {
        body_len: html.len(),
        block_markers,
        selector_hits: items.match_counts(&doc),
    }
}
