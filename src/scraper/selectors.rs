//! Prioritised CSS selector lists.
//!
//! Each field of a listing entry is resolved by trying its selectors in order and
//! taking the first non-empty result. Storefront themes differ, so the lists come
//! from configuration rather than code.

use crate::config::SelectorConfig;
use anyhow::{anyhow, Result};
use scraper::{ElementRef, Html, Selector};
use tracing::trace;

/// An ordered list of selectors for one field.
#[derive(Debug, Clone)]
pub struct SelectorChain {
    field: &'static str,
    selectors: Vec<(String, Selector)>,
}

impl SelectorChain {
    pub fn parse<S: AsRef<str>>(field: &'static str, sources: &[S]) -> Result<Self> {
        let selectors = sources
            .iter()
            .map(|src| {
                let src = src.as_ref();
                Selector::parse(src)
                    .map(|sel| (src.to_string(), sel))
                    .map_err(|e| anyhow!("{} selector {:?}: {:?}", field, src, e))
            })
            .collect::<Result<Vec<_>>>()?;

        if selectors.is_empty() {
            return Err(anyhow!("{} selector list is empty", field));
        }
        Ok(Self { field, selectors })
    }

    /// First selector matching at least one element in the document, with all its matches.
    pub fn select_all<'a>(&self, doc: &'a Html) -> Option<(&str, Vec<ElementRef<'a>>)> {
        let hit = self.selectors.iter().find_map(|(src, sel)| {
            let found: Vec<_> = doc.select(sel).collect();
            (!found.is_empty()).then_some((src.as_str(), found))
        });
        if hit.is_none() {
            trace!("no {} selector matched", self.field);
        }
        hit
    }

    /// Per-selector match counts over the whole document.
    pub fn match_counts(&self, doc: &Html) -> Vec<(String, usize)> {
        self.selectors
            .iter()
            .map(|(src, sel)| (src.clone(), doc.select(sel).count()))
            .collect()
    }

    /// First non-empty text under `scope`.
    pub fn first_text(&self, scope: ElementRef<'_>) -> Option<String> {
        self.selectors.iter().find_map(|(_, sel)| {
            scope.select(sel).find_map(non_empty_text)
        })
    }

    /// First non-empty text anywhere in the document.
    pub fn first_text_in(&self, doc: &Html) -> Option<String> {
        self.selectors.iter().find_map(|(_, sel)| {
            doc.select(sel).find_map(non_empty_text)
        })
    }

    /// First non-empty value of `attr` under `scope`.
    pub fn first_attr(&self, scope: ElementRef<'_>, attr: &str) -> Option<String> {
        self.selectors.iter().find_map(|(_, sel)| {
            scope.select(sel).find_map(|el| {
                el.value()
                    .attr(attr)
                    .map(str::trim)
                    .filter(|v| !v.is_empty())
                    .map(str::to_string)
            })
        })
    }
}

pub fn element_text(el: ElementRef<'_>) -> String {
    el.text().collect::<Vec<_>>().join(" ")
}

fn non_empty_text(el: ElementRef<'_>) -> Option<String> {
    let text = element_text(el);
    (!text.trim().is_empty()).then_some(text)
}

/// All selector chains used by the listing parser.
#[derive(Debug, Clone)]
pub struct ListingSelectors {
    pub items: SelectorChain,
    pub title: SelectorChain,
    pub price: SelectorChain,
    pub stock: SelectorChain,
    pub brand: SelectorChain,
    pub link: SelectorChain,
    pub detail_title: SelectorChain,
}

impl ListingSelectors {
    pub fn from_config(cfg: &SelectorConfig) -> Result<Self> {
        Ok(Self {
            items: SelectorChain::parse("items", cfg.items.as_slice())?,
            title: SelectorChain::parse("title", cfg.title.as_slice())?,
            price: SelectorChain::parse("price", cfg.price.as_slice())?,
            stock: SelectorChain::parse("stock", cfg.stock.as_slice())?,
            brand: SelectorChain::parse("brand", cfg.brand.as_slice())?,
            link: SelectorChain::parse("link", cfg.link.as_slice())?,
            detail_title: SelectorChain::parse("detail_title", cfg.detail_title.as_slice())?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <div class="grid">
          <div class="card"><h3>  </h3><h4>Fallback name</h4></div>
          <div class="card"><h3>Direct name</h3></div>
        </div>
    "#;

    #[test]
    fn test_first_matching_selector_wins() {
        let doc = Html::parse_document(PAGE);
        let chain = SelectorChain::parse("items", &["li.product", "div.card", "div"]).unwrap();
        let (winner, found) = chain.select_all(&doc).unwrap();
        assert_eq!(winner, "div.card");
        assert_eq!(found.len(), 2);
    }

    #[test]
    fn test_first_text_skips_blank_matches() {
        let doc = Html::parse_document(PAGE);
        let items = SelectorChain::parse("items", &["div.card"]).unwrap();
        let title = SelectorChain::parse("title", &["h3", "h4"]).unwrap();
        let (_, cards) = items.select_all(&doc).unwrap();
        let names: Vec<_> = cards.iter().map(|c| title.first_text(*c)).collect();
        assert_eq!(names[0].as_deref().map(str::trim), Some("Fallback name"));
        assert_eq!(names[1].as_deref().map(str::trim), Some("Direct name"));
    }

    #[test]
    fn test_invalid_or_empty_chain_rejected() {
        assert!(SelectorChain::parse("title", &["h2[", "h2"]).is_err());
        assert!(SelectorChain::parse::<&str>("title", &[]).is_err());
    }

    #[test]
    fn test_default_config_compiles() {
        let sels = ListingSelectors::from_config(&SelectorConfig::default()).unwrap();
        let counts = sels.items.match_counts(&Html::parse_document("<p/>"));
        assert_eq!(counts[0], ("ul.products li.product".to_string(), 0));
    }
}
