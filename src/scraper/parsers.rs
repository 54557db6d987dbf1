use crate::config::PaginationScheme;
use crate::models::RawListingEntry;
use crate::scraper::selectors::{element_text, ListingSelectors, SelectorChain};
use crate::utils::snippet;
use scraper::Html;
use tracing::debug;
use url::Url;

// ── Listing page ──────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct ListingPage {
    /// The item selector that matched, if any did.
    pub matched_selector: Option<String>,
    pub entries: Vec<RawListingEntry>,
}

/// Pull raw product entries out of a listing page.
///
/// Pure and synchronous: the parsed document never outlives this call, so no
/// `Html` is held across an await by the caller.
pub fn parse_listing_page(html: &str, sels: &ListingSelectors, site_base: &Url) -> ListingPage {
    let doc = Html::parse_document(html);

    let Some((matched, items)) = sels.items.select_all(&doc) else {
        debug!("No item selector matched");
        return ListingPage::default();
    };
    debug!("Item selector {:?} matched {} entries", matched, items.len());

    let entries = items
        .into_iter()
        .map(|item| RawListingEntry {
            title: sels.title.first_text(item),
            price: sels.price.first_text(item),
            stock: sels.stock.first_text(item),
            brand: sels.brand.first_text(item),
            link: sels
                .link
                .first_attr(item, "href")
                .and_then(|href| resolve_link(site_base, &href)),
            snippet: snippet(&element_text(item), 120),
        })
        .collect();

    ListingPage {
        matched_selector: Some(matched.to_string()),
        entries,
    }
}

/// Absolute product URL; `javascript:` and fragment-only links are dropped.
pub fn resolve_link(site_base: &Url, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') || href.starts_with("javascript:") {
        return None;
    }
    site_base.join(href).ok().map(|u| u.to_string())
}

// ── Detail page ───────────────────────────────────────────────────────────────

pub fn parse_detail_title(html: &str, headings: &SelectorChain) -> Option<String> {
    let doc = Html::parse_document(html);
    headings.first_text_in(&doc)
}

// ── Pagination ────────────────────────────────────────────────────────────────

/// Guess the pagination scheme from the listing URL and the first page's HTML.
pub fn detect_pagination(listing: &Url, first_page_html: &str) -> PaginationScheme {
    if first_page_html.contains("/page/2") {
        PaginationScheme::Path
    } else if first_page_html.contains("paged=2") {
        PaginationScheme::Query
    } else if listing.query().is_some() {
        PaginationScheme::Query
    } else {
        PaginationScheme::Path
    }
}

/// URL of listing page `page` (1-based). Page 1 is the listing URL unchanged.
/// `Auto` must be resolved first; it is treated as `Path` here.
pub fn page_url(listing: &Url, page: u32, scheme: PaginationScheme) -> Url {
    if page <= 1 {
        return listing.clone();
    }

    let mut url = listing.clone();
    match scheme {
        PaginationScheme::Query => {
            let kept: Vec<(String, String)> = listing
                .query_pairs()
                .filter(|(k, _)| k != "paged")
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect();
            url.query_pairs_mut()
                .clear()
                .extend_pairs(kept)
                .append_pair("paged", &page.to_string());
        }
        PaginationScheme::Path | PaginationScheme::Auto => {
            let path = format!("{}/page/{}/", listing.path().trim_end_matches('/'), page);
            url.set_path(&path);
        }
    }
    url
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SelectorConfig;

    fn selectors() -> ListingSelectors {
        ListingSelectors::from_config(&SelectorConfig::default()).unwrap()
    }

    fn base() -> Url {
        Url::parse("https://shop.test/").unwrap()
    }

    const WOO_PAGE: &str = r#"
    <html><body>
      <ul class="products">
        <li class="product">
          <a class="woocommerce-LoopProduct-link" href="/produkt/ps5-controller/">
            <span class="onsale">-15%</span>
            <h2 class="woocommerce-loop-product__title">PS5 DualSense</h2>
            <span class="price">
              <del><span class="woocommerce-Price-amount"><bdi>79,90€</bdi></span></del>
              <ins><span class="woocommerce-Price-amount"><bdi>67,90€</bdi></span></ins>
            </span>
          </a>
          <p class="stock out-of-stock">Ska në stok</p>
        </li>
        <li class="product">
          <a href="https://shop.test/produkt/mouse/"><h2>Razer Viper</h2></a>
          <span class="price"><span class="woocommerce-Price-amount"><bdi>1.299,50€</bdi></span></span>
        </li>
      </ul>
      <a class="next page-numbers" href="https://shop.test/category/gaming/page/2/">→</a>
    </body></html>
    "#;

    #[test]
    fn test_parse_listing_page_fields() {
        let page = parse_listing_page(WOO_PAGE, &selectors(), &base());
        assert_eq!(page.matched_selector.as_deref(), Some("ul.products li.product"));
        assert_eq!(page.entries.len(), 2);

        let first = &page.entries[0];
        assert_eq!(first.title.as_deref().map(str::trim), Some("PS5 DualSense"));
        assert_eq!(first.price.as_deref().map(str::trim), Some("67,90€"));
        assert_eq!(first.stock.as_deref().map(str::trim), Some("Ska në stok"));
        assert_eq!(
            first.link.as_deref(),
            Some("https://shop.test/produkt/ps5-controller/")
        );

        let second = &page.entries[1];
        assert_eq!(second.title.as_deref().map(str::trim), Some("Razer Viper"));
        assert_eq!(second.price.as_deref().map(str::trim), Some("1.299,50€"));
        assert_eq!(second.stock, None);
    }

    #[test]
    fn test_falls_back_to_looser_item_selector() {
        let html = r#"<div class="products"><div class="product"><h3>Headset</h3></div></div>"#;
        let page = parse_listing_page(html, &selectors(), &base());
        assert_eq!(page.matched_selector.as_deref(), Some("div.products div.product"));
        assert_eq!(page.entries[0].title.as_deref(), Some("Headset"));
    }

    #[test]
    fn test_no_entries_on_unrelated_page() {
        let page = parse_listing_page("<html><p>Attention required</p></html>", &selectors(), &base());
        assert!(page.matched_selector.is_none());
        assert!(page.entries.is_empty());
    }

    #[test]
    fn test_detail_title_priority() {
        let sels = selectors();
        let html = r#"<h1 class="site">Shop</h1><h1 class="product_title">Xbox Pad</h1>"#;
        assert_eq!(parse_detail_title(html, &sels.detail_title).as_deref(), Some("Xbox Pad"));
        assert_eq!(parse_detail_title("<h1>Only</h1>", &sels.detail_title).as_deref(), Some("Only"));
        assert_eq!(parse_detail_title("<p>none</p>", &sels.detail_title), None);
    }

    #[test]
    fn test_resolve_link() {
        assert_eq!(
            resolve_link(&base(), "p/1/").as_deref(),
            Some("https://shop.test/p/1/")
        );
        assert_eq!(
            resolve_link(&base(), "https://cdn.test/x").as_deref(),
            Some("https://cdn.test/x")
        );
        assert_eq!(resolve_link(&base(), "#reviews"), None);
        assert_eq!(resolve_link(&base(), "javascript:void(0)"), None);
    }

    #[test]
    fn test_page_url_path_scheme() {
        let listing = Url::parse("https://shop.test/product-category/sale/").unwrap();
        assert_eq!(page_url(&listing, 1, PaginationScheme::Path), listing);
        assert_eq!(
            page_url(&listing, 3, PaginationScheme::Path).as_str(),
            "https://shop.test/product-category/sale/page/3/"
        );
        let no_slash = Url::parse("https://shop.test/product-category/sale").unwrap();
        assert_eq!(
            page_url(&no_slash, 2, PaginationScheme::Path).as_str(),
            "https://shop.test/product-category/sale/page/2/"
        );
    }

    #[test]
    fn test_page_url_query_scheme() {
        let listing = Url::parse("https://shop.test/?post_type=product&paged=1").unwrap();
        assert_eq!(
            page_url(&listing, 4, PaginationScheme::Query).as_str(),
            "https://shop.test/?post_type=product&paged=4"
        );
    }

    #[test]
    fn test_detect_pagination() {
        let plain = Url::parse("https://shop.test/category/gaming/").unwrap();
        let query = Url::parse("https://shop.test/?product_cat=gaming").unwrap();
        assert_eq!(detect_pagination(&plain, WOO_PAGE), PaginationScheme::Path);
        assert_eq!(
            detect_pagination(&plain, r#"<a href="?paged=2">2</a>"#),
            PaginationScheme::Query
        );
        assert_eq!(detect_pagination(&query, "<p></p>"), PaginationScheme::Query);
        assert_eq!(detect_pagination(&plain, "<p></p>"), PaginationScheme::Path);
    }
}
