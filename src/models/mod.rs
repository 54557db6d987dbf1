use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

// ── Stock status ──────────────────────────────────────────────────────────────

/// Availability of a listed product.
///
/// Unknown phrasing is kept verbatim as `Raw`: the catalog still learns something
/// from it. On the wire this is a nullable string.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum StockStatus {
    InStock,
    OutOfStock,
    #[default]
    Unknown,
    Raw(String),
}

impl StockStatus {
    pub const IN_STOCK: &'static str = "in stock";
    pub const OUT_OF_STOCK: &'static str = "out of stock";

    pub fn as_wire(&self) -> Option<&str> {
        match self {
            StockStatus::InStock => Some(Self::IN_STOCK),
            StockStatus::OutOfStock => Some(Self::OUT_OF_STOCK),
            StockStatus::Unknown => None,
            StockStatus::Raw(s) => Some(s.as_str()),
        }
    }

    /// Inverse of `as_wire`. Does not re-classify, so raw text stays raw.
    pub fn from_wire(s: Option<&str>) -> Self {
        match s {
            None => StockStatus::Unknown,
            Some(s) if s.trim().is_empty() => StockStatus::Unknown,
            Some(Self::IN_STOCK) => StockStatus::InStock,
            Some(Self::OUT_OF_STOCK) => StockStatus::OutOfStock,
            Some(other) => StockStatus::Raw(other.to_string()),
        }
    }
}

impl fmt::Display for StockStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_wire().unwrap_or("unknown"))
    }
}

impl Serialize for StockStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.as_wire().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for StockStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        Ok(StockStatus::from_wire(raw.as_deref()))
    }
}

// ── Candidate record ──────────────────────────────────────────────────────────

/// A product scraped (or imported) and ready for reconciliation.
///
/// Only built after the name passed title validation, so `name` is never empty.
/// The serialized shape is the JSON artifact format.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CandidateRecord {
    pub name: String,
    pub price: Option<f64>,
    pub brand: Option<String>,
    #[serde(default)]
    pub status: StockStatus,
    pub product_url: Option<String>,
}

// ── Catalog wire types ────────────────────────────────────────────────────────

/// Body of `POST /products/`.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct NewProduct {
    pub name: String,
    pub brand: Option<String>,
    pub status: StockStatus,
    pub price: Option<f64>,
}

impl From<&CandidateRecord> for NewProduct {
    fn from(r: &CandidateRecord) -> Self {
        Self {
            name: r.name.clone(),
            brand: r.brand.clone(),
            status: r.status.clone(),
            price: r.price,
        }
    }
}

/// One element of `GET /products/`. Only the name matters for dedup; `id` and the
/// other columns are ignored so an odd row cannot spoil the snapshot.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteProduct {
    #[serde(default)]
    pub name: Option<String>,
}

// ── Raw listing rows ──────────────────────────────────────────────────────────

/// Untyped fields lifted from one product entry on a listing page.
#[derive(Debug, Clone, Default)]
pub struct RawListingEntry {
    pub title: Option<String>,
    pub price: Option<String>,
    pub stock: Option<String>,
    pub brand: Option<String>,
    pub link: Option<String>,
    /// Flattened entry text, kept for diagnostics when the entry is dropped.
    pub snippet: String,
}

/// Scraping-tool CSV export row (Octoparse and similar).
#[derive(Debug, Clone, Default)]
pub struct RawCsvRow {
    pub name: Option<String>,
    pub brand: Option<String>,
    pub status: Option<String>,
    pub price: Option<String>,
    pub product_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_wire_encoding() {
        assert_eq!(StockStatus::InStock.as_wire(), Some("in stock"));
        assert_eq!(StockStatus::Unknown.as_wire(), None);
        assert_eq!(
            StockStatus::from_wire(Some("Pre-order")),
            StockStatus::Raw("Pre-order".into())
        );
        assert_eq!(StockStatus::from_wire(Some("  ")), StockStatus::Unknown);
    }

    #[test]
    fn test_new_product_payload_shape() {
        let rec = CandidateRecord {
            name: "Logitech G502".into(),
            price: Some(49.9),
            brand: None,
            status: StockStatus::OutOfStock,
            product_url: Some("https://shop.test/p/g502/".into()),
        };
        let v = serde_json::to_value(NewProduct::from(&rec)).unwrap();
        assert_eq!(
            v,
            serde_json::json!({
                "name": "Logitech G502",
                "brand": null,
                "status": "out of stock",
                "price": 49.9
            })
        );
    }

    #[test]
    fn test_remote_product_ignores_extra_columns() {
        let body = r#"[
            {"id": 3, "name": "Mouse", "brand": null, "created_at": "2024-01-01"},
            {"id": null, "name": "Pad"},
            {"id": "a-7", "name": "Cable"},
            {"name": null}
        ]"#;
        let items: Vec<RemoteProduct> = serde_json::from_str(body).unwrap();
        let names: Vec<_> = items.iter().map(|p| p.name.as_deref()).collect();
        assert_eq!(names, vec![Some("Mouse"), Some("Pad"), Some("Cable"), None]);
    }
}
