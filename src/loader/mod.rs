//! Record files: the JSON artifact the scraper writes, and CSV exports from
//! point-and-click scraping tools.

use crate::models::{CandidateRecord, RawCsvRow, StockStatus};
use crate::scraper::cleaner::{normalise_whitespace, parse_price, StockMarkers, TitleValidator};
use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use tracing::{debug, info, warn};

// ── JSON artifact ─────────────────────────────────────────────────────────────

pub fn to_json(records: &[CandidateRecord]) -> Result<String> {
    serde_json::to_string_pretty(records).context("Failed to serialize records")
}

pub fn write_artifact(path: &Path, records: &[CandidateRecord]) -> Result<()> {
    let file = File::create(path).with_context(|| format!("Could not create {:?}", path))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, records)
        .with_context(|| format!("Failed to write records to {:?}", path))?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    info!("Saved {} records to {:?}", records.len(), path);
    Ok(())
}

pub fn read_artifact(path: &Path) -> Result<Vec<CandidateRecord>> {
    let file = File::open(path).with_context(|| format!("Could not open {:?}", path))?;
    let records: Vec<CandidateRecord> = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("{:?} is not a record artifact", path))?;
    debug!("Read {} records from {:?}", records.len(), path);
    Ok(records)
}

// ── CSV import ────────────────────────────────────────────────────────────────

/// First non-empty value among the header aliases.
fn column(headers: &csv::StringRecord, record: &csv::StringRecord, aliases: &[&str]) -> Option<String> {
    aliases.iter().find_map(|alias| {
        let idx = headers.iter().position(|h| h.trim() == *alias)?;
        record
            .get(idx)
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    })
}

pub fn csv_row_to_record(
    row: &RawCsvRow,
    validator: &TitleValidator,
    markers: &StockMarkers,
) -> Option<CandidateRecord> {
    let name = match validator.check(row.name.as_deref().unwrap_or_default()) {
        Ok(name) => name,
        Err(rejection) => {
            debug!("CSV row dropped: {}", rejection);
            return None;
        }
    };

    Some(CandidateRecord {
        name,
        price: row
            .price
            .as_deref()
            .and_then(parse_price)
            .filter(|p| *p >= 0.0),
        brand: row
            .brand
            .as_deref()
            .map(normalise_whitespace)
            .filter(|b| !b.is_empty()),
        status: row
            .status
            .as_deref()
            .map(|s| markers.classify(s))
            .unwrap_or(StockStatus::Unknown),
        product_url: row.product_url.clone(),
    })
}

/// Load a scraping-tool CSV export (columns `name`/`Name`/`product`, `brand`,
/// `status`, `price`, optional `product_url`/`url`).
pub fn load_csv(
    path: &Path,
    validator: &TitleValidator,
    markers: &StockMarkers,
) -> Result<Vec<CandidateRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("Could not open CSV {:?}", path))?;

    let headers = reader.headers()?.clone();
    let mut records = Vec::new();
    let mut dropped = 0usize;

    for (i, result) in reader.records().enumerate() {
        let record = match result {
            Ok(r) => r,
            Err(e) => {
                warn!("Row {} in {:?}: {}", i + 1, path, e);
                dropped += 1;
                continue;
            }
        };

        let raw = RawCsvRow {
            name: column(&headers, &record, &["name", "Name", "product", "Product"]),
            brand: column(&headers, &record, &["brand", "Brand"]),
            status: column(&headers, &record, &["status", "Status"]),
            price: column(&headers, &record, &["price", "Price"]),
            product_url: column(&headers, &record, &["product_url", "url", "URL"]),
        };

        match csv_row_to_record(&raw, validator, markers) {
            Some(rec) => records.push(rec),
            None => dropped += 1,
        }
    }

    info!("{:?}: {} records loaded, {} rows dropped", path, records.len(), dropped);
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScraperConfig;
    use std::io::Write as _;

    fn validator() -> TitleValidator {
        TitleValidator::new(&ScraperConfig::default().badge_patterns).unwrap()
    }

    #[test]
    fn test_artifact_round_trip() {
        let records = vec![
            CandidateRecord {
                name: "Nintendo Switch OLED".into(),
                price: Some(349.99),
                brand: Some("Nintendo".into()),
                status: StockStatus::InStock,
                product_url: Some("https://shop.test/p/switch/".into()),
            },
            CandidateRecord {
                name: "Kabëll HDMI 2m".into(),
                price: None,
                brand: None,
                status: StockStatus::Raw("Pre-order".into()),
                product_url: None,
            },
            CandidateRecord {
                name: "Mousepad".into(),
                price: Some(0.0),
                brand: None,
                status: StockStatus::Unknown,
                product_url: None,
            },
        ];

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("products.json");
        write_artifact(&path, &records).unwrap();
        assert_eq!(read_artifact(&path).unwrap(), records);
    }

    #[test]
    fn test_artifact_field_names() {
        let rec = CandidateRecord {
            name: "X".into(),
            price: None,
            brand: None,
            status: StockStatus::OutOfStock,
            product_url: None,
        };
        let v: serde_json::Value = serde_json::from_str(&to_json(&[rec]).unwrap()).unwrap();
        assert_eq!(
            v,
            serde_json::json!([{
                "name": "X", "price": null, "brand": null,
                "status": "out of stock", "product_url": null
            }])
        );
    }

    #[test]
    fn test_load_csv_aliases_and_validation() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "Name,Brand,Status,Price").unwrap();
        writeln!(file, "Gaming Chair,DXRacer,In stock,\"€1.299,50\"").unwrap();
        writeln!(file, "-15%,,,10").unwrap();
        writeln!(file, ",Sony,,20").unwrap();
        writeln!(file, "Webcam,,Ska në stok,abc").unwrap();
        file.flush().unwrap();

        let records = load_csv(file.path(), &validator(), &StockMarkers::default()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].name, "Gaming Chair");
        assert_eq!(records[0].brand.as_deref(), Some("DXRacer"));
        assert_eq!(records[0].price, Some(1299.5));
        assert_eq!(records[0].status, StockStatus::InStock);
        assert_eq!(records[1].name, "Webcam");
        assert_eq!(records[1].price, None);
        assert_eq!(records[1].status, StockStatus::OutOfStock);
    }
}
