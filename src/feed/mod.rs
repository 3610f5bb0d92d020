//! Listing feed conversion: fetch, parse, map, render.
//!
//! This module turns an Imob86 listing export into a Meta/Google home
//! listing catalog:
//!
//! - **Fetching**: One bounded HTTP GET per client hash
//! - **Parsing**: Encoding-aware reading of `<imovel>` records
//! - **Mapping**: Per-record field extraction with defaults and limits
//! - **Rendering**: RSS 2.0 output with the `g:` namespace
//!
//! # Architecture
//!
//! - [`fetcher`] - Upstream HTTP access with timeout and size limit
//! - [`source`] - XML reader producing [`ListingRecord`]s
//! - [`mapper`] - Record to [`FeedItem`] mapping and schema constants
//! - [`writer`] - Catalog document rendering
//!
//! # Example
//!
//! ```ignore
//! use imob_feed::feed::{convert, SourceFetcher};
//!
//! let bytes = fetcher.fetch("a1b2c3").await?;
//! let conversion = convert(&bytes, "www.imobiliariax.com.br")?;
//! println!("{}", conversion.document);
//! ```

mod fetcher;
mod mapper;
mod source;
mod writer;

pub use fetcher::{build_client, FetchError, SourceFetcher};
pub use mapper::{
    map_record, Address, FeedItem, RecordError, DESCRIPTION_MAX_CHARS, MAX_ADDITIONAL_IMAGES,
};
pub use source::{parse_listings, ListingRecord, SourceError};
pub use writer::render_document;

use thiserror::Error;

/// Failures that abort a whole conversion.
#[derive(Debug, Error)]
pub enum FeedError {
    /// Upstream payload is not a usable XML document.
    #[error("invalid source document: {0}")]
    InvalidDocument(#[from] SourceError),

    /// Output document could not be produced.
    #[error("failed to render feed: {0}")]
    Render(String),
}

/// Outcome of converting one upstream payload.
#[derive(Debug, Clone)]
pub struct Conversion {
    /// Complete catalog document.
    pub document: String,
    /// `<imovel>` records found in the source.
    pub records: usize,
    /// Items written to the document.
    pub items: usize,
    /// Records without a listing id.
    pub skipped: usize,
    /// Records dropped because they could not be mapped.
    pub failed: usize,
}

/// Converts an upstream payload into a catalog document.
///
/// Records are mapped in source order. A record without an id is skipped;
/// a record that fails to map is logged and dropped. Neither stops the
/// conversion, so every valid record always makes it into the output.
///
/// # Errors
///
/// [`FeedError::InvalidDocument`] if the payload does not parse. No partial
/// document is produced in that case.
pub fn convert(bytes: &[u8], domain: &str) -> Result<Conversion, FeedError> {
    let records = parse_listings(bytes)?;

    let mut items = Vec::with_capacity(records.len());
    let mut skipped = 0;
    let mut failed = 0;

    for (index, record) in records.iter().enumerate() {
        match map_record(record, domain) {
            Ok(Some(item)) => items.push(item),
            Ok(None) => {
                skipped += 1;
                tracing::debug!(index = index, "Skipping listing without idNaImobiliaria");
            }
            Err(e) => {
                failed += 1;
                tracing::warn!(index = index, error = %e, "Dropping listing that could not be mapped");
            }
        }
    }

    let document = render_document(&items)?;

    Ok(Conversion {
        document,
        records: records.len(),
        items: items.len(),
        skipped,
        failed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAYLOAD: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<imoveis>
  <imovel><idNaImobiliaria>1</idNaImobiliaria></imovel>
  <imovel><tituloSite>Sem id</tituloSite></imovel>
  <imovel>
    <idNaImobiliaria>2</idNaImobiliaria>
    <imagens><imagem><ordem>1</ordem></imagem></imagens>
  </imovel>
  <imovel><idNaImobiliaria>3</idNaImobiliaria></imovel>
</imoveis>"#;

    #[test]
    fn test_convert_counts() {
        let conversion = convert(PAYLOAD.as_bytes(), "a.com.br").unwrap();
        assert_eq!(conversion.records, 4);
        assert_eq!(conversion.items, 2);
        assert_eq!(conversion.skipped, 1);
        assert_eq!(conversion.failed, 1);
        assert!(conversion.document.contains("<g:home_listing_id>1</g:home_listing_id>"));
        assert!(!conversion.document.contains("<g:home_listing_id>2</g:home_listing_id>"));
        assert!(conversion.document.contains("<g:home_listing_id>3</g:home_listing_id>"));
    }

    #[test]
    fn test_convert_invalid_document() {
        let err = convert(b"<html><body>502 Bad Gateway<hr></body></html>", "a.com.br")
            .unwrap_err();
        assert!(matches!(err, FeedError::InvalidDocument(_)));
    }

    #[test]
    fn test_convert_is_deterministic() {
        let first = convert(PAYLOAD.as_bytes(), "a.com.br").unwrap();
        let second = convert(PAYLOAD.as_bytes(), "a.com.br").unwrap();
        assert_eq!(first.document, second.document);
    }
}
