use thiserror::Error;

use crate::feed::source::ListingRecord;
use crate::util::{strip_xml_invalid_chars, truncate_chars};

/// Longest description the ad platforms accept, counted before escaping.
pub const DESCRIPTION_MAX_CHARS: usize = 4900;

/// Images after the primary one that are carried into an item.
pub const MAX_ADDITIONAL_IMAGES: usize = 10;

pub const CURRENCY: &str = "BRL";
pub const AVAILABILITY: &str = "for_sale";
pub const REGION: &str = "PI";
pub const COUNTRY: &str = "BR";
pub const PROPERTY_TYPE: &str = "apartment";
pub const LISTING_TYPE: &str = "for_sale_by_agent";

/// A listing that could not be mapped. The record is dropped; the feed goes on.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RecordError {
    /// An `<imagem>` entry that would be emitted has no `<path>`.
    #[error("image entry {index} of listing {listing_id} has no path")]
    MissingImagePath { listing_id: String, index: usize },
}

/// Structured address block (`g:address format="struct"`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Address {
    pub addr1: String,
    pub city: String,
    pub postal_code: String,
}

/// One home listing as published to the catalog.
///
/// Values are plain text; escaping happens when the item is rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedItem {
    pub listing_id: String,
    pub title: String,
    pub description: String,
    pub price: String,
    pub link: String,
    /// `None` when the listing has no images; no image tags are rendered then.
    pub image_link: Option<String>,
    pub additional_image_links: Vec<String>,
    pub address: Address,
    pub num_beds: String,
    pub num_baths: String,
}

fn clean(text: &str) -> String {
    strip_xml_invalid_chars(text).into_owned()
}

/// Maps one source listing to a feed item.
///
/// # Returns
///
/// - `Ok(Some(item))` for a publishable listing
/// - `Ok(None)` when the listing has no `idNaImobiliaria` (silently skipped)
///
/// # Errors
///
/// [`RecordError::MissingImagePath`] when one of the first
/// `1 + MAX_ADDITIONAL_IMAGES` image entries has no path. Entries past that
/// window are never looked at.
pub fn map_record(record: &ListingRecord, domain: &str) -> Result<Option<FeedItem>, RecordError> {
    let Some(listing_id) = record.field("idNaImobiliaria") else {
        return Ok(None);
    };

    let title = match record.field("tituloSite") {
        Some(title) => title.to_string(),
        None => format!(
            "{} em {}",
            record.field_or("tipoImovel/nome", ""),
            record.field_or("bairro/nome", "")
        ),
    };

    let price = format!("{} {}", record.field_or("valor", "0"), CURRENCY);
    let link = format!("https://{}/imovel/{}", domain, listing_id);

    let mut images = Vec::new();
    for (index, path) in record
        .image_paths()
        .into_iter()
        .take(1 + MAX_ADDITIONAL_IMAGES)
        .enumerate()
    {
        match path {
            Some(path) => images.push(clean(path)),
            None => {
                return Err(RecordError::MissingImagePath {
                    listing_id: listing_id.to_string(),
                    index,
                })
            }
        }
    }
    let mut images = images.into_iter();
    let image_link = images.next();
    let additional_image_links: Vec<String> = images.collect();

    let description = strip_xml_invalid_chars(record.field_or("descricao", ""));
    let description = truncate_chars(&description, DESCRIPTION_MAX_CHARS).into_owned();

    Ok(Some(FeedItem {
        listing_id: clean(listing_id),
        title: clean(&title),
        description,
        price: clean(&price),
        link: clean(&link),
        image_link,
        additional_image_links,
        address: Address {
            addr1: clean(record.field_or("endereco", "")),
            city: clean(record.field_or("cidade/nome", "")),
            postal_code: clean(record.field_or("cep", "")),
        },
        num_beds: clean(record.field_or("quartos", "0")),
        num_baths: clean(record.field_or("banheiros", "0")),
    }))
}
