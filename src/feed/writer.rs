//! Renders feed items as an RSS 2.0 document with the Google base namespace.
//!
//! Element names and nesting follow the Meta home listing catalog format
//! and must not change; catalog ingestion matches on them exactly.

use std::io::Cursor;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use crate::feed::mapper::{
    FeedItem, AVAILABILITY, COUNTRY, LISTING_TYPE, PROPERTY_TYPE, REGION,
};
use crate::feed::FeedError;

const GOOGLE_NAMESPACE: &str = "http://base.google.com/ns/1.0";
const CHANNEL_TITLE: &str = "Feed Imoveis";
const CHANNEL_DESCRIPTION: &str = "Catalogo Otimizado Meta Ads";

type XmlWriter = Writer<Cursor<Vec<u8>>>;

fn render_error(e: impl std::fmt::Display) -> FeedError {
    FeedError::Render(e.to_string())
}

fn start(writer: &mut XmlWriter, element: BytesStart<'_>) -> Result<(), FeedError> {
    writer.write_event(Event::Start(element)).map_err(render_error)
}

fn end(writer: &mut XmlWriter, name: &str) -> Result<(), FeedError> {
    writer
        .write_event(Event::End(BytesEnd::new(name)))
        .map_err(render_error)
}

/// Writes `<name>text</name>`, escaping `text`.
fn text_element(writer: &mut XmlWriter, name: &str, text: &str) -> Result<(), FeedError> {
    start(writer, BytesStart::new(name))?;
    writer
        .write_event(Event::Text(BytesText::new(text)))
        .map_err(render_error)?;
    end(writer, name)
}

/// Renders the complete catalog document.
///
/// Items appear in the order given. An empty slice still yields a valid
/// document with an empty channel.
pub fn render_document(items: &[FeedItem]) -> Result<String, FeedError> {
    let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);

    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(render_error)?;

    let mut rss = BytesStart::new("rss");
    rss.push_attribute(("xmlns:g", GOOGLE_NAMESPACE));
    rss.push_attribute(("version", "2.0"));
    start(&mut writer, rss)?;
    start(&mut writer, BytesStart::new("channel"))?;
    text_element(&mut writer, "title", CHANNEL_TITLE)?;
    text_element(&mut writer, "description", CHANNEL_DESCRIPTION)?;

    for item in items {
        write_item(&mut writer, item)?;
    }

    end(&mut writer, "channel")?;
    end(&mut writer, "rss")?;

    let bytes = writer.into_inner().into_inner();
    String::from_utf8(bytes).map_err(render_error)
}

fn write_item(writer: &mut XmlWriter, item: &FeedItem) -> Result<(), FeedError> {
    start(writer, BytesStart::new("item"))?;

    text_element(writer, "g:home_listing_id", &item.listing_id)?;
    text_element(writer, "title", &item.title)?;
    text_element(writer, "g:description", &item.description)?;
    text_element(writer, "g:price", &item.price)?;
    text_element(writer, "g:availability", AVAILABILITY)?;
    text_element(writer, "link", &item.link)?;

    if let Some(image_link) = &item.image_link {
        text_element(writer, "g:image_link", image_link)?;
    }
    for additional in &item.additional_image_links {
        text_element(writer, "g:additional_image_link", additional)?;
    }

    let mut address = BytesStart::new("g:address");
    address.push_attribute(("format", "struct"));
    start(writer, address)?;
    text_element(writer, "g:addr1", &item.address.addr1)?;
    text_element(writer, "g:city", &item.address.city)?;
    text_element(writer, "g:region", REGION)?;
    text_element(writer, "g:postal_code", &item.address.postal_code)?;
    text_element(writer, "g:country", COUNTRY)?;
    end(writer, "g:address")?;

    text_element(writer, "g:num_beds", &item.num_beds)?;
    text_element(writer, "g:num_baths", &item.num_baths)?;
    text_element(writer, "g:property_type", PROPERTY_TYPE)?;
    text_element(writer, "g:listing_type", LISTING_TYPE)?;

    end(writer, "item")
}
