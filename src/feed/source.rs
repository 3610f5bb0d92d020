//! Reader for the Imob86 listing export.
//!
//! The export is a flat document: a root element (`<imoveis>` in practice,
//! though the name is not checked) holding one `<imovel>` per listing. Each
//! listing is kept as a small element tree so fields can be looked up by
//! path (`tipoImovel/nome`, `imagens/imagem`), mirroring how the export is
//! documented.
//!
//! Parsing is all-or-nothing: a payload that is not a single well-formed
//! XML element yields a [`SourceError`] and no records at all.

use encoding_rs::{Encoding, UTF_16BE, UTF_16LE, UTF_8};
use quick_xml::events::Event;
use quick_xml::Reader;
use thiserror::Error;

/// SEC-003: Maximum allowed element nesting depth.
/// The export is at most four levels deep; anything near this is hostile.
const MAX_DEPTH: usize = 64;

/// Element name of a listing record under the document root.
const LISTING_ELEMENT: &str = "imovel";

/// Errors that make the upstream payload unusable as a whole.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The XML reader rejected the input (mismatched tags, bad entity, bad encoding).
    #[error("XML parse error: {0}")]
    Xml(String),

    /// Input contained no element at all (empty body, plain-text error page).
    #[error("document has no root element")]
    NoRootElement,

    /// A second top-level element followed the root.
    #[error("document has more than one root element")]
    MultipleRoots,

    /// Non-whitespace text outside the root element.
    #[error("text content outside the root element")]
    TextOutsideRoot,

    /// Input ended with elements still open (truncated download).
    #[error("document ended with {0} unclosed element(s)")]
    UnclosedElements(usize),

    /// SEC-003: Nesting depth exceeds safety limit.
    #[error("nesting depth exceeds maximum of {0} levels")]
    MaxDepthExceeded(usize),
}

fn xml_error(e: impl std::fmt::Display) -> SourceError {
    SourceError::Xml(e.to_string())
}

/// A parsed XML element: name, direct text content, and child elements.
///
/// Attributes are not retained; the export carries all data in element text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    name: String,
    text: String,
    children: Vec<Element>,
}

impl Element {
    fn new(name: String) -> Self {
        Self {
            name,
            ..Default::default()
        }
    }

    /// Text before the first child element, with surrounding whitespace removed.
    ///
    /// Text that follows a child (`a<br/>b`) is not part of the value.
    /// Returns `None` when the element has no text or only whitespace, so
    /// callers can treat "absent" and "empty" the same way.
    pub fn text(&self) -> Option<&str> {
        let trimmed = self.text.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed)
        }
    }

    /// All descendants matching a `/`-separated path of child names, in document order.
    pub fn find_all(&self, path: &str) -> Vec<&Element> {
        let mut current = vec![self];
        for segment in path.split('/') {
            current = current
                .into_iter()
                .flat_map(|el| el.children.iter().filter(move |c| c.name == segment))
                .collect();
            if current.is_empty() {
                break;
            }
        }
        current
    }

    /// First descendant matching the path, if any.
    pub fn find(&self, path: &str) -> Option<&Element> {
        self.find_all(path).into_iter().next()
    }
}

/// One `<imovel>` entry from the export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingRecord {
    element: Element,
}

impl ListingRecord {
    /// Text of the field at `path`, or `None` if missing or blank.
    pub fn field(&self, path: &str) -> Option<&str> {
        self.element.find(path).and_then(Element::text)
    }

    /// Text of the field at `path`, falling back to `default`.
    pub fn field_or<'a>(&'a self, path: &str, default: &'a str) -> &'a str {
        self.field(path).unwrap_or(default)
    }

    /// Image entries in document order.
    ///
    /// Each item is the entry's `path` text, or `None` when the entry has
    /// no usable path. Entries are kept (not filtered) so callers can decide
    /// how a broken entry affects the record.
    pub fn image_paths(&self) -> Vec<Option<&str>> {
        self.element
            .find_all("imagens/imagem")
            .into_iter()
            .map(|image| image.find("path").and_then(Element::text))
            .collect()
    }
}

impl From<Element> for ListingRecord {
    fn from(element: Element) -> Self {
        Self { element }
    }
}

/// Parses the upstream payload and returns its listing records in document order.
///
/// The declared encoding (XML prolog or BOM) is honored, so ISO-8859-1
/// and UTF-16 exports decode correctly. Only direct `<imovel>` children of the root are
/// records; other root children are discarded as soon as they close.
///
/// # Security
///
/// - SEC-002: quick-xml never expands `<!ENTITY>` declarations; an
///   undefined entity reference is a parse error, not a fetch.
/// - SEC-003: nesting is capped at [`MAX_DEPTH`].
pub fn parse_listings(bytes: &[u8]) -> Result<Vec<ListingRecord>, SourceError> {
    let transcoded;
    let mut reader = match utf16_encoding(bytes) {
        Some(encoding) => {
            transcoded = decode_utf16(encoding, bytes)?;
            Reader::from_str(&transcoded)
        }
        None => Reader::from_reader(bytes),
    };
    reader.config_mut().check_end_names = true;

    let mut records = Vec::new();
    let mut stack: Vec<Element> = Vec::new();
    let mut root_seen = false;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf).map_err(xml_error)? {
            Event::Start(e) => {
                open_element(&stack, &mut root_seen)?;
                let name = reader
                    .decoder()
                    .decode(e.name().as_ref())
                    .map_err(xml_error)?
                    .into_owned();
                stack.push(Element::new(name));
            }
            Event::Empty(e) => {
                open_element(&stack, &mut root_seen)?;
                let name = reader
                    .decoder()
                    .decode(e.name().as_ref())
                    .map_err(xml_error)?
                    .into_owned();
                close_element(&mut stack, &mut records, Element::new(name));
            }
            Event::End(_) => {
                // check_end_names guarantees a matching open element
                if let Some(element) = stack.pop() {
                    close_element(&mut stack, &mut records, element);
                }
            }
            Event::Text(e) => {
                let text = e.unescape().map_err(xml_error)?;
                push_text(&mut stack, &text)?;
            }
            Event::CData(e) => {
                let text = reader.decoder().decode(&e).map_err(xml_error)?;
                push_text(&mut stack, &text)?;
            }
            Event::Eof => break,
            // Declaration, comments, processing instructions, DOCTYPE
            _ => {}
        }
        buf.clear();
    }

    if !stack.is_empty() {
        return Err(SourceError::UnclosedElements(stack.len()));
    }
    if !root_seen {
        return Err(SourceError::NoRootElement);
    }

    Ok(records)
}

/// Detects UTF-16 input by BOM, or by a BOM-less `<?` prolog.
///
/// quick-xml only reads ASCII-compatible encodings, so these documents are
/// transcoded up front.
fn utf16_encoding(bytes: &[u8]) -> Option<&'static Encoding> {
    if let Some((encoding, _)) = Encoding::for_bom(bytes) {
        return (encoding != UTF_8).then_some(encoding);
    }
    match bytes {
        [b'<', 0, b'?', 0, ..] => Some(UTF_16LE),
        [0, b'<', 0, b'?', ..] => Some(UTF_16BE),
        _ => None,
    }
}

fn decode_utf16(encoding: &'static Encoding, bytes: &[u8]) -> Result<String, SourceError> {
    let (text, had_errors) = encoding.decode_with_bom_removal(bytes);
    if had_errors {
        return Err(SourceError::Xml(format!(
            "malformed {} input",
            encoding.name()
        )));
    }
    Ok(text.into_owned())
}

/// Validates that a new element may open at the current position.
fn open_element(stack: &[Element], root_seen: &mut bool) -> Result<(), SourceError> {
    if stack.is_empty() {
        if *root_seen {
            return Err(SourceError::MultipleRoots);
        }
        *root_seen = true;
    }
    if stack.len() >= MAX_DEPTH {
        return Err(SourceError::MaxDepthExceeded(MAX_DEPTH));
    }
    Ok(())
}

/// Attaches a finished element to its parent, or collects it as a record.
fn close_element(stack: &mut [Element], records: &mut Vec<ListingRecord>, element: Element) {
    match stack.len() {
        // Root itself closed
        0 => {}
        1 => {
            if element.name == LISTING_ELEMENT {
                records.push(ListingRecord::from(element));
            }
        }
        _ => {
            if let Some(parent) = stack.last_mut() {
                parent.children.push(element);
            }
        }
    }
}

fn push_text(stack: &mut [Element], text: &str) -> Result<(), SourceError> {
    match stack.last_mut() {
        Some(top) => {
            if top.children.is_empty() {
                top.text.push_str(text);
            }
            Ok(())
        }
        None if text.trim_matches(|c: char| c.is_whitespace() || c == '\u{FEFF}').is_empty() => {
            Ok(())
        }
        None => Err(SourceError::TextOutsideRoot),
    }
}
