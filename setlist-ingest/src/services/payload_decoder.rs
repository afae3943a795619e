//! Set file decoder
//!
//! Turns a gzip-compressed XML set file into a [`ParsedDocument`]. This is a
//! purely structural transform: element order and repeated siblings are
//! preserved, attribute values stay strings, nothing is interpreted.

use crate::models::{Element, ParsedDocument};
use flate2::read::GzDecoder;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::io::Read;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Deepest element nesting accepted from a set file
///
/// Element trees are dropped and serialized recursively, so unbounded
/// nesting would overflow the thread stack.
pub const MAX_NESTING_DEPTH: usize = 1024;

/// Set file decode errors
#[derive(Debug, Error)]
pub enum DecodeError {
    /// File could not be opened or read
    #[error("Failed to read {0}: {1}")]
    Read(PathBuf, std::io::Error),

    /// Gzip stream is invalid or truncated
    #[error("Decompression failed: {0}")]
    Decompress(std::io::Error),

    /// Decompressed payload is not UTF-8
    #[error("Payload is not valid UTF-8: {0}")]
    Encoding(#[from] std::string::FromUtf8Error),

    /// Markup is malformed
    #[error("Malformed markup at byte {position}: {message}")]
    Markup { position: usize, message: String },

    /// Payload holds no root element
    #[error("Document has no root element")]
    Empty,
}

/// Anything able to turn a set file into a document tree
///
/// The discovery pipeline only talks to this trait so tests can count or
/// fail decode calls.
pub trait ProjectDecoder: Send + Sync {
    fn decode(&self, path: &Path) -> Result<ParsedDocument, DecodeError>;
}

/// Decoder for gzip-compressed XML set files
#[derive(Debug, Clone, Copy, Default)]
pub struct GzipXmlDecoder;

impl GzipXmlDecoder {
    pub fn new() -> Self {
        Self
    }
}

impl ProjectDecoder for GzipXmlDecoder {
    fn decode(&self, path: &Path) -> Result<ParsedDocument, DecodeError> {
        decode_and_parse(path)
    }
}

/// Decode a set file without going through discovery
///
/// Entry point for raw inspection of a single file.
pub fn decode_and_parse(path: &Path) -> Result<ParsedDocument, DecodeError> {
    let compressed =
        std::fs::read(path).map_err(|e| DecodeError::Read(path.to_path_buf(), e))?;

    tracing::debug!(
        path = %path.display(),
        compressed_bytes = compressed.len(),
        "Decoding set file"
    );

    let markup = decompress(&compressed)?;
    parse_markup(&markup)
}

/// Gunzip and validate UTF-8
pub fn decompress(compressed: &[u8]) -> Result<String, DecodeError> {
    let mut decoder = GzDecoder::new(compressed);
    let mut raw = Vec::with_capacity(compressed.len());
    decoder.read_to_end(&mut raw).map_err(DecodeError::Decompress)?;
    Ok(String::from_utf8(raw)?)
}

/// Parse XML text into an element tree
pub fn parse_markup(markup: &str) -> Result<ParsedDocument, DecodeError> {
    let mut reader = Reader::from_str(markup);
    reader.trim_text(true);

    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        let event = reader.read_event().map_err(|e| markup_error(&reader, e))?;
        match event {
            Event::Start(start) => {
                check_depth(&reader, stack.len() + 1)?;
                stack.push(element_from(&reader, &start)?);
            }
            Event::Empty(start) => {
                check_depth(&reader, stack.len() + 1)?;
                let element = element_from(&reader, &start)?;
                attach(&reader, &mut stack, &mut root, element)?;
            }
            Event::End(_) => {
                let element = stack.pop().ok_or_else(|| DecodeError::Markup {
                    position: reader.buffer_position(),
                    message: "unexpected closing tag".to_string(),
                })?;
                attach(&reader, &mut stack, &mut root, element)?;
            }
            Event::Text(text) => {
                let text = text.unescape().map_err(|e| markup_error(&reader, e))?;
                push_text(&mut stack, &text);
            }
            Event::CData(data) => {
                let text = String::from_utf8_lossy(&data.into_inner()).into_owned();
                push_text(&mut stack, &text);
            }
            Event::Eof => break,
            // Declarations, comments and processing instructions carry no data
            _ => {}
        }
    }

    if let Some(open) = stack.last() {
        return Err(DecodeError::Markup {
            position: reader.buffer_position(),
            message: format!("unclosed element <{}>", open.name),
        });
    }

    root.map(ParsedDocument::new).ok_or(DecodeError::Empty)
}

fn check_depth(reader: &Reader<&[u8]>, depth: usize) -> Result<(), DecodeError> {
    if depth > MAX_NESTING_DEPTH {
        return Err(DecodeError::Markup {
            position: reader.buffer_position(),
            message: format!("nesting too deep (more than {} levels)", MAX_NESTING_DEPTH),
        });
    }
    Ok(())
}

fn element_from(reader: &Reader<&[u8]>, start: &BytesStart<'_>) -> Result<Element, DecodeError> {
    let mut element = Element::new(String::from_utf8_lossy(start.name().as_ref()).into_owned());

    for attr in start.attributes() {
        let attr = attr.map_err(|e| markup_error(reader, e))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|e| markup_error(reader, e))?
            .into_owned();
        element.attributes.insert(key, value);
    }

    Ok(element)
}

/// Hand a finished element to its parent, or make it the document root
fn attach(
    reader: &Reader<&[u8]>,
    stack: &mut [Element],
    root: &mut Option<Element>,
    element: Element,
) -> Result<(), DecodeError> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None if root.is_none() => *root = Some(element),
        None => {
            return Err(DecodeError::Markup {
                position: reader.buffer_position(),
                message: format!("second root element <{}>", element.name),
            })
        }
    }
    Ok(())
}

fn push_text(stack: &mut [Element], text: &str) {
    // Text outside the root element is ignored
    if let Some(current) = stack.last_mut() {
        match &mut current.text {
            Some(existing) => existing.push_str(text),
            None => current.text = Some(text.to_string()),
        }
    }
}

fn markup_error(reader: &Reader<&[u8]>, error: impl std::fmt::Display) -> DecodeError {
    DecodeError::Markup {
        position: reader.buffer_position(),
        message: error.to_string(),
    }
}
