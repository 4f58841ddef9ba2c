//! Transform stage seam.
//!
//! The pipeline only needs two things from a transform stage: a
//! well-formedness check it can run before anything is uploaded, and the
//! conversion itself. [`XmlDocumentTransform`] is the default stage; it turns
//! the XML element tree into a JSON document envelope without interpreting
//! schedule content.

use std::collections::BTreeMap;

use bytes::Bytes;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};

use crate::error::{Result, TransferError};

/// Converts an ingest artifact into the destination representation.
pub trait ScheduleTransform: Send + Sync + 'static {
    /// Checks that `source` is structurally valid.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::MalformedInput`] when it is not.
    fn check_well_formed(&self, file_name: &str, source: &[u8]) -> Result<()>;

    /// Converts `source` for `channel_id` at `fps` frames per second.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::Transform`] when conversion fails.
    fn transform(&self, source: &[u8], channel_id: &str, fps: f64) -> Result<Bytes>;
}

/// One XML element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct XmlNode {
    /// Element name, including any namespace prefix.
    pub name: String,
    /// Attributes by name.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
    /// Concatenated text and CDATA content, trimmed.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub text: String,
    /// Child elements in document order.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<XmlNode>,
}

#[derive(Serialize)]
struct Envelope<'a> {
    channel_id: &'a str,
    frame_rate: f64,
    root: &'a str,
    document: &'a XmlNode,
}

/// Default transform: XML element tree to a JSON envelope.
///
/// Output shape:
///
/// ```json
/// { "channel_id": "...", "frame_rate": 25.0, "root": "...", "document": { ... } }
/// ```
///
/// serialised with four-space indentation.
#[derive(Debug, Clone, Copy, Default)]
pub struct XmlDocumentTransform;

impl ScheduleTransform for XmlDocumentTransform {
    fn check_well_formed(&self, file_name: &str, source: &[u8]) -> Result<()> {
        parse_document(source)
            .map(|_| ())
            .map_err(|message| TransferError::MalformedInput {
                file_name: file_name.to_string(),
                message,
            })
    }

    fn transform(&self, source: &[u8], channel_id: &str, fps: f64) -> Result<Bytes> {
        let document = parse_document(source).map_err(|message| TransferError::Transform {
            message,
        })?;

        let envelope = Envelope {
            channel_id,
            frame_rate: fps,
            root: &document.name,
            document: &document,
        };

        let mut out = Vec::with_capacity(source.len());
        let mut serializer = Serializer::with_formatter(&mut out, PrettyFormatter::with_indent(b"    "));
        envelope
            .serialize(&mut serializer)
            .map_err(|e| TransferError::Transform {
                message: format!("failed to serialise document: {e}"),
            })?;
        Ok(Bytes::from(out))
    }
}

/// Parses `source` into its root element.
///
/// # Errors
///
/// Returns a diagnostic when the document is not well-formed: mismatched or
/// unclosed tags, bad escapes, no root element, more than one root element,
/// or non-whitespace text outside the root.
pub fn parse_document(source: &[u8]) -> std::result::Result<XmlNode, String> {
    let mut reader = Reader::from_reader(source);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<XmlNode> = Vec::new();
    let mut root: Option<XmlNode> = None;
    let mut buf = Vec::new();

    loop {
        let position = reader.buffer_position();
        let event = reader
            .read_event_into(&mut buf)
            .map_err(|e| format!("at byte {position}: {e}"))?;

        match event {
            Event::Start(start) => {
                stack.push(element(&start)?);
            }
            Event::Empty(start) => {
                let node = element(&start)?;
                close(node, &mut stack, &mut root)?;
            }
            Event::End(_) => {
                let node = stack
                    .pop()
                    .ok_or_else(|| format!("at byte {position}: unexpected closing tag"))?;
                close(node, &mut stack, &mut root)?;
            }
            Event::Text(text) => {
                let text = text
                    .unescape()
                    .map_err(|e| format!("at byte {position}: {e}"))?;
                append_text(&mut stack, &text)?;
            }
            Event::CData(data) => {
                let raw = data.into_inner();
                let text = std::str::from_utf8(&raw)
                    .map_err(|e| format!("at byte {position}: invalid UTF-8 in CDATA: {e}"))?;
                append_text(&mut stack, text)?;
            }
            Event::Eof => break,
            Event::Decl(_)
            | Event::PI(_)
            | Event::DocType(_)
            | Event::Comment(_) => {}
        }
        buf.clear();
    }

    if let Some(open) = stack.last() {
        return Err(format!("unclosed element <{}>", open.name));
    }
    root.ok_or_else(|| "document has no root element".to_string())
}

fn element(start: &BytesStart<'_>) -> std::result::Result<XmlNode, String> {
    let name = std::str::from_utf8(start.name().as_ref())
        .map_err(|e| format!("invalid UTF-8 in element name: {e}"))?
        .to_string();

    let mut attributes = BTreeMap::new();
    for attr in start.attributes() {
        let attr = attr.map_err(|e| format!("bad attribute on <{name}>: {e}"))?;
        let key = std::str::from_utf8(attr.key.as_ref())
            .map_err(|e| format!("invalid UTF-8 in attribute name on <{name}>: {e}"))?
            .to_string();
        let value = attr
            .unescape_value()
            .map_err(|e| format!("bad attribute value on <{name}>: {e}"))?
            .into_owned();
        attributes.insert(key, value);
    }

    Ok(XmlNode {
        name,
        attributes,
        text: String::new(),
        children: Vec::new(),
    })
}

fn close(
    node: XmlNode,
    stack: &mut [XmlNode],
    root: &mut Option<XmlNode>,
) -> std::result::Result<(), String> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(node);
        return Ok(());
    }
    if root.is_some() {
        return Err(format!("second root element <{}>", node.name));
    }
    *root = Some(node);
    Ok(())
}

fn append_text(stack: &mut [XmlNode], text: &str) -> std::result::Result<(), String> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(());
    }
    let Some(current) = stack.last_mut() else {
        return Err("text outside the root element".to_string());
    };
    current.text.push_str(text);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCHEDULE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Schedule channel="HHUN" date="2025-05-15">
    <!-- first block -->
    <Event id="1" start="06:00:00:00">
        <Title>Morning &amp; News</Title>
        <Duration>00:30:00:00</Duration>
    </Event>
    <Event id="2" start="06:30:00:00"><Title><![CDATA[Weather <live>]]></Title></Event>
    <Break/>
</Schedule>
"#;

    #[test]
    fn parses_element_tree() {
        let root = parse_document(SCHEDULE.as_bytes()).unwrap();
        assert_eq!(root.name, "Schedule");
        assert_eq!(root.attributes["channel"], "HHUN");
        assert_eq!(root.children.len(), 3);
        assert_eq!(root.children[0].children[0].text, "Morning & News");
        assert_eq!(root.children[1].children[0].text, "Weather <live>");
        assert_eq!(root.children[2].name, "Break");
    }

    #[test]
    fn rejects_malformed_documents() {
        for bad in [
            "<Schedule><Event></Schedule>",
            "<Schedule>",
            "",
            "just text",
            "<a/><b/>",
            "<Schedule><Title>&bogus;</Title></Schedule>",
        ] {
            assert!(parse_document(bad.as_bytes()).is_err(), "{bad:?}");
        }
    }

    #[test]
    fn malformed_input_maps_to_malformed_error() {
        let err = XmlDocumentTransform
            .check_well_formed("SCH.xml", b"<Schedule><Event></Schedule>")
            .unwrap_err();
        assert!(matches!(err, TransferError::MalformedInput { .. }));
        assert!(err.to_string().starts_with("File SCH.xml contains malformed XML"));
    }

    #[test]
    fn transform_produces_indented_envelope() {
        let out = XmlDocumentTransform
            .transform(SCHEDULE.as_bytes(), "ARQTV3", 25.0)
            .unwrap();
        let text = std::str::from_utf8(&out).unwrap();
        assert!(text.contains("\n    \"channel_id\": \"ARQTV3\""));

        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value["root"], "Schedule");
        assert_eq!(value["frame_rate"], 25.0);
        assert_eq!(value["document"]["attributes"]["date"], "2025-05-15");
    }
}
