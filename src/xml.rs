//! Minimal XML helpers for the SOAP services (VIES, TEDB).
//!
//! Writing goes through [`XmlWriter`]; reading through [`walk`], which
//! reports text nodes and element ends together with the path of local
//! (prefix-free) element names leading to them.

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use std::io::Cursor;

use crate::core::VatError;

pub const SOAP_ENV_NS: &str = "http://schemas.xmlsoap.org/soap/envelope/";

fn xml_io(e: std::io::Error) -> VatError {
    VatError::Parse(format!("XML write error: {e}"))
}

pub struct XmlWriter {
    writer: Writer<Cursor<Vec<u8>>>,
}

impl XmlWriter {
    pub fn new() -> Result<Self, VatError> {
        let mut writer = Writer::new(Cursor::new(Vec::new()));
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
            .map_err(xml_io)?;
        Ok(Self { writer })
    }

    pub fn into_string(self) -> Result<String, VatError> {
        let buf = self.writer.into_inner().into_inner();
        String::from_utf8(buf).map_err(|e| VatError::Parse(format!("XML UTF-8 error: {e}")))
    }

    pub fn start_element(&mut self, name: &str) -> Result<&mut Self, VatError> {
        self.writer
            .write_event(Event::Start(BytesStart::new(name)))
            .map_err(xml_io)?;
        Ok(self)
    }

    pub fn start_element_with_attrs(
        &mut self,
        name: &str,
        attrs: &[(&str, &str)],
    ) -> Result<&mut Self, VatError> {
        let mut elem = BytesStart::new(name);
        for (k, v) in attrs {
            elem.push_attribute((*k, *v));
        }
        self.writer
            .write_event(Event::Start(elem))
            .map_err(xml_io)?;
        Ok(self)
    }

    pub fn empty_element(&mut self, name: &str) -> Result<&mut Self, VatError> {
        self.writer
            .write_event(Event::Empty(BytesStart::new(name)))
            .map_err(xml_io)?;
        Ok(self)
    }

    pub fn end_element(&mut self, name: &str) -> Result<&mut Self, VatError> {
        self.writer
            .write_event(Event::End(BytesEnd::new(name)))
            .map_err(xml_io)?;
        Ok(self)
    }

    pub fn text_element(&mut self, name: &str, text: &str) -> Result<&mut Self, VatError> {
        self.start_element(name)?;
        self.writer
            .write_event(Event::Text(BytesText::new(text)))
            .map_err(xml_io)?;
        self.end_element(name)
    }
}

/// A node reported by [`walk`].
#[derive(Debug)]
pub enum XmlNode<'a> {
    /// Non-empty text inside the element at the end of `path`.
    Text { path: &'a [String], text: &'a str },
    /// The element at the end of `path` just closed.
    End { path: &'a [String] },
}

/// Stream through `xml`, calling `visit` for every text node and element end.
pub fn walk(xml: &str, mut visit: impl FnMut(XmlNode<'_>)) -> Result<(), VatError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut path: Vec<String> = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => {
                path.push(local_name(e.local_name().as_ref()));
            }
            Ok(Event::Empty(ref e)) => {
                path.push(local_name(e.local_name().as_ref()));
                visit(XmlNode::End { path: &path });
                path.pop();
            }
            Ok(Event::Text(ref e)) => {
                let text = e
                    .unescape()
                    .map_err(|e| VatError::Parse(format!("XML text error: {e}")))?;
                if !text.is_empty() {
                    visit(XmlNode::Text {
                        path: &path,
                        text: &text,
                    });
                }
            }
            Ok(Event::CData(ref e)) => {
                let text = String::from_utf8_lossy(e);
                if !text.trim().is_empty() {
                    visit(XmlNode::Text {
                        path: &path,
                        text: text.trim(),
                    });
                }
            }
            Ok(Event::End(_)) => {
                visit(XmlNode::End { path: &path });
                path.pop();
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(VatError::Parse(format!(
                    "XML error at position {}: {e}",
                    reader.error_position()
                )));
            }
        }
    }

    Ok(())
}

/// `true` when the last elements of `path` equal `suffix`.
pub fn path_ends_with(path: &[String], suffix: &[&str]) -> bool {
    path.len() >= suffix.len()
        && path[path.len() - suffix.len()..]
            .iter()
            .zip(suffix)
            .all(|(a, b)| a == b)
}

/// Extract the `faultstring` of a SOAP fault, if the document is one.
pub fn soap_fault(xml: &str) -> Result<Option<String>, VatError> {
    let mut fault = None;
    walk(xml, |node| {
        if let XmlNode::Text { path, text } = node {
            if path_ends_with(path, &["Fault", "faultstring"]) {
                fault = Some(text.to_string());
            }
        }
    })?;
    Ok(fault)
}

fn local_name(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).into_owned()
}
