//! Zope configuration (ZCML) scanner.
//!
//! Directives carry translatable `title` and `description` attributes. They
//! are only collected below an element that declares `i18n_domain`.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::ExtractError;
use crate::message::{Location, Message};

use super::{decode_source, ExtractOptions, Extractor, LineIndex};

const TRANSLATABLE_ATTRIBUTES: &[&str] = &["title", "description"];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ZcmlExtractor;

impl ZcmlExtractor {
    pub fn extract_text(
        &self,
        filename: &str,
        source: &str,
        options: &ExtractOptions,
    ) -> Result<Vec<Message>, ExtractError> {
        let lines = LineIndex::new(source);
        let mut reader = Reader::from_str(source);
        reader.config_mut().check_end_names = true;

        // Domain in effect for every open element.
        let mut domains: Vec<Option<String>> = Vec::new();
        let mut messages = Vec::new();

        loop {
            let start = reader.buffer_position() as usize;
            let event = match reader.read_event() {
                Ok(event) => event,
                Err(err) => {
                    let line = lines.line_of(reader.error_position() as usize);
                    return Err(ExtractError::parse(filename, line, err.to_string()));
                }
            };
            match event {
                Event::Start(tag) => {
                    let line = lines.line_of(start);
                    let domain =
                        self.visit_element(&tag, &domains, filename, line, options, &mut messages)?;
                    domains.push(domain);
                }
                Event::Empty(tag) => {
                    let line = lines.line_of(start);
                    self.visit_element(&tag, &domains, filename, line, options, &mut messages)?;
                }
                Event::End(_) => {
                    domains.pop();
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if !domains.is_empty() {
            return Err(ExtractError::parse(
                filename,
                lines.line_of(source.len()),
                "unexpected end of file inside an element",
            ));
        }
        Ok(messages)
    }

    /// Collect the attributes of one element and return the domain in
    /// effect for its children.
    fn visit_element(
        &self,
        tag: &BytesStart<'_>,
        domains: &[Option<String>],
        filename: &str,
        line: usize,
        options: &ExtractOptions,
        messages: &mut Vec<Message>,
    ) -> Result<Option<String>, ExtractError> {
        let mut attributes = Vec::new();
        for attribute in tag.attributes() {
            let attribute =
                attribute.map_err(|err| ExtractError::parse(filename, line, err.to_string()))?;
            let key = String::from_utf8_lossy(attribute.key.as_ref()).into_owned();
            let value = attribute
                .unescape_value()
                .map_err(|err| ExtractError::parse(filename, line, err.to_string()))?
                .into_owned();
            attributes.push((key, value));
        }

        let domain = attributes
            .iter()
            .find(|(key, _)| key == "i18n_domain")
            .map(|(_, value)| value.clone())
            .or_else(|| domains.last().cloned().flatten());

        let Some(active) = domain.as_deref() else {
            return Ok(None);
        };
        if options.domain.as_deref().is_some_and(|target| target != active) {
            return Ok(domain);
        }

        for (key, value) in &attributes {
            if TRANSLATABLE_ATTRIBUTES.contains(&key.as_str()) && !value.is_empty() {
                messages.push(Message::new(value.clone(), Location::new(filename, line)));
            }
        }
        Ok(domain)
    }
}

impl Extractor for ZcmlExtractor {
    fn name(&self) -> &str {
        "zcml"
    }

    fn extensions(&self) -> &[&'static str] {
        &[".zcml"]
    }

    fn extract_source(
        &self,
        filename: &str,
        source: &[u8],
        options: &ExtractOptions,
    ) -> Result<Vec<Message>, ExtractError> {
        let source = decode_source(filename, source)?;
        self.extract_text(filename, source, options)
    }
}
