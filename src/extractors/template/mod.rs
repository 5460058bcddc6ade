//! Chameleon and Zope page template scanner.
//!
//! Messages come from three places:
//!
//! * elements marked with `i18n:translate`, whose (normalized) content
//!   becomes the message text, with named sub-elements replaced by `${name}`
//! * attributes listed in `i18n:attributes`
//! * `_(...)` calls inside Python expressions, in TAL attributes or in
//!   `${...}` interpolations, which are handed to the Python scanner

pub mod expressions;
pub mod tree;

use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;

use crate::error::ExtractError;
use crate::extractors::python::extract_python;
use crate::message::{join_comments, normalize_whitespace, Location, Message};

use super::{decode_source, ExtractOptions, Extractor};
use expressions::{
    decode_entities, find_interpolations, has_translation_call, is_valid_expression,
    parse_defines, python_parts, strip_structure_prefix,
};
use tree::{Element, Node};

pub const I18N_NS: &str = "http://xml.zope.org/namespaces/i18n";
pub const TAL_NS: &str = "http://xml.zope.org/namespaces/tal";
pub const METAL_NS: &str = "http://xml.zope.org/namespaces/metal";
const XML_NS: &str = "http://www.w3.org/XML/1998/namespace";

/// `${...}` placeholders, removed when deciding whether text is translatable
static INTERPOLATION_REGEX: OnceLock<Regex> = OnceLock::new();

fn interpolation_regex() -> &'static Regex {
    INTERPOLATION_REGEX.get_or_init(|| {
        Regex::new(r"\$\{[^}]*\}").expect("INTERPOLATION_REGEX pattern is invalid - this is a bug")
    })
}

/// Expression language used when an expression has no `engine:` prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Engine {
    Python,
    Tales,
}

impl Engine {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "python" => Some(Engine::Python),
            "tales" | "path" => Some(Engine::Tales),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Engine::Python => "python",
            Engine::Tales => "tales",
        }
    }
}

/// Page template scanner. The Chameleon and Zope flavours differ only in
/// their default expression engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TemplateExtractor {
    name: &'static str,
    extensions: &'static [&'static str],
    engine: Engine,
}

impl TemplateExtractor {
    /// Chameleon templates, Python expressions by default
    pub fn chameleon() -> Self {
        Self {
            name: "chameleon",
            extensions: &[".pt"],
            engine: Engine::Python,
        }
    }

    /// Zope page templates, TALES path expressions by default
    pub fn zope() -> Self {
        Self {
            name: "zope",
            extensions: &[".zpt", ".cpt"],
            engine: Engine::Tales,
        }
    }

    pub fn engine(&self) -> Engine {
        self.engine
    }

    /// Scan already decoded template text.
    pub fn extract_text(
        &self,
        filename: &str,
        source: &str,
        options: &ExtractOptions,
    ) -> Result<Vec<Message>, ExtractError> {
        let nodes = tree::parse_document(source, filename)?;
        let mut scanner = TemplateScanner::new(filename, options, self.engine);
        scanner.visit_nodes(&nodes)?;
        Ok(scanner.messages)
    }
}

impl Extractor for TemplateExtractor {
    fn name(&self) -> &str {
        self.name
    }

    fn extensions(&self) -> &[&'static str] {
        self.extensions
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

    fn with_default_engine(&self, engine: Engine) -> Option<Box<dyn Extractor>> {
        Some(Box::new(Self { engine, ..*self }))
    }
}

/// Domain, context and comment in effect for an element. Each one is
/// inherited from the nearest ancestor that set it.
#[derive(Debug, Clone, Default)]
struct Scope {
    domain: Option<String>,
    context: Option<String>,
    comment: Option<String>,
}

/// An `i18n:translate` element being collected
#[derive(Debug)]
struct TranslateContext {
    scope: Scope,
    msgid: Option<String>,
    text: Vec<String>,
    parent: Option<usize>,
    /// Named nested translations, in document order
    children: Vec<(String, usize)>,
    line: usize,
}

impl TranslateContext {
    fn full_text(&self) -> String {
        normalize_whitespace(&self.text.concat())
    }

    fn is_ignorable(&self) -> bool {
        if self.msgid.is_some() {
            return false;
        }
        interpolation_regex()
            .replace_all(&self.full_text(), "")
            .trim()
            .is_empty()
    }
}

/// An attribute with its namespace resolved
#[derive(Debug)]
struct ResolvedAttribute<'e> {
    namespace: Option<String>,
    local: &'e str,
    value: &'e str,
    line: usize,
}

fn split_qname(name: &str) -> (Option<&str>, &str) {
    match name.split_once(':') {
        Some((prefix, local)) => (Some(prefix), local),
        None => (None, name),
    }
}

struct TemplateScanner<'a> {
    filename: &'a str,
    options: &'a ExtractOptions,
    engine: Engine,
    namespaces: Vec<HashMap<String, String>>,
    scopes: Vec<Scope>,
    /// Innermost `i18n:translate` per open element, as an index into `contexts`
    translate: Vec<Option<usize>>,
    contexts: Vec<TranslateContext>,
    messages: Vec<Message>,
}

impl<'a> TemplateScanner<'a> {
    fn new(filename: &'a str, options: &'a ExtractOptions, engine: Engine) -> Self {
        let defaults = HashMap::from([
            ("i18n".to_string(), I18N_NS.to_string()),
            ("tal".to_string(), TAL_NS.to_string()),
            ("metal".to_string(), METAL_NS.to_string()),
            ("xml".to_string(), XML_NS.to_string()),
        ]);
        Self {
            filename,
            options,
            engine,
            namespaces: vec![defaults],
            scopes: vec![Scope::default()],
            translate: vec![None],
            contexts: Vec::new(),
            messages: Vec::new(),
        }
    }

    fn visit_nodes(&mut self, nodes: &[Node]) -> Result<(), ExtractError> {
        for node in nodes {
            match node {
                Node::Element(element) => self.visit_element(element)?,
                Node::Text { text, line } => self.visit_text(text, *line)?,
                Node::CData { .. }
                | Node::Comment { .. }
                | Node::ProcessingInstruction { .. }
                | Node::Declaration { .. }
                | Node::DocType { .. } => {}
            }
        }
        Ok(())
    }

    fn current_translate(&self) -> Option<usize> {
        self.translate.last().copied().flatten()
    }

    fn resolve_attributes<'e>(&self, element: &'e Element) -> Vec<ResolvedAttribute<'e>> {
        let namespaces = self.namespaces.last();
        let lookup = |prefix: &str| namespaces.and_then(|map| map.get(prefix)).cloned();
        let element_ns = split_qname(&element.name).0.and_then(|prefix| lookup(prefix));
        let inherits_element_ns = matches!(
            element_ns.as_deref(),
            Some(I18N_NS) | Some(TAL_NS) | Some(METAL_NS)
        );

        element
            .attributes
            .iter()
            .filter(|attr| attr.name != "xmlns" && !attr.name.starts_with("xmlns:"))
            .map(|attr| {
                let (prefix, local) = split_qname(&attr.name);
                let namespace = match prefix {
                    Some(prefix) => lookup(prefix),
                    None if inherits_element_ns => element_ns.clone(),
                    None => None,
                };
                ResolvedAttribute {
                    namespace,
                    local,
                    value: &attr.value,
                    line: attr.line,
                }
            })
            .collect()
    }

    fn visit_element(&mut self, element: &Element) -> Result<(), ExtractError> {
        let mut namespaces = self.namespaces.last().cloned().unwrap_or_default();
        for attr in &element.attributes {
            if let Some(prefix) = attr.name.strip_prefix("xmlns:") {
                namespaces.insert(prefix.to_string(), attr.value.clone());
            }
        }
        self.namespaces.push(namespaces);

        let attributes = self.resolve_attributes(element);
        let i18n = |name: &str| {
            attributes
                .iter()
                .find(|attr| attr.namespace.as_deref() == Some(I18N_NS) && attr.local == name)
                .map(|attr| attr.value)
        };
        let i18n_name = i18n("name").filter(|name| !name.is_empty());

        let parent = self.current_translate();
        if let Some(parent) = parent {
            let placeholder = match i18n_name {
                Some(name) => format!("${{{}}}", name),
                None => "<dynamic element>".to_string(),
            };
            self.contexts[parent].text.push(placeholder);
        }

        let mut scope = self.scopes.last().cloned().unwrap_or_default();
        if let Some(domain) = i18n("domain").filter(|value| !value.is_empty()) {
            scope.domain = Some(domain.to_string());
        }
        if let Some(context) = i18n("context").filter(|value| !value.is_empty()) {
            scope.context = Some(context.to_string());
        }
        if let Some(comment) = i18n("comment").filter(|value| !value.is_empty()) {
            scope.comment = Some(comment.to_string());
        }

        let translate = match i18n("translate") {
            Some(msgid) => {
                let index = self.contexts.len();
                let msgid = msgid.trim();
                self.contexts.push(TranslateContext {
                    scope: scope.clone(),
                    msgid: (!msgid.is_empty()).then(|| msgid.to_string()),
                    text: Vec::new(),
                    parent,
                    children: Vec::new(),
                    line: element.line,
                });
                if let (Some(parent), Some(name)) = (parent, i18n_name) {
                    self.contexts[parent].children.push((name.to_string(), index));
                }
                Some(index)
            }
            None => None,
        };

        if let Some(spec) = i18n("attributes") {
            self.translate_attributes(spec, element, &scope);
        }

        for attr in &attributes {
            let sources = self.code_for_attribute(attr)?;
            for code in sources {
                self.parse_python(&code, attr.line)?;
            }
        }

        self.scopes.push(scope);
        self.translate.push(translate);
        self.visit_nodes(&element.children)?;
        self.translate.pop();
        self.scopes.pop();
        self.namespaces.pop();

        if let Some(index) = translate {
            self.finish_translation(index);
        }
        Ok(())
    }

    /// Handle `i18n:attributes="title; alt alt_msgid"`.
    fn translate_attributes(&mut self, spec: &str, element: &Element, scope: &Scope) {
        if let Some(target) = self.options.domain.as_deref() {
            if scope.domain.as_deref() != Some(target) {
                return;
            }
        }

        let plain = |name: &str| {
            element
                .attributes
                .iter()
                .find(|attr| split_qname(&attr.name).1 == name)
        };

        for part in spec.split(';').map(str::trim).filter(|part| !part.is_empty()) {
            let words: Vec<&str> = part.split_whitespace().collect();
            let (attribute, msgid) = match words.as_slice() {
                [attribute] => (*attribute, None),
                [attribute, msgid] => (*attribute, Some(*msgid)),
                _ => continue,
            };
            let Some(attr) = plain(attribute) else {
                continue;
            };
            let (id, comment) = match msgid {
                Some(msgid) => (msgid.to_string(), format!("Default: {}", attr.value)),
                None => (attr.value.clone(), String::new()),
            };
            if id.is_empty() {
                continue;
            }
            let message = Message::new(id, Location::new(self.filename, attr.line))
                .with_domain(scope.domain.clone())
                .with_context(scope.context.clone())
                .with_comment(comment);
            self.messages.push(message);
        }
    }

    /// Python code that an attribute evaluates.
    fn code_for_attribute(&self, attr: &ResolvedAttribute<'_>) -> Result<Vec<String>, ExtractError> {
        let value = decode_entities(attr.value);
        let mut sources = Vec::new();

        if attr.namespace.as_deref() == Some(TAL_NS) {
            match attr.local {
                "content" | "replace" => {
                    for code in python_parts(strip_structure_prefix(&value), self.engine) {
                        sources.push(self.checked(format!("({})", code), attr.line)?);
                    }
                }
                "define" => {
                    for define in self.defines(&value, attr.line)? {
                        for code in python_parts(&define.expression, self.engine) {
                            sources.push(self.checked(format!("({})", code), attr.line)?);
                        }
                    }
                }
                "repeat" => {
                    let defines = self.defines(&value, attr.line)?;
                    let [define] = defines.as_slice() else {
                        return Err(ExtractError::parse(
                            self.filename,
                            attr.line,
                            format!("tal:repeat must define exactly one variable: {}", value),
                        ));
                    };
                    for code in python_parts(&define.expression, self.engine) {
                        sources.push(self.checked(code, attr.line)?);
                    }
                }
                _ => {}
            }
            return Ok(sources);
        }

        let interpolations = find_interpolations(&value, self.engine).map_err(|fragment| {
            ExtractError::ExpressionSyntax {
                file: self.filename.to_string(),
                line: attr.line,
                fragment,
            }
        })?;
        Ok(interpolations.into_iter().map(|found| found.code).collect())
    }

    fn defines(&self, value: &str, line: usize) -> Result<Vec<expressions::Define>, ExtractError> {
        parse_defines(value).map_err(|clause| {
            ExtractError::parse(self.filename, line, format!("Invalid define syntax: {}", clause))
        })
    }

    fn checked(&self, code: String, line: usize) -> Result<String, ExtractError> {
        if is_valid_expression(&code) {
            Ok(code)
        } else {
            Err(ExtractError::ExpressionSyntax {
                file: self.filename.to_string(),
                line,
                fragment: code,
            })
        }
    }

    fn visit_text(&mut self, text: &str, line: usize) -> Result<(), ExtractError> {
        // Interpolations in text content are always Python. The translate
        // buffer keeps the raw markup text.
        let decoded = decode_entities(text);
        let interpolations =
            find_interpolations(&decoded, Engine::Python).map_err(|fragment| ExtractError::ExpressionSyntax {
                file: self.filename.to_string(),
                line,
                fragment,
            })?;
        for found in interpolations {
            let fragment_line = line + decoded[..found.offset].matches('\n').count();
            self.parse_python(&found.code, fragment_line)?;
        }

        if let Some(index) = self.current_translate() {
            self.contexts[index].text.push(text.to_string());
        }
        Ok(())
    }

    /// Hand code containing `_()` calls to the Python scanner, with line
    /// numbers relative to `line`.
    fn parse_python(&mut self, code: &str, line: usize) -> Result<(), ExtractError> {
        if !has_translation_call(code) {
            return Ok(());
        }
        let messages = extract_python(code, self.filename, self.options, line.saturating_sub(1))?;
        self.messages.extend(messages);
        Ok(())
    }

    fn finish_translation(&mut self, index: usize) {
        let context = &self.contexts[index];
        if context.is_ignorable() {
            return;
        }
        let Some(domain) = context.scope.domain.clone() else {
            return;
        };
        if let Some(target) = self.options.domain.as_deref() {
            if target != domain {
                return;
            }
        }

        let text = context.full_text();
        let (id, default) = match &context.msgid {
            Some(msgid) => (msgid.clone(), text),
            None => (text, String::new()),
        };
        if id.is_empty() {
            return;
        }

        let mut comments = Vec::new();
        if let Some(comment) = &context.scope.comment {
            comments.push(comment.clone());
        }
        if !default.is_empty() {
            comments.push(format!("Default: {}", default));
        }
        for (name, child) in &context.children {
            comments.push(format!(
                "Canonical text for ${{{}}} is: \"{}\"",
                name,
                self.contexts[*child].full_text()
            ));
        }
        if let Some(parent) = context.parent {
            comments.push(format!(
                "Used in sentence: \"{}\"",
                self.contexts[parent].full_text()
            ));
        }

        let message = Message::new(id, Location::new(self.filename, context.line))
            .with_domain(Some(domain))
            .with_context(context.scope.context.clone())
            .with_comment(join_comments(comments));
        self.messages.push(message);
    }
}
