//! Python source scanner.
//!
//! Walks the token stream looking for calls to registered keywords (and the
//! `_` convenience form), collects their literal arguments and turns them
//! into messages. Only literal strings are ever used as message text; any
//! argument whose value cannot be known statically becomes
//! [`Value::Dynamic`].

pub mod tokenize;

use crate::comments::{CommentCollector, CommentTarget};
use crate::error::ExtractError;
use crate::format::{check_c_format, check_python_format};
use crate::keywords::Keyword;
use crate::logging;
use crate::message::{add_flag, join_comments, Location, Message};

use super::{decode_source, ExtractOptions, Extractor};
use tokenize::{decode_string, LexError, Token, TokenKind, TokenStream};

/// Name of the unregistered catch-all translation call
const FALLBACK_FUNCTION: &str = "_";

/// Scanner for `.py` files
#[derive(Debug, Default, Clone, Copy)]
pub struct PythonExtractor;

impl Extractor for PythonExtractor {
    fn name(&self) -> &str {
        "python"
    }

    fn extensions(&self) -> &[&'static str] {
        &[".py"]
    }

    fn extract_source(
        &self,
        filename: &str,
        source: &[u8],
        options: &ExtractOptions,
    ) -> Result<Vec<Message>, ExtractError> {
        let source = decode_source(filename, source)?;
        extract_python(source, filename, options, 0)
    }
}

/// Scan Python `source`. Reported lines are shifted by `line_offset`, which
/// lets template scanners feed in expression fragments found mid-document.
pub fn extract_python(
    source: &str,
    filename: &str,
    options: &ExtractOptions,
    line_offset: usize,
) -> Result<Vec<Message>, ExtractError> {
    let mut parser = PythonParser::new(options, filename, line_offset);
    let mut stream = TokenStream::new(source);
    loop {
        let token = parser.next(&mut stream)?;
        if token.kind == TokenKind::EndMarker {
            if let State::InCall(call) = &parser.state {
                return Err(parser.error(call.line, "Unexpected end of file"));
            }
            break;
        }
        parser.process_token(token, &mut stream)?;
    }
    Ok(parser.messages)
}

/// A call argument value
#[derive(Debug, Clone, PartialEq, Eq)]
enum Value {
    Text(String),
    Number(String),
    /// Anything that cannot be evaluated statically
    Dynamic,
}

#[derive(Debug, Clone)]
struct Argument {
    name: Option<String>,
    value: Value,
}

#[derive(Debug)]
struct Call {
    function: String,
    line: usize,
    arguments: Vec<Argument>,
    argument_name: Option<String>,
    in_argument: bool,
    in_string: bool,
}

impl Call {
    fn new(function: String, line: usize) -> Self {
        Self {
            function,
            line,
            arguments: Vec::new(),
            argument_name: None,
            in_argument: false,
            in_string: false,
        }
    }

    fn add_argument(&mut self, value: Value) {
        self.arguments.push(Argument {
            name: self.argument_name.take(),
            value,
        });
    }

    fn positional(&self) -> Vec<&Value> {
        self.arguments
            .iter()
            .filter(|arg| arg.name.is_none())
            .map(|arg| &arg.value)
            .collect()
    }

    fn keyword_argument(&self, name: &str) -> Option<&str> {
        self.arguments
            .iter()
            .rev()
            .find(|arg| arg.name.as_deref() == Some(name))
            .and_then(|arg| match &arg.value {
                Value::Text(text) => Some(text.as_str()),
                _ => None,
            })
    }
}

#[derive(Debug)]
enum State {
    Skip,
    SeenKeywordName { function: String, line: usize },
    InCall(Call),
}

/// Message fields resolved from a finished call
struct Resolved {
    domain: Option<String>,
    context: Option<String>,
    id: String,
    plural_id: Option<String>,
    comment: String,
}

struct PythonParser<'a> {
    options: &'a ExtractOptions,
    filename: &'a str,
    line_offset: usize,
    state: State,
    comments: CommentCollector,
    messages: Vec<Message>,
    /// Fragment-relative line of the call that produced the last message
    last_message_line: Option<usize>,
    /// Text of the last significant token, to recognise `def _(...)`
    previous: Option<String>,
}

impl<'a> PythonParser<'a> {
    fn new(options: &'a ExtractOptions, filename: &'a str, line_offset: usize) -> Self {
        Self {
            options,
            filename,
            line_offset,
            state: State::Skip,
            comments: CommentCollector::new(options.comments.clone()),
            messages: Vec::new(),
            last_message_line: None,
            previous: None,
        }
    }

    fn error(&self, line: usize, message: impl Into<String>) -> ExtractError {
        ExtractError::parse(self.filename, self.line_offset + line, message)
    }

    fn lex_error(&self, err: LexError) -> ExtractError {
        self.error(err.line, err.message)
    }

    fn next(&self, stream: &mut TokenStream) -> Result<Token, ExtractError> {
        stream.next_token().map_err(|err| self.lex_error(err))
    }

    fn process_token(&mut self, token: Token, stream: &mut TokenStream) -> Result<(), ExtractError> {
        match token.kind {
            TokenKind::Comment => {
                self.process_comment(&token);
                return Ok(());
            }
            _ if token.is_trivia() => return Ok(()),
            _ => {}
        }

        let state = std::mem::replace(&mut self.state, State::Skip);
        self.state = match state {
            State::Skip => self.state_skip(&token),
            State::SeenKeywordName { function, line } => {
                if token.is_op("(") {
                    State::InCall(Call::new(function, line))
                } else {
                    State::Skip
                }
            }
            State::InCall(mut call) => {
                if self.state_in_call(&mut call, &token, stream)? {
                    self.process_call(call)?;
                    State::Skip
                } else {
                    State::InCall(call)
                }
            }
        };
        self.previous = Some(token.text);
        Ok(())
    }

    fn process_comment(&mut self, token: &Token) {
        let target = self
            .comments
            .collect(&token.text, token.line, self.last_message_line);
        if let Some(CommentTarget::Previous(comment)) = target {
            if let Some(message) = self.messages.last_mut() {
                message.comment = join_comments([message.comment.as_str(), comment.text.as_str()]);
                for flag in &comment.flags {
                    add_flag(&mut message.flags, flag);
                }
            }
        }
    }

    fn state_skip(&self, token: &Token) -> State {
        if token.kind != TokenKind::Name {
            return State::Skip;
        }
        let is_definition = matches!(self.previous.as_deref(), Some("def" | "class"));
        if !is_definition
            && (self.options.keywords.contains(&token.text) || token.text == FALLBACK_FUNCTION)
        {
            State::SeenKeywordName {
                function: token.text.clone(),
                line: token.line,
            }
        } else {
            State::Skip
        }
    }

    /// Feed one token into an open call. Returns true once the call is closed.
    fn state_in_call(
        &self,
        call: &mut Call,
        token: &Token,
        stream: &mut TokenStream,
    ) -> Result<bool, ExtractError> {
        if token.kind != TokenKind::String {
            call.in_string = false;
        }

        match token.kind {
            TokenKind::Op => match token.text.as_str() {
                ")" => return Ok(true),
                "," => {
                    if !call.in_argument {
                        return Err(self.error(token.line, "Unexpected ,"));
                    }
                    call.in_argument = false;
                }
                "(" | "[" | "{" => {
                    call.in_argument = true;
                    self.skip_iterable(&token.text, stream)?;
                    call.add_argument(Value::Dynamic);
                }
                "." => {}
                other => return Err(self.error(token.line, format!("Unexpected token: {}", other))),
            },
            TokenKind::String => {
                let value = match decode_string(&token.text) {
                    Some(text) => Value::Text(text),
                    None => Value::Dynamic,
                };
                let continued = if call.in_string {
                    call.arguments.last_mut()
                } else {
                    None
                };
                match continued {
                    Some(last) => {
                        last.value = match (&last.value, value) {
                            (Value::Text(head), Value::Text(tail)) => Value::Text(format!("{}{}", head, tail)),
                            _ => Value::Dynamic,
                        };
                    }
                    None => {
                        call.add_argument(value);
                        call.in_argument = true;
                        call.in_string = true;
                    }
                }
            }
            TokenKind::Number => {
                if call.in_argument {
                    return Err(self.error(token.line, format!("Unexpected number: {}", token.text)));
                }
                call.add_argument(Value::Number(token.text.clone()));
                call.in_argument = true;
            }
            TokenKind::Name => {
                call.in_argument = true;
                let next = stream.peek_significant().map_err(|err| self.lex_error(err))?;
                let follower = if next.kind == TokenKind::Op {
                    next.text.clone()
                } else {
                    String::new()
                };
                match follower.as_str() {
                    "(" | "[" => {
                        self.next(stream)?;
                        self.skip_iterable(&follower, stream)?;
                        call.add_argument(Value::Dynamic);
                    }
                    "=" => {
                        if call.argument_name.is_some() {
                            return Err(self.error(token.line, format!("Unexpected token: {}", token.text)));
                        }
                        self.next(stream)?;
                        call.argument_name = Some(token.text.clone());
                    }
                    // Attribute access: the final name decides
                    "." => {}
                    _ => call.add_argument(Value::Dynamic),
                }
            }
            TokenKind::EndMarker => {
                return Err(self.error(token.line, "Unexpected end of file"));
            }
            _ => {
                return Err(self.error(token.line, format!("Unexpected token: {}", token.text)));
            }
        }
        Ok(false)
    }

    /// Consume tokens up to the bracket closing `opener`, which has already
    /// been read.
    fn skip_iterable(&self, opener: &str, stream: &mut TokenStream) -> Result<(), ExtractError> {
        let closer = match opener {
            "(" => ")",
            "[" => "]",
            _ => "}",
        };
        let mut depth = 1;
        loop {
            let token = self.next(stream)?;
            match token.kind {
                TokenKind::Op if token.text == opener => depth += 1,
                TokenKind::Op if token.text == closer => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(());
                    }
                }
                TokenKind::EndMarker => return Err(self.error(token.line, "Unexpected end of file")),
                TokenKind::Dedent => return Err(self.error(token.line, "Unexpected dedent")),
                _ => {}
            }
        }
    }

    fn process_call(&mut self, call: Call) -> Result<(), ExtractError> {
        let resolved = match self.options.keywords.get(&call.function) {
            Some(keyword) => self.resolve_keyword(&call, keyword)?,
            None => resolve_fallback(&call),
        };
        let Some(resolved) = resolved else {
            return Ok(());
        };
        if resolved.id.is_empty() {
            logging::debug(&format!(
                "{}[{}]: ignoring {}() call with an empty message id",
                self.filename,
                self.line_offset + call.line,
                call.function
            ));
            return Ok(());
        }

        let mut message = Message::new(
            resolved.id,
            Location::new(self.filename, self.line_offset + call.line),
        )
        .with_domain(resolved.domain)
        .with_context(resolved.context);
        if !message.matches_domain(self.options.domain.as_deref()) {
            return Ok(());
        }
        message.plural_id = resolved.plural_id;

        let mut comments = vec![resolved.comment];
        if let Some(comment) = self.comments.for_call(call.line) {
            comments.push(comment.text.clone());
            for flag in &comment.flags {
                add_flag(&mut message.flags, flag);
            }
        }
        message.comment = join_comments(comments);
        check_c_format(&message.id, &mut message.flags);
        check_python_format(&message.id, &mut message.flags);

        self.messages.push(message);
        self.last_message_line = Some(call.line);
        Ok(())
    }

    fn resolve_keyword(&self, call: &Call, keyword: &Keyword) -> Result<Option<Resolved>, ExtractError> {
        let arguments = call.positional();
        if let Some(required) = keyword.required_arguments {
            if arguments.len() != required {
                logging::debug(&format!(
                    "{}[{}]: {}() called with {} arguments, expected {}",
                    self.filename,
                    self.line_offset + call.line,
                    call.function,
                    arguments.len(),
                    required
                ));
                return Ok(None);
            }
        }

        // A configured position beyond the supplied arguments means this
        // call does not have the keyword's shape.
        let positions = [
            keyword.domain_param,
            keyword.msgid_param,
            keyword.msgid_plural_param,
            keyword.msgctxt_param,
        ];
        if positions
            .iter()
            .flatten()
            .any(|&position| position > arguments.len())
        {
            return Ok(None);
        }

        let get_string = |position: Option<usize>, what: &str| -> Result<Option<String>, ExtractError> {
            let Some(position) = position else {
                return Ok(None);
            };
            match arguments[position - 1] {
                Value::Text(text) => Ok(Some(text.clone())),
                _ => Err(self.error(call.line, format!("{} argument must be a string", what))),
            }
        };

        let domain = get_string(keyword.domain_param, "Domain")?;
        let id = get_string(keyword.msgid_param, "Message")?;
        let plural_id = get_string(keyword.msgid_plural_param, "Plural message")?;
        let context = get_string(keyword.msgctxt_param, "Context")?;
        let Some(id) = id else {
            return Ok(None);
        };

        Ok(Some(Resolved {
            domain,
            context,
            id,
            plural_id,
            comment: keyword.comment.clone(),
        }))
    }
}

/// `_(msgid, mapping, default, msgid=..., default=..., context=...)`.
/// Calls without a literal id are dropped silently. Other keyword arguments
/// are ignored.
fn resolve_fallback(call: &Call) -> Option<Resolved> {
    let arguments = call.positional();
    let mut id = match arguments.first() {
        Some(Value::Text(text)) => Some(text.clone()),
        _ => None,
    };
    let mut default = match arguments.get(2) {
        Some(Value::Text(text)) => text.clone(),
        _ => String::new(),
    };
    if let Some(text) = call.keyword_argument("msgid") {
        id = Some(text.to_string());
    }
    if let Some(text) = call.keyword_argument("default") {
        default = text.to_string();
    }
    let context = call.keyword_argument("context").map(str::to_string);

    let id = id?;
    let comment = if default.is_empty() {
        String::new()
    } else {
        format!("Default: {}", default)
    };
    Some(Resolved {
        domain: None,
        context,
        id,
        plural_id: None,
        comment,
    })
}
