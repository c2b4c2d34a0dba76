//! Tool-call parser.
//!
//! Extracts `{"tool": "...", "parameters": {...}}` objects from free-form
//! model text. The text may interleave prose and JSON and may wrap the JSON
//! in markdown fences. Extraction uses a small string-aware brace scanner
//! with a depth bound instead of a JSON tokenizer:
//!
//! - each candidate object is parsed independently, so one malformed call
//!   never hides the others;
//! - the reserved `stop` tool ends the scan;
//! - when nothing usable is found, a heuristic pass looks for common
//!   near-misses and produces a [`Diagnostic`] for a corrective re-prompt.
//!   The heuristics never produce executable calls.

use aegent_core::tool::ToolCall;
use regex_lite::Regex;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::LazyLock;
use tracing::{trace, warn};

/// Reserved tool name that terminates the agent loop.
pub const STOP_TOOL: &str = "stop";

/// Reason reported when `stop` carries neither `reason` nor `message`.
pub const DEFAULT_STOP_REASON: &str = "No reason provided";

/// Deepest brace nesting a candidate object may have.
pub const MAX_DEPTH: usize = 8;

/// Longest fragment excerpt kept in a [`ParseError`].
const EXCERPT_LEN: usize = 120;

static FENCE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?s)```[A-Za-z0-9_+-]*[ \t]*\r?\n?(.*?)```").ok());

static ALT_KEYS: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r#""(name|function|action|tool_name|command)"\s*:\s*"([A-Za-z_][A-Za-z0-9_]*)""#).ok()
});

static ALT_ARGS: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r#""(arguments|args|params|input|parameters)"\s*:"#).ok());

static PRINT_CALL: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"(?:^|[^A-Za-z0-9_.])(print|console\.log|alert|\$\.writeln|writeLn)\s*\(").ok()
});

static BARE_CALL: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*([a-z][a-z0-9]*(?:_[a-z0-9]+)+)\s*\(").ok());

/// The outcome of parsing one model response.
#[derive(Debug, Clone, Default)]
pub struct ParsedResponse {
    /// Tool calls in textual order, excluding `stop`
    pub calls: Vec<ToolCall>,

    /// Set when the reserved `stop` tool was found
    pub stop: Option<String>,

    /// Text with parsed calls removed (everything after `stop` dropped)
    pub residual: String,

    /// Candidate calls that were skipped
    pub errors: Vec<ParseError>,

    /// Why the response didn't follow the calling convention, if it didn't
    pub diagnostic: Option<Diagnostic>,
}

impl ParsedResponse {
    /// True when the response holds nothing to execute or stop on.
    pub fn is_empty(&self) -> bool {
        self.calls.is_empty() && self.stop.is_none()
    }
}

/// A candidate tool call that could not be used.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub excerpt: String,
    pub reason: String,
}

impl ParseError {
    fn new(fragment: &str, reason: impl Into<String>) -> Self {
        let excerpt = if fragment.chars().count() > EXCERPT_LEN {
            let cut: String = fragment.chars().take(EXCERPT_LEN).collect();
            format!("{cut}...")
        } else {
            fragment.to_string()
        };
        Self {
            excerpt,
            reason: reason.into(),
        }
    }
}

/// A recognised deviation from the calling convention.
#[derive(Debug, Clone, PartialEq)]
pub enum Diagnostic {
    /// JSON mentioning `"tool"` that couldn't be used
    InvalidToolJson { reason: String },
    /// `{"name": "x", "arguments": {...}}` and similar
    AlternateKeys { key: String, name: String },
    /// `print(...)`, `console.log(...)`, `alert(...)`
    PrintCall { callee: String },
    /// `create_square(...)` written as code
    BareCall { name: String },
}

impl Diagnostic {
    /// One sentence describing what went wrong, for the corrective prompt.
    pub fn describe(&self) -> String {
        match self {
            Diagnostic::InvalidToolJson { reason } => {
                format!("Your tool call JSON could not be used: {reason}.")
            }
            Diagnostic::AlternateKeys { key, name } => format!(
                "You used the key \"{key}\" for tool \"{name}\". Use \"tool\" and \"parameters\" instead."
            ),
            Diagnostic::PrintCall { callee } => format!(
                "You wrote a {callee}(...) call. Code is never executed; only JSON tool calls are."
            ),
            Diagnostic::BareCall { name } => format!(
                "You wrote {name}(...) as a function call. Tools must be called with JSON, not code syntax."
            ),
        }
    }
}

/// Replace every fenced block with its inner content.
pub fn strip_fences(text: &str) -> String {
    match FENCE.as_ref() {
        Some(re) => re.replace_all(text, "$1").into_owned(),
        None => text.to_string(),
    }
}

/// A balanced bracket span inside a string.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Span {
    start: usize,
    end: usize,
    too_deep: bool,
}

/// Find the bracket matching the `open` byte at `start`.
///
/// String literals are skipped (with escapes), so brackets inside JSON
/// strings don't count. Returns `None` if the span never closes.
fn scan_balanced(text: &str, start: usize, open: u8, close: u8) -> Option<Span> {
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut deepest = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, &b) in bytes.get(start..)?.iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }

        if b == b'"' {
            in_string = true;
        } else if b == open {
            depth += 1;
            deepest = deepest.max(depth);
        } else if b == close {
            depth = depth.saturating_sub(1);
            if depth == 0 {
                return Some(Span {
                    start,
                    end: start + offset + 1,
                    too_deep: deepest > MAX_DEPTH,
                });
            }
        }
    }
    None
}

/// Outcome of [`scan_balanced`] for every opener at or after `start`
/// that sits outside a string, computed in one stack pass.
fn index_balanced(text: &str, start: usize, open: u8, close: u8) -> HashMap<usize, Option<Span>> {
    let mut known = HashMap::new();
    // (offset, depth, deepest depth reached inside)
    let mut stack: Vec<(usize, usize, usize)> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    let tail = text.as_bytes().get(start..).unwrap_or_default();
    for (offset, &b) in tail.iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }

        if b == b'"' {
            in_string = true;
        } else if b == open {
            let depth = stack.len() + 1;
            stack.push((start + offset, depth, depth));
        } else if b == close
            && let Some((opened, depth, deepest)) = stack.pop()
        {
            if let Some(parent) = stack.last_mut() {
                parent.2 = parent.2.max(deepest);
            }
            known.insert(
                opened,
                Some(Span {
                    start: opened,
                    end: start + offset + 1,
                    too_deep: deepest - depth + 1 > MAX_DEPTH,
                }),
            );
        }
    }
    for (opened, ..) in stack {
        known.insert(opened, None);
    }
    known
}

/// Bracket matching over one text.
///
/// The first opener that never closes triggers [`index_balanced`]; later
/// lookups it covers are answered from that index, so unclosed input costs
/// one pass instead of a rescan per opener.
struct BracketScanner<'a> {
    text: &'a str,
    open: u8,
    close: u8,
    known: Option<HashMap<usize, Option<Span>>>,
}

impl<'a> BracketScanner<'a> {
    fn new(text: &'a str, open: u8, close: u8) -> Self {
        Self {
            text,
            open,
            close,
            known: None,
        }
    }

    fn span_at(&mut self, start: usize) -> Option<Span> {
        if let Some(known) = &self.known
            && let Some(span) = known.get(&start)
        {
            return *span;
        }
        let span = scan_balanced(self.text, start, self.open, self.close);
        if span.is_none() && self.known.is_none() {
            self.known = Some(index_balanced(self.text, start, self.open, self.close));
        }
        span
    }
}

enum Fragment {
    Call(ToolCall),
    Stop(String),
    /// Valid JSON with a `tool` key but the wrong shape
    Invalid(String),
    /// Not valid JSON
    Malformed(String),
    /// Valid JSON that isn't a tool call
    Other,
}

fn classify(fragment: &str) -> Fragment {
    let value: Value = match serde_json::from_str(fragment) {
        Ok(v) => v,
        Err(e) => return Fragment::Malformed(e.to_string()),
    };
    let Value::Object(mut obj) = value else {
        return Fragment::Other;
    };
    let Some(tool) = obj.get("tool") else {
        return Fragment::Other;
    };
    let Some(name) = tool.as_str().map(str::trim) else {
        return Fragment::Invalid("\"tool\" must be a string".into());
    };
    if name.is_empty() {
        return Fragment::Invalid("\"tool\" is empty".into());
    }
    let name = name.to_string();

    let parameters = obj.remove("parameters");

    if name == STOP_TOOL {
        let reason = parameters
            .as_ref()
            .and_then(|p| {
                [p.get("reason"), p.get("message")]
                    .into_iter()
                    .flatten()
                    .filter_map(Value::as_str)
                    .map(str::trim)
                    .find(|s| !s.is_empty())
            })
            .unwrap_or(DEFAULT_STOP_REASON)
            .to_string();
        return Fragment::Stop(reason);
    }

    match parameters {
        Some(Value::Object(map)) => Fragment::Call(ToolCall::new(name, map)),
        Some(_) => Fragment::Invalid(format!("\"parameters\" for {name} must be an object")),
        None => Fragment::Invalid(format!("{name} is missing a \"parameters\" object")),
    }
}

/// Parse a model response into tool calls.
pub fn parse(text: &str) -> ParsedResponse {
    let cleaned = strip_fences(text);
    let bytes = cleaned.as_bytes();

    let mut calls = Vec::new();
    let mut errors = Vec::new();
    let mut stop = None;
    let mut consumed: Vec<(usize, usize)> = Vec::new();
    let mut limit = cleaned.len();
    // Nested fragments of an already-reported span aren't reported again
    let mut error_until = 0usize;

    let mut braces = BracketScanner::new(&cleaned, b'{', b'}');
    let mut i = 0usize;
    while i < bytes.len() {
        if bytes[i] != b'{' {
            i += 1;
            continue;
        }
        let Some(span) = braces.span_at(i) else {
            i += 1;
            continue;
        };
        let fragment = &cleaned[span.start..span.end];
        let mentions_tool = fragment.contains("\"tool\"");

        if span.too_deep {
            if mentions_tool && span.start >= error_until {
                warn!(max_depth = MAX_DEPTH, "Dropping tool call nested too deeply");
                errors.push(ParseError::new(
                    fragment,
                    format!("nested deeper than {MAX_DEPTH} levels"),
                ));
                error_until = span.end;
            }
            i = span.end;
            continue;
        }

        match classify(fragment) {
            Fragment::Call(call) => {
                trace!(tool = %call.name, "Parsed tool call");
                calls.push(call);
                consumed.push((span.start, span.end));
                i = span.end;
            }
            Fragment::Stop(reason) => {
                stop = Some(reason);
                consumed.push((span.start, span.end));
                limit = span.end;
                break;
            }
            Fragment::Invalid(reason) => {
                if span.start >= error_until {
                    warn!(reason = %reason, "Skipping invalid tool call");
                    errors.push(ParseError::new(fragment, reason));
                    error_until = span.end;
                }
                i = span.end;
            }
            Fragment::Malformed(reason) => {
                if mentions_tool && span.start >= error_until {
                    warn!(reason = %reason, "Skipping malformed tool call JSON");
                    errors.push(ParseError::new(fragment, reason));
                    error_until = span.end;
                }
                i += 1;
            }
            Fragment::Other => i += 1,
        }
    }

    let residual = residual_text(&cleaned[..limit], &consumed);
    let diagnostic = if calls.is_empty() && stop.is_none() {
        diagnose(&cleaned, &errors)
    } else {
        None
    };

    ParsedResponse {
        calls,
        stop,
        residual,
        errors,
        diagnostic,
    }
}

/// `text` with the consumed spans cut out and blank runs collapsed.
fn residual_text(text: &str, consumed: &[(usize, usize)]) -> String {
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    for &(start, end) in consumed {
        if start >= cursor && end <= text.len() {
            out.push_str(&text[cursor..start]);
            cursor = end;
        }
    }
    out.push_str(&text[cursor.min(text.len())..]);

    let mut tidy = String::with_capacity(out.len());
    let mut blank_run = 0;
    for line in out.lines() {
        if line.trim().is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        tidy.push_str(line.trim_end());
        tidy.push('\n');
    }
    tidy.trim().to_string()
}

/// Look for common calling-convention mistakes.
fn diagnose(text: &str, errors: &[ParseError]) -> Option<Diagnostic> {
    if let Some(first) = errors.first() {
        return Some(Diagnostic::InvalidToolJson {
            reason: first.reason.clone(),
        });
    }

    if let (Some(keys), Some(args)) = (ALT_KEYS.as_ref(), ALT_ARGS.as_ref())
        && args.is_match(text)
        && let Some(caps) = keys.captures(text)
    {
        return Some(Diagnostic::AlternateKeys {
            key: caps[1].to_string(),
            name: caps[2].to_string(),
        });
    }

    if let Some(caps) = PRINT_CALL.as_ref().and_then(|re| re.captures(text)) {
        return Some(Diagnostic::PrintCall {
            callee: caps[1].to_string(),
        });
    }

    if let Some(caps) = BARE_CALL.as_ref().and_then(|re| re.captures(text)) {
        return Some(Diagnostic::BareCall {
            name: caps[1].to_string(),
        });
    }

    None
}

/// The first balanced JSON object or array in `text` that parses.
///
/// Used for structured (non tool-call) replies such as search plans.
pub fn find_json_value(text: &str) -> Option<Value> {
    let cleaned = strip_fences(text);
    let bytes = cleaned.as_bytes();

    let mut objects = BracketScanner::new(&cleaned, b'{', b'}');
    let mut arrays = BracketScanner::new(&cleaned, b'[', b']');

    for (i, &b) in bytes.iter().enumerate() {
        let scanner = match b {
            b'{' => &mut objects,
            b'[' => &mut arrays,
            _ => continue,
        };
        if let Some(span) = scanner.span_at(i)
            && let Ok(value) = serde_json::from_str::<Value>(&cleaned[span.start..span.end])
        {
            return Some(value);
        }
    }
    None
}

/// Render a tool call back into its wire form.
pub fn render_call(name: &str, parameters: &Map<String, Value>) -> String {
    serde_json::json!({ "tool": name, "parameters": parameters }).to_string()
}
