//! Parsing and rendering of the ERB subset used by job templates.
//!
//! # Tags
//!
//! - `<%= expr %>` - replaced by the value of `expr`
//! - `<%# ... %>` - comment, produces nothing
//! - `<%%` - a literal `<%`
//! - `-%>` closes a tag and swallows the newline right after it
//!
//! # Expressions
//!
//! - `index`, `spec.networks.default.ip` - dotted path into the binding tree
//! - `p("miku.name")`, `p("miku.name", "default")` - property lookup
//!
//! # Example
//!
//! ```
//! use nise_lib::template::{parse, Expr, Segment};
//!
//! let segments = parse("id=<%= spec.index %>\n").unwrap();
//! assert_eq!(segments, vec![
//!     Segment::Literal("id=".to_string()),
//!     Segment::Expr(Expr::Path(vec!["spec".to_string(), "index".to_string()])),
//!     Segment::Literal("\n".to_string()),
//! ]);
//! ```

use serde_json::Value;

use super::TemplateError;

/// A parsed template expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
  /// Dotted path into the binding tree.
  Path(Vec<String>),

  /// `p("key")` with an optional fallback.
  Property { key: String, default: Option<Value> },
}

/// A segment of parsed template text.
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
  Literal(String),
  Expr(Expr),
}

/// Source of values for template expressions.
pub trait Resolver {
  /// Value at a dotted path of the binding tree.
  fn lookup(&self, path: &[String]) -> Option<&Value>;

  /// Value of a dotted property key.
  fn property(&self, key: &str) -> Option<&Value>;
}

/// Parse template text into segments.
///
/// # Errors
///
/// Returns an error for an unclosed tag, an unsupported tag kind, or a
/// malformed expression.
pub fn parse(input: &str) -> Result<Vec<Segment>, TemplateError> {
  let mut segments = Vec::new();
  let mut literal = String::new();
  let mut rest = input;
  let mut offset = 0;

  while let Some(start) = rest.find("<%") {
    literal.push_str(&rest[..start]);
    let tag_pos = offset + start;
    let after_open = &rest[start + 2..];

    if let Some(after) = after_open.strip_prefix('%') {
      literal.push_str("<%");
      offset = tag_pos + 3;
      rest = after;
      continue;
    }

    let Some(close) = after_open.find("%>") else {
      return Err(TemplateError::Unclosed(tag_pos));
    };
    let mut body = &after_open[..close];
    let mut remainder = &after_open[close + 2..];
    let mut consumed = start + 2 + close + 2;

    if let Some(trimmed) = body.strip_suffix('-') {
      body = trimmed;
      if let Some(r) = remainder.strip_prefix("\r\n") {
        remainder = r;
        consumed += 2;
      } else if let Some(r) = remainder.strip_prefix('\n') {
        remainder = r;
        consumed += 1;
      }
    }
    let body = body.strip_prefix('-').unwrap_or(body);

    if let Some(expr) = body.strip_prefix('=') {
      if !literal.is_empty() {
        segments.push(Segment::Literal(std::mem::take(&mut literal)));
      }
      segments.push(Segment::Expr(parse_expr(expr)?));
    } else if !body.starts_with('#') {
      return Err(TemplateError::Malformed(format!(
        "only output and comment tags are supported: '<%{body}%>'"
      )));
    }

    offset += consumed;
    rest = remainder;
  }

  literal.push_str(rest);
  if !literal.is_empty() {
    segments.push(Segment::Literal(literal));
  }

  Ok(segments)
}

/// Parse the text of an output tag.
fn parse_expr(source: &str) -> Result<Expr, TemplateError> {
  let source = source.trim();

  if let Some(args) = source.strip_prefix("p(").and_then(|s| s.strip_suffix(')')) {
    return parse_property_call(args, source);
  }
  if let Some(args) = source.strip_prefix("p ") {
    return parse_property_call(args, source);
  }

  let path: Vec<String> = source.split('.').map(str::to_string).collect();
  if path.iter().any(|seg| !is_identifier(seg)) {
    return Err(TemplateError::Malformed(format!("unsupported expression '{source}'")));
  }
  Ok(Expr::Path(path))
}

fn parse_property_call(args: &str, source: &str) -> Result<Expr, TemplateError> {
  let malformed = || TemplateError::Malformed(format!("unsupported expression '{source}'"));

  let (key, rest) = parse_string_literal(args.trim()).ok_or_else(malformed)?;
  let rest = rest.trim();

  let default = if rest.is_empty() {
    None
  } else {
    let value = rest.strip_prefix(',').ok_or_else(malformed)?.trim();
    Some(parse_literal(value).ok_or_else(malformed)?)
  };

  Ok(Expr::Property { key, default })
}

/// Parse a leading quoted string, returning it and the unparsed remainder.
fn parse_string_literal(input: &str) -> Option<(String, &str)> {
  let quote = input.chars().next().filter(|c| *c == '"' || *c == '\'')?;
  let body = &input[1..];
  let end = body.find(quote)?;
  Some((body[..end].to_string(), &body[end + 1..]))
}

fn parse_literal(input: &str) -> Option<Value> {
  if let Some((s, rest)) = parse_string_literal(input) {
    return rest.trim().is_empty().then_some(Value::String(s));
  }
  match input {
    "nil" | "null" => Some(Value::Null),
    "true" => Some(Value::Bool(true)),
    "false" => Some(Value::Bool(false)),
    "[]" => Some(Value::Array(Vec::new())),
    "{}" => Some(Value::Object(Default::default())),
    _ => serde_json::from_str::<serde_json::Number>(input).ok().map(Value::Number),
  }
}

fn is_identifier(segment: &str) -> bool {
  !segment.is_empty()
    && segment
      .chars()
      .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Text a value renders as.
pub fn value_to_string(value: &Value) -> String {
  match value {
    Value::Null => String::new(),
    Value::String(s) => s.clone(),
    Value::Bool(b) => b.to_string(),
    Value::Number(n) => n.to_string(),
    composite => composite.to_string(),
  }
}

/// Render parsed segments with `resolver`.
pub fn render_segments(segments: &[Segment], resolver: &impl Resolver) -> Result<String, TemplateError> {
  let mut out = String::new();

  for segment in segments {
    match segment {
      Segment::Literal(s) => out.push_str(s),
      Segment::Expr(Expr::Path(path)) => {
        let value = resolver
          .lookup(path)
          .ok_or_else(|| TemplateError::UnknownBinding(path.join(".")))?;
        out.push_str(&value_to_string(value));
      }
      Segment::Expr(Expr::Property { key, default }) => {
        let value = match resolver.property(key).filter(|v| !v.is_null()) {
          Some(value) => value,
          None => default
            .as_ref()
            .ok_or_else(|| TemplateError::MissingProperty(key.clone()))?,
        };
        out.push_str(&value_to_string(value));
      }
    }
  }

  Ok(out)
}

/// Parse and render in one step.
pub fn render(input: &str, resolver: &impl Resolver) -> Result<String, TemplateError> {
  let segments = parse(input)?;
  render_segments(&segments, resolver)
}
