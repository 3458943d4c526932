//! Query documents and their text form.
//!
//! Documents are built as a [`Doc`] tree and rendered in one pass. Bound
//! values render as `{$qpidx:N}`; the renderer also cuts the text at each
//! placeholder so the caller can interleave values later.

use docorm_proto::{Value, PLACEHOLDER_KEY};

/// A node of a query document.
#[derive(Debug, Clone, PartialEq)]
pub enum Doc {
    /// Ordered key/value pairs.
    Object(Vec<(String, Doc)>),
    /// Array of documents.
    Array(Vec<Doc>),
    /// A literal value.
    Literal(Value),
    /// A value bound at execution time, by position.
    Placeholder(u32),
}

impl Doc {
    /// An empty object.
    pub fn object() -> Self {
        Doc::Object(Vec::new())
    }

    /// An object with a single entry.
    pub fn entry(key: impl Into<String>, value: Doc) -> Self {
        Doc::Object(vec![(key.into(), value)])
    }

    /// A string literal.
    pub fn string(s: impl Into<String>) -> Self {
        Doc::Literal(Value::String(s.into()))
    }

    /// An integer literal.
    pub fn int(i: i64) -> Self {
        Doc::Literal(Value::Int64(i))
    }

    /// A boolean literal.
    pub fn bool(b: bool) -> Self {
        Doc::Literal(Value::Bool(b))
    }

    /// Whether this is an object with no entries.
    pub fn is_empty_object(&self) -> bool {
        matches!(self, Doc::Object(entries) if entries.is_empty())
    }

    /// Render to text, without splitting.
    pub fn to_text(&self) -> String {
        render(self).text
    }
}

/// Set `key` in `entries`, replacing an existing entry in place.
pub fn put(entries: &mut Vec<(String, Doc)>, key: impl Into<String>, value: Doc) {
    let key = key.into();
    match entries.iter_mut().find(|(k, _)| *k == key) {
        Some(entry) => entry.1 = value,
        None => entries.push((key, value)),
    }
}

/// Rendered document text and the segments between placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    /// Full text, placeholders included.
    pub text: String,
    /// Text around each placeholder; one more than the placeholder count.
    pub parts: Vec<String>,
}

/// Render `doc`.
pub fn render(doc: &Doc) -> Rendered {
    let mut renderer = Renderer::default();
    renderer.doc(doc);
    renderer.finish()
}

#[derive(Default)]
struct Renderer {
    text: String,
    part: String,
    parts: Vec<String>,
}

impl Renderer {
    fn push(&mut self, s: &str) {
        self.text.push_str(s);
        self.part.push_str(s);
    }

    fn doc(&mut self, doc: &Doc) {
        match doc {
            Doc::Object(entries) => {
                self.push("{");
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        self.push(",");
                    }
                    if should_quote_key(key) {
                        self.push("'");
                        self.push(key);
                        self.push("'");
                    } else {
                        self.push(key);
                    }
                    self.push(":");
                    self.doc(value);
                }
                self.push("}");
            }
            Doc::Array(items) => {
                self.push("[");
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        self.push(",");
                    }
                    self.doc(item);
                }
                self.push("]");
            }
            Doc::Literal(value) => {
                let mut out = String::new();
                value.write_literal(&mut out);
                self.push(&out);
            }
            Doc::Placeholder(position) => {
                self.parts.push(std::mem::take(&mut self.part));
                self.text
                    .push_str(&format!("{{{}:{}}}", PLACEHOLDER_KEY, position));
            }
        }
    }

    fn finish(mut self) -> Rendered {
        self.parts.push(self.part);
        Rendered {
            text: self.text,
            parts: self.parts,
        }
    }
}

/// Keys with anything but alphanumerics and `$` are single-quoted.
pub fn should_quote_key(key: &str) -> bool {
    key.chars().any(|c| !c.is_alphanumeric() && c != '$')
}
