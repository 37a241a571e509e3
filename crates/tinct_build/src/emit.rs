//! Token emission
//!
//! A [`TokenTable`] flattens an export tree into one entry per scalar leaf,
//! each with the CSS custom property it is published as. The table renders a
//! stylesheet and a matching type declaration whose leaves are the `var(…)`
//! references, so consumers can look tokens up statically.
//!
//! ```ignore
//! let table = TokenTable::from_exports("acme", &json!({"color": {"red": "#f00"}}));
//! assert_eq!(table.get(&["color", "red"]).unwrap().variable, "--acme-color-red");
//! ```

use indexmap::IndexMap;
use serde_json::Value;

/// One exported token.
#[derive(Clone, Debug, PartialEq)]
pub struct TokenEntry {
    /// Key path from the export root.
    pub segments: Vec<String>,
    /// CSS custom property name, including the leading `--`.
    pub variable: String,
    pub value: Value,
}

impl TokenEntry {
    /// The value as it appears in CSS.
    pub fn css_value(&self) -> String {
        match &self.value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }

    /// `var(--name)` reference to this token.
    pub fn reference(&self) -> String {
        format!("var({})", self.variable)
    }
}

fn sanitize(segment: &str) -> String {
    segment
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '-'
            }
        })
        .collect()
}

fn variable_name(prefix: &str, segments: &[String]) -> String {
    let mut name = String::from("--");
    if !prefix.is_empty() {
        name.push_str(&sanitize(prefix));
    }
    for segment in segments {
        if name.len() > 2 {
            name.push('-');
        }
        name.push_str(&sanitize(segment));
    }
    name
}

/// Flattened tokens of one export tree, in document order.
#[derive(Clone, Debug, Default)]
pub struct TokenTable {
    entries: Vec<TokenEntry>,
    index: IndexMap<Vec<String>, usize>,
}

impl TokenTable {
    /// Null leaves are not tokens and are skipped.
    pub fn from_exports(prefix: &str, exports: &Value) -> Self {
        let mut table = Self::default();
        let mut segments = Vec::new();
        table.collect(prefix, exports, &mut segments);
        table
    }

    fn collect(&mut self, prefix: &str, node: &Value, segments: &mut Vec<String>) {
        match node {
            Value::Object(map) => {
                for (key, child) in map {
                    segments.push(key.clone());
                    self.collect(prefix, child, segments);
                    segments.pop();
                }
            }
            Value::Array(items) => {
                for (i, child) in items.iter().enumerate() {
                    segments.push(i.to_string());
                    self.collect(prefix, child, segments);
                    segments.pop();
                }
            }
            Value::Null => {}
            leaf => {
                self.index.insert(segments.clone(), self.entries.len());
                self.entries.push(TokenEntry {
                    segments: segments.clone(),
                    variable: variable_name(prefix, segments),
                    value: leaf.clone(),
                });
            }
        }
    }

    pub fn get(&self, path: &[&str]) -> Option<&TokenEntry> {
        let key: Vec<String> = path.iter().map(|s| s.to_string()).collect();
        self.index.get(&key).map(|&i| &self.entries[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &TokenEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Render every token as a custom property inside `selector`.
    pub fn to_css(&self, selector: &str) -> String {
        let mut css = format!("{selector} {{\n");
        for entry in &self.entries {
            css.push_str(&format!("  {}: {};\n", entry.variable, entry.css_value()));
        }
        css.push_str("}\n");
        css
    }

    /// Render a TypeScript declaration mirroring the export tree.
    pub fn to_type_declarations(&self, type_name: &str) -> String {
        let mut root = TypeNode::default();
        for entry in &self.entries {
            root.insert(&entry.segments, entry.reference());
        }
        let mut out = format!("export interface {type_name} ");
        root.render(&mut out, 0);
        out.push('\n');
        out
    }
}

#[derive(Debug, Default)]
struct TypeNode {
    leaf: Option<String>,
    children: IndexMap<String, TypeNode>,
}

impl TypeNode {
    fn insert(&mut self, segments: &[String], reference: String) {
        match segments.split_first() {
            None => self.leaf = Some(reference),
            Some((head, rest)) => self
                .children
                .entry(head.clone())
                .or_default()
                .insert(rest, reference),
        }
    }

    fn render(&self, out: &mut String, depth: usize) {
        if let Some(reference) = &self.leaf {
            out.push_str(&format!("{reference:?}"));
            return;
        }
        out.push_str("{\n");
        let indent = "  ".repeat(depth + 1);
        for (key, child) in &self.children {
            out.push_str(&format!("{indent}{}: ", property_key(key)));
            child.render(out, depth + 1);
            out.push_str(";\n");
        }
        out.push_str(&"  ".repeat(depth));
        out.push('}');
    }
}

fn property_key(key: &str) -> String {
    let mut chars = key.chars();
    let identifier = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_' || c == '$')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$');
    if identifier {
        key.to_string()
    } else {
        format!("{key:?}")
    }
}
