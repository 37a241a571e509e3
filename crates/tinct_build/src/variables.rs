//! `${{ name }}` variable interpolation
//!
//! Spans may nest: in `${{ scale.${{ matrix.size }} }}` the inner span is
//! resolved first and its text becomes part of the outer name. A lookup that
//! answers [`Lookup::Ignore`] (or a `null` value) leaves the span in place so a
//! later pass with a different [`Variables`] source can resolve it.

use indexmap::IndexMap;
use serde_json::Value;
use thiserror::Error;

use crate::similarity;

const OPEN: &str = "${{";
const CLOSE: &str = "}}";

/// Result of asking a [`Variables`] source for a name.
#[derive(Clone, Debug, PartialEq)]
pub enum Lookup {
    Value(Value),
    /// Not this source's name; keep the span for a later pass.
    Ignore,
    Missing,
}

/// A source of variable values.
pub trait Variables {
    fn lookup(&self, name: &str) -> Lookup;

    /// Report every name this source knows. Used for suggestions.
    fn names(&self, emit: &mut dyn FnMut(&str));
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum VariableError {
    #[error("variable `{name}` not found{}", suggestion_hint(.suggestions))]
    NotFound {
        name: String,
        suggestions: Vec<String>,
    },

    #[error("variable `{name}` is not a string, number or boolean")]
    NotScalar { name: String },
}

fn suggestion_hint(suggestions: &[String]) -> String {
    if suggestions.is_empty() {
        String::new()
    } else {
        format!(" (did you mean: {})", suggestions.join(", "))
    }
}

impl VariableError {
    fn not_found(name: &str, vars: &dyn Variables) -> Self {
        let mut known = Vec::new();
        vars.names(&mut |n| known.push(n.to_string()));
        VariableError::NotFound {
            name: name.to_string(),
            suggestions: similarity::suggestions(name, known),
        }
    }
}

#[derive(Debug, PartialEq)]
enum Node {
    Text(String),
    Var(Vec<Node>),
}

fn push_text(nodes: &mut Vec<Node>, s: &str) {
    if let Some(Node::Text(t)) = nodes.last_mut() {
        t.push_str(s);
    } else {
        nodes.push(Node::Text(s.to_string()));
    }
}

fn literal(nodes: &[Node]) -> String {
    let mut out = String::new();
    for node in nodes {
        match node {
            Node::Text(t) => out.push_str(t),
            Node::Var(children) => {
                out.push_str(OPEN);
                out.push_str(&literal(children));
                out.push_str(CLOSE);
            }
        }
    }
    out
}

fn parse(input: &str) -> Vec<Node> {
    let mut stack: Vec<Vec<Node>> = vec![Vec::new()];
    let mut rest = input;

    while !rest.is_empty() {
        if let Some(after) = rest.strip_prefix(OPEN) {
            stack.push(Vec::new());
            rest = after;
            continue;
        }
        if stack.len() > 1 {
            if let Some(after) = rest.strip_prefix(CLOSE) {
                let children = stack.pop().unwrap_or_default();
                if let Some(parent) = stack.last_mut() {
                    parent.push(Node::Var(children));
                }
                rest = after;
                continue;
            }
        }

        let next = rest
            .char_indices()
            .skip(1)
            .find(|(i, _)| rest[*i..].starts_with(OPEN) || rest[*i..].starts_with(CLOSE))
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        if let Some(frame) = stack.last_mut() {
            push_text(frame, &rest[..next]);
        }
        rest = &rest[next..];
    }

    // Unclosed spans fall back to literal text.
    while stack.len() > 1 {
        let children = stack.pop().unwrap_or_default();
        let text = format!("{OPEN}{}", literal(&children));
        if let Some(parent) = stack.last_mut() {
            push_text(parent, &text);
        }
    }
    stack.pop().unwrap_or_default()
}

fn scalar_text(name: &str, value: &Value) -> Result<Option<String>, VariableError> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s.clone())),
        Value::Number(n) => Ok(Some(n.to_string())),
        Value::Bool(b) => Ok(Some(b.to_string())),
        Value::Array(_) | Value::Object(_) => Err(VariableError::NotScalar {
            name: name.to_string(),
        }),
    }
}

fn render(nodes: &[Node], vars: &dyn Variables, out: &mut String) -> Result<(), VariableError> {
    for node in nodes {
        match node {
            Node::Text(t) => out.push_str(t),
            Node::Var(children) => {
                let mut name = String::new();
                render(children, vars, &mut name)?;
                let name = name.trim();

                let resolved = match vars.lookup(name) {
                    Lookup::Value(value) => scalar_text(name, &value)?,
                    Lookup::Ignore => None,
                    Lookup::Missing => return Err(VariableError::not_found(name, vars)),
                };
                match resolved {
                    Some(text) => out.push_str(&text),
                    None => {
                        out.push_str(OPEN);
                        out.push(' ');
                        out.push_str(name);
                        out.push(' ');
                        out.push_str(CLOSE);
                    }
                }
            }
        }
    }
    Ok(())
}

/// Whether `input` contains a variable span.
pub fn has_variables(input: &str) -> bool {
    input.contains(OPEN)
}

/// Resolve every `${{ name }}` span in `input` against `vars`.
pub fn resolve_variables(input: &str, vars: &dyn Variables) -> Result<String, VariableError> {
    if !has_variables(input) {
        return Ok(input.to_string());
    }
    let nodes = parse(input);
    let mut out = String::with_capacity(input.len());
    render(&nodes, vars, &mut out)?;
    Ok(out)
}

/// Resolve variables in every string leaf of `value`.
pub fn resolve_value(value: &Value, vars: &dyn Variables) -> Result<Value, VariableError> {
    Ok(match value {
        Value::String(s) => Value::String(resolve_variables(s, vars)?),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|v| resolve_value(v, vars))
                .collect::<Result<_, _>>()?,
        ),
        Value::Object(map) => {
            let mut out = serde_json::Map::with_capacity(map.len());
            for (k, v) in map {
                out.insert(k.clone(), resolve_value(v, vars)?);
            }
            Value::Object(out)
        }
        other => other.clone(),
    })
}

/// A flat name → value table.
#[derive(Clone, Debug, Default)]
pub struct MapVariables {
    values: IndexMap<String, Value>,
}

impl MapVariables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }
}

impl Variables for MapVariables {
    fn lookup(&self, name: &str) -> Lookup {
        match self.values.get(name) {
            Some(v) => Lookup::Value(v.clone()),
            None => Lookup::Missing,
        }
    }

    fn names(&self, emit: &mut dyn FnMut(&str)) {
        for name in self.values.keys() {
            emit(name);
        }
    }
}

/// Variables read from a document tree by dotted path (`colors.red.500`).
///
/// Only scalar leaves are addressable.
#[derive(Clone, Copy, Debug)]
pub struct DocumentVariables<'a> {
    root: &'a Value,
}

impl<'a> DocumentVariables<'a> {
    pub fn new(root: &'a Value) -> Self {
        Self { root }
    }

    fn get(&self, name: &str) -> Option<&'a Value> {
        name.split('.').try_fold(self.root, |node, key| match node {
            Value::Object(map) => map.get(key),
            Value::Array(items) => key.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        })
    }
}

fn emit_child(key: &str, child: &Value, prefix: &mut String, emit: &mut dyn FnMut(&str)) {
    let len = prefix.len();
    if !prefix.is_empty() {
        prefix.push('.');
    }
    prefix.push_str(key);
    emit_leaves(child, prefix, emit);
    prefix.truncate(len);
}

fn emit_leaves(value: &Value, prefix: &mut String, emit: &mut dyn FnMut(&str)) {
    match value {
        Value::Object(map) => {
            for (k, v) in map {
                emit_child(k, v, prefix, emit);
            }
        }
        Value::Array(items) => {
            for (i, v) in items.iter().enumerate() {
                emit_child(&i.to_string(), v, prefix, emit);
            }
        }
        _ => emit(prefix),
    }
}

impl Variables for DocumentVariables<'_> {
    fn lookup(&self, name: &str) -> Lookup {
        match self.get(name) {
            Some(v @ (Value::String(_) | Value::Number(_) | Value::Bool(_) | Value::Null)) => {
                Lookup::Value(v.clone())
            }
            _ => Lookup::Missing,
        }
    }

    fn names(&self, emit: &mut dyn FnMut(&str)) {
        let mut prefix = String::new();
        emit_leaves(self.root, &mut prefix, emit);
    }
}
