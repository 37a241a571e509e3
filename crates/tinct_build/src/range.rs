//! `$[[ … ]]` range expansion
//!
//! A span holds a comma-separated list of items. Each item is either a literal
//! or a checkpoint range `a..b` (chains like `a..b..c` are allowed). A string
//! with several spans expands to the cartesian product of their items, the
//! first span varying slowest.
//!
//! Checkpoints come in families:
//!
//! | family            | examples              | index                 |
//! |-------------------|-----------------------|-----------------------|
//! | `serial`          | `-2`, `0`, `12`       | the integer           |
//! | `standard-single` | `s`, `m`, `l`         | -1, 0, 1              |
//! | `standard-double` | `sm`, `md`, `lg`      | -1, 0, 1              |
//! | `extra`           | `xs`, `xxl`           | ±(x-count + 1)        |
//! | `number-extra`    | `2xs`, `3xl`          | ±(N + 1)              |
//! | `extra-number`    | `x2s`, `x3l`          | ±(N + 1)              |
//!
//! The size families share one scale, so `s..xxl` walks `s, m, l, xl, xxl`.
//! The single-`x` forms (`xs`, `xl`) are the bridge between the standard tier
//! and the extra tiers and are the only non-strict checkpoints.

use thiserror::Error;

const OPEN: &str = "$[[";
const CLOSE: &str = "]]";

/// Upper bound on the number of strings a single input may expand to.
pub const MAX_EXPANSION: usize = 100_000;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RangeError {
    #[error("unclosed `$[[` in `{input}`")]
    Unclosed { input: String },

    #[error("cannot expand `{from}..{to}`: `{checkpoint}` is not a range checkpoint")]
    Unclassified {
        from: String,
        to: String,
        checkpoint: String,
    },

    #[error("cannot expand `{from}..{to}`: checkpoints are not continuous")]
    Discontinuity { from: String, to: String },

    #[error("`{input}` expands to more than {} values", MAX_EXPANSION)]
    TooLarge { input: String },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Family {
    Serial,
    StandardSingle,
    StandardDouble,
    Extra,
    NumberExtra,
    ExtraNumber,
}

impl Family {
    fn is_standard(self) -> bool {
        matches!(self, Family::StandardSingle | Family::StandardDouble)
    }

    fn is_extra(self) -> bool {
        matches!(
            self,
            Family::Extra | Family::NumberExtra | Family::ExtraNumber
        )
    }

    fn render(self, index: i64) -> Option<String> {
        let side = if index < 0 { 's' } else { 'l' };
        let steps = index.unsigned_abs().saturating_sub(1);
        match self {
            Family::Serial => Some(index.to_string()),
            Family::StandardSingle => match index {
                -1 => Some("s".into()),
                0 => Some("m".into()),
                1 => Some("l".into()),
                _ => None,
            },
            Family::StandardDouble => match index {
                -1 => Some("sm".into()),
                0 => Some("md".into()),
                1 => Some("lg".into()),
                _ => None,
            },
            Family::Extra if steps >= 1 => Some(format!("{}{side}", "x".repeat(steps as usize))),
            Family::NumberExtra if steps >= 2 => Some(format!("{steps}x{side}")),
            Family::ExtraNumber if steps >= 2 => Some(format!("x{steps}{side}")),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Checkpoint {
    family: Family,
    index: i64,
    strict: bool,
}

fn size_side(c: char) -> Option<i64> {
    match c {
        's' => Some(-1),
        'l' => Some(1),
        _ => None,
    }
}

fn parse_count(digits: &str) -> Option<i64> {
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse::<i64>().ok().filter(|n| *n >= 1)
}

/// Signed index of the `n`-extra tier; `None` once it leaves `i64`.
fn extra_index(sign: i64, n: i64) -> Option<i64> {
    n.checked_add(1)?.checked_mul(sign)
}

fn classify(token: &str) -> Option<Checkpoint> {
    let digits = token.strip_prefix('-').unwrap_or(token);
    if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
        return token.parse::<i64>().ok().map(|index| Checkpoint {
            family: Family::Serial,
            index,
            strict: true,
        });
    }

    let standard = |family, index| {
        Some(Checkpoint {
            family,
            index,
            strict: true,
        })
    };
    match token {
        "s" => return standard(Family::StandardSingle, -1),
        "m" => return standard(Family::StandardSingle, 0),
        "l" => return standard(Family::StandardSingle, 1),
        "sm" => return standard(Family::StandardDouble, -1),
        "md" => return standard(Family::StandardDouble, 0),
        "lg" => return standard(Family::StandardDouble, 1),
        _ => {}
    }

    let last = token.chars().last()?;
    let sign = size_side(last)?;
    let body = &token[..token.len() - 1];

    if !body.is_empty() && body.bytes().all(|b| b == b'x') {
        let count = body.len() as i64;
        return Some(Checkpoint {
            family: Family::Extra,
            index: sign * (count + 1),
            strict: count != 1,
        });
    }
    if let Some(n) = body.strip_suffix('x').and_then(parse_count) {
        return Some(Checkpoint {
            family: Family::NumberExtra,
            index: extra_index(sign, n)?,
            strict: true,
        });
    }
    if let Some(n) = body.strip_prefix('x').and_then(parse_count) {
        return Some(Checkpoint {
            family: Family::ExtraNumber,
            index: extra_index(sign, n)?,
            strict: true,
        });
    }
    None
}

fn continuous(a: Checkpoint, b: Checkpoint) -> bool {
    if a.family == b.family {
        return true;
    }
    if a.family == Family::Serial || b.family == Family::Serial {
        return false;
    }
    if a.family.is_standard() && b.family.is_standard() {
        return false;
    }
    if a.family.is_extra() && b.family.is_extra() {
        return !a.strict || !b.strict;
    }
    true
}

fn expand_pair(from: &str, to: &str) -> Result<Vec<String>, RangeError> {
    let unclassified = |checkpoint: &str| RangeError::Unclassified {
        from: from.to_string(),
        to: to.to_string(),
        checkpoint: checkpoint.to_string(),
    };
    let discontinuity = || RangeError::Discontinuity {
        from: from.to_string(),
        to: to.to_string(),
    };

    let a = classify(from).ok_or_else(|| unclassified(from))?;
    let b = classify(to).ok_or_else(|| unclassified(to))?;
    if !continuous(a, b) {
        return Err(discontinuity());
    }

    let span = a.index.abs_diff(b.index);
    if span >= MAX_EXPANSION as u64 {
        return Err(RangeError::TooLarge {
            input: format!("{from}..{to}"),
        });
    }

    // Stricter endpoint renders first; the single-x spelling bridges the tiers.
    let mut renderers = if !a.strict && b.strict {
        vec![b.family, a.family]
    } else {
        vec![a.family, b.family]
    };
    renderers.dedup();
    if a.family != Family::Serial && !renderers.contains(&Family::Extra) {
        renderers.push(Family::Extra);
    }

    let step: i64 = if a.index <= b.index { 1 } else { -1 };
    let mut out = Vec::with_capacity(span as usize + 1);
    let mut index = a.index;
    loop {
        let rendered = renderers
            .iter()
            .find_map(|family| family.render(index))
            .ok_or_else(discontinuity)?;
        out.push(rendered);
        if index == b.index {
            break;
        }
        index += step;
    }
    Ok(out)
}

fn expand_item(item: &str) -> Result<Vec<String>, RangeError> {
    if !item.contains("..") {
        return Ok(vec![item.to_string()]);
    }

    let checkpoints: Vec<&str> = item.split("..").map(str::trim).collect();
    let mut out: Vec<String> = Vec::new();
    for pair in checkpoints.windows(2) {
        let mut expanded = expand_pair(pair[0], pair[1])?;
        if !out.is_empty() {
            expanded.remove(0);
        }
        out.extend(expanded);
    }
    Ok(out)
}

fn expand_span(body: &str) -> Result<Vec<String>, RangeError> {
    let mut out = Vec::new();
    for item in body.split(',').map(str::trim).filter(|i| !i.is_empty()) {
        out.extend(expand_item(item)?);
    }
    Ok(out)
}

/// Whether `input` contains a range span.
pub fn has_range(input: &str) -> bool {
    input.contains(OPEN)
}

/// Expand every `$[[ … ]]` span in `input`.
///
/// Strings without spans come back as a single-element vector.
pub fn expand_ranges(input: &str) -> Result<Vec<String>, RangeError> {
    if !has_range(input) {
        return Ok(vec![input.to_string()]);
    }

    let mut results = vec![String::new()];
    let mut rest = input;
    while let Some(start) = rest.find(OPEN) {
        let literal = &rest[..start];
        let after = &rest[start + OPEN.len()..];
        let Some(end) = after.find(CLOSE) else {
            return Err(RangeError::Unclosed {
                input: input.to_string(),
            });
        };

        let options = expand_span(&after[..end])?;
        if results.len().saturating_mul(options.len()) > MAX_EXPANSION {
            return Err(RangeError::TooLarge {
                input: input.to_string(),
            });
        }

        let mut next = Vec::with_capacity(results.len() * options.len());
        for prefix in &results {
            for option in &options {
                let mut s = String::with_capacity(prefix.len() + literal.len() + option.len());
                s.push_str(prefix);
                s.push_str(literal);
                s.push_str(option);
                next.push(s);
            }
        }
        results = next;
        rest = &after[end + CLOSE.len()..];
    }

    for s in &mut results {
        s.push_str(rest);
    }
    Ok(results)
}
