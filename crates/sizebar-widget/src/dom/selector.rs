//! The CSS selector subset used against storefront markup.
//!
//! Supported: type (`div`, `*`), `#id`, `.class`, attribute tests
//! (`[a]`, `[a=v]`, `[a*=v]`, `[a^=v]`, `[a$=v]`, values optionally quoted),
//! the descendant combinator (whitespace), and comma-separated lists.

use std::str::FromStr;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid selector \"{selector}\": {reason}")]
pub struct SelectorError {
    pub selector: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum AttrOp {
    Exists,
    Equals(String),
    Contains(String),
    Prefix(String),
    Suffix(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct AttrTest {
    pub(crate) name: String,
    pub(crate) op: AttrOp,
}

impl AttrTest {
    pub(crate) fn matches(&self, value: Option<&str>) -> bool {
        let Some(value) = value else {
            return false;
        };
        match &self.op {
            AttrOp::Exists => true,
            AttrOp::Equals(v) => value == v,
            AttrOp::Contains(v) => !v.is_empty() && value.contains(v.as_str()),
            AttrOp::Prefix(v) => !v.is_empty() && value.starts_with(v.as_str()),
            AttrOp::Suffix(v) => !v.is_empty() && value.ends_with(v.as_str()),
        }
    }
}

/// One compound selector such as `a.item-link[href*="/productos/"]`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Compound {
    pub(crate) tag: Option<String>,
    pub(crate) id: Option<String>,
    pub(crate) classes: Vec<String>,
    pub(crate) attrs: Vec<AttrTest>,
}

/// Compounds joined by descendant combinators, outermost first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    pub(crate) parts: Vec<Compound>,
}

/// A comma-separated selector group; matches if any member matches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorList {
    pub(crate) selectors: Vec<Selector>,
}

impl SelectorList {
    /// Parses `source`.
    ///
    /// # Errors
    ///
    /// Returns [`SelectorError`] for empty input, unbalanced brackets,
    /// unsupported combinators or empty names.
    pub fn parse(source: &str) -> Result<Self, SelectorError> {
        let fail = |reason: &str| SelectorError {
            selector: source.to_owned(),
            reason: reason.to_owned(),
        };

        let selectors = split_outside_brackets(source, |c| c == ',')
            .map_err(|r| fail(&r))?
            .into_iter()
            .map(|group| {
                let parts = split_outside_brackets(&group, char::is_whitespace)
                    .map_err(|r| fail(&r))?
                    .into_iter()
                    .filter(|p| !p.is_empty())
                    .map(|p| parse_compound(&p).map_err(|r| fail(&r)))
                    .collect::<Result<Vec<_>, _>>()?;
                if parts.is_empty() {
                    return Err(fail("empty selector in list"));
                }
                Ok(Selector { parts })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { selectors })
    }
}

impl FromStr for SelectorList {
    type Err = SelectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

fn split_outside_brackets(
    source: &str,
    is_separator: impl Fn(char) -> bool,
) -> Result<Vec<String>, String> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;

    for c in source.chars() {
        match (quote, c) {
            (Some(q), c) if c == q => {
                quote = None;
                current.push(c);
            }
            (Some(_), c) => current.push(c),
            (None, '"' | '\'') if depth > 0 => {
                quote = Some(c);
                current.push(c);
            }
            (None, '[') => {
                depth += 1;
                current.push(c);
            }
            (None, ']') => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| "unbalanced ']'".to_owned())?;
                current.push(c);
            }
            (None, '>' | '+' | '~') if depth == 0 => {
                return Err(format!("combinator '{c}' is not supported"));
            }
            (None, c) if depth == 0 && is_separator(c) => {
                out.push(std::mem::take(&mut current).trim().to_owned());
            }
            (None, c) => current.push(c),
        }
    }

    if depth != 0 || quote.is_some() {
        return Err("unterminated attribute selector".to_owned());
    }
    out.push(current.trim().to_owned());
    Ok(out)
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || c == '-' || c == '_'
}

fn take_name(chars: &[char], pos: &mut usize) -> Result<String, String> {
    let start = *pos;
    while *pos < chars.len() && is_name_char(chars[*pos]) {
        *pos += 1;
    }
    if start == *pos {
        return Err("expected a name".to_owned());
    }
    Ok(chars[start..*pos].iter().collect())
}

fn parse_compound(source: &str) -> Result<Compound, String> {
    let chars: Vec<char> = source.chars().collect();
    let mut pos = 0;
    let mut compound = Compound::default();

    if pos < chars.len() && chars[pos] == '*' {
        pos += 1;
    } else if pos < chars.len() && is_name_char(chars[pos]) {
        compound.tag = Some(take_name(&chars, &mut pos)?.to_ascii_lowercase());
    }

    while pos < chars.len() {
        match chars[pos] {
            '#' => {
                pos += 1;
                compound.id = Some(take_name(&chars, &mut pos)?);
            }
            '.' => {
                pos += 1;
                compound.classes.push(take_name(&chars, &mut pos)?);
            }
            '[' => {
                let end = closing_bracket(&chars, pos)
                    .ok_or_else(|| "unterminated attribute selector".to_owned())?;
                let inner: String = chars[pos + 1..end].iter().collect();
                compound.attrs.push(parse_attr(&inner)?);
                pos = end + 1;
            }
            other => return Err(format!("unexpected character '{other}'")),
        }
    }

    Ok(compound)
}

/// Index of the `]` closing the attribute test opened at `open`, skipping
/// brackets inside quoted values.
fn closing_bracket(chars: &[char], open: usize) -> Option<usize> {
    let mut quote: Option<char> = None;
    for (i, &c) in chars.iter().enumerate().skip(open + 1) {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (None, '"' | '\'') => quote = Some(c),
            (None, ']') => return Some(i),
            _ => {}
        }
    }
    None
}

fn parse_attr(inner: &str) -> Result<AttrTest, String> {
    // Names never contain '=', so the first one belongs to the operator even
    // when the quoted value holds more.
    let Some((head, value)) = inner.split_once('=') else {
        return Ok(AttrTest {
            name: attr_name(inner)?,
            op: AttrOp::Exists,
        });
    };

    let head = head.trim_end();
    let (name, build): (&str, fn(String) -> AttrOp) = if let Some(n) = head.strip_suffix('*') {
        (n, AttrOp::Contains)
    } else if let Some(n) = head.strip_suffix('^') {
        (n, AttrOp::Prefix)
    } else if let Some(n) = head.strip_suffix('$') {
        (n, AttrOp::Suffix)
    } else {
        (head, AttrOp::Equals)
    };

    let value = value.trim();
    let value = value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .or_else(|| value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')))
        .unwrap_or(value);
    Ok(AttrTest {
        name: attr_name(name)?,
        op: build(value.to_owned()),
    })
}

fn attr_name(raw: &str) -> Result<String, String> {
    let name = raw.trim();
    if name.is_empty() || !name.chars().all(is_name_char) {
        return Err(format!("invalid attribute name \"{name}\""));
    }
    Ok(name.to_ascii_lowercase())
}
