// src/dom/select.rs

//! CSS selector subset.
//!
//! Supported: selector lists (`a, b`), descendant and child (`>`)
//! combinators, type and universal selectors, `#id`, `.class`, attribute
//! selectors (`[attr]`, `=`, `~=`, `^=`, `$=`, `*=`) and the
//! `:first-child` / `:last-child` pseudo-classes.

use thiserror::Error;

use super::{Document, NodeId};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid selector '{selector}': {reason}")]
pub struct SelectorError {
    pub selector: String,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Combinator {
    Descendant,
    Child,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum AttrOp {
    Exists,
    Equals(String),
    Includes(String),
    Prefix(String),
    Suffix(String),
    Substring(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct AttrSelector {
    name: String,
    op: AttrOp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pseudo {
    FirstChild,
    LastChild,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Compound {
    tag: Option<String>,
    ids: Vec<String>,
    classes: Vec<String>,
    attrs: Vec<AttrSelector>,
    pseudos: Vec<Pseudo>,
}

/// One complex selector, stored left to right. `combinators[i]` joins
/// `parts[i]` and `parts[i + 1]`.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Complex {
    parts: Vec<Compound>,
    combinators: Vec<Combinator>,
}

/// A parsed, comma-separated selector list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorList {
    selectors: Vec<Complex>,
}

impl SelectorList {
    pub fn parse(input: &str) -> Result<Self, SelectorError> {
        let err = |reason: &str| SelectorError {
            selector: input.to_string(),
            reason: reason.to_string(),
        };

        let mut selectors = Vec::new();
        for piece in input.split(',') {
            let piece = piece.trim();
            if piece.is_empty() {
                return Err(err("empty selector"));
            }
            selectors.push(parse_complex(piece).map_err(|reason| err(&reason))?);
        }
        Ok(Self { selectors })
    }

    /// Whether element `node` matches any selector in the list.
    pub fn matches(&self, doc: &Document, node: NodeId) -> bool {
        doc.is_element(node)
            && self
                .selectors
                .iter()
                .any(|s| matches_from(doc, node, s, s.parts.len() - 1))
    }
}

fn parse_complex(input: &str) -> Result<Complex, String> {
    let chars: Vec<char> = input.chars().collect();
    let mut pos = 0;
    let mut parts = Vec::new();
    let mut combinators = Vec::new();

    loop {
        let compound = parse_compound(&chars, &mut pos)?;
        parts.push(compound);

        let had_space = skip_spaces(&chars, &mut pos);
        if pos >= chars.len() {
            break;
        }
        if chars[pos] == '>' {
            pos += 1;
            skip_spaces(&chars, &mut pos);
            combinators.push(Combinator::Child);
        } else if had_space {
            combinators.push(Combinator::Descendant);
        } else {
            return Err(format!("unexpected character '{}'", chars[pos]));
        }
        if pos >= chars.len() {
            return Err("dangling combinator".to_string());
        }
    }

    Ok(Complex { parts, combinators })
}

fn skip_spaces(chars: &[char], pos: &mut usize) -> bool {
    let start = *pos;
    while *pos < chars.len() && chars[*pos].is_whitespace() {
        *pos += 1;
    }
    *pos > start
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '-' || c == '_'
}

fn parse_ident(chars: &[char], pos: &mut usize) -> Result<String, String> {
    let start = *pos;
    while *pos < chars.len() && is_ident_char(chars[*pos]) {
        *pos += 1;
    }
    if *pos == start {
        return Err("expected identifier".to_string());
    }
    Ok(chars[start..*pos].iter().collect())
}

fn parse_compound(chars: &[char], pos: &mut usize) -> Result<Compound, String> {
    let mut compound = Compound::default();
    let start = *pos;

    if *pos < chars.len() && chars[*pos] == '*' {
        *pos += 1;
    } else if *pos < chars.len() && is_ident_char(chars[*pos]) {
        compound.tag = Some(parse_ident(chars, pos)?.to_ascii_lowercase());
    }

    while *pos < chars.len() {
        match chars[*pos] {
            '#' => {
                *pos += 1;
                compound.ids.push(parse_ident(chars, pos)?);
            }
            '.' => {
                *pos += 1;
                compound.classes.push(parse_ident(chars, pos)?);
            }
            '[' => {
                *pos += 1;
                compound.attrs.push(parse_attr(chars, pos)?);
            }
            ':' => {
                *pos += 1;
                let name = parse_ident(chars, pos)?;
                let pseudo = match name.to_ascii_lowercase().as_str() {
                    "first-child" => Pseudo::FirstChild,
                    "last-child" => Pseudo::LastChild,
                    other => return Err(format!("unsupported pseudo-class ':{other}'")),
                };
                compound.pseudos.push(pseudo);
            }
            _ => break,
        }
    }

    if *pos == start {
        return Err(match chars.get(*pos) {
            Some(c) => format!("unexpected character '{c}'"),
            None => "expected selector".to_string(),
        });
    }
    Ok(compound)
}

fn parse_attr(chars: &[char], pos: &mut usize) -> Result<AttrSelector, String> {
    skip_spaces(chars, pos);
    let name = parse_ident(chars, pos)?.to_ascii_lowercase();
    skip_spaces(chars, pos);

    let Some(&c) = chars.get(*pos) else {
        return Err("unterminated attribute selector".to_string());
    };
    if c == ']' {
        *pos += 1;
        return Ok(AttrSelector {
            name,
            op: AttrOp::Exists,
        });
    }

    let op_char = if c == '=' {
        None
    } else {
        *pos += 1;
        if chars.get(*pos) != Some(&'=') {
            return Err(format!("unsupported attribute operator '{c}'"));
        }
        Some(c)
    };
    *pos += 1;
    skip_spaces(chars, pos);

    let value = match chars.get(*pos) {
        Some(&q @ ('"' | '\'')) => {
            *pos += 1;
            let start = *pos;
            while *pos < chars.len() && chars[*pos] != q {
                *pos += 1;
            }
            if *pos >= chars.len() {
                return Err("unterminated string in attribute selector".to_string());
            }
            let v: String = chars[start..*pos].iter().collect();
            *pos += 1;
            v
        }
        _ => parse_ident(chars, pos)?,
    };

    skip_spaces(chars, pos);
    if chars.get(*pos) != Some(&']') {
        return Err("unterminated attribute selector".to_string());
    }
    *pos += 1;

    let op = match op_char {
        None => AttrOp::Equals(value),
        Some('~') => AttrOp::Includes(value),
        Some('^') => AttrOp::Prefix(value),
        Some('$') => AttrOp::Suffix(value),
        Some('*') => AttrOp::Substring(value),
        Some(other) => return Err(format!("unsupported attribute operator '{other}='")),
    };
    Ok(AttrSelector { name, op })
}

/// Match `complex.parts[..=idx]` with `parts[idx]` anchored at `node`.
fn matches_from(doc: &Document, node: NodeId, complex: &Complex, idx: usize) -> bool {
    if !matches_compound(doc, node, &complex.parts[idx]) {
        return false;
    }
    if idx == 0 {
        return true;
    }

    match complex.combinators[idx - 1] {
        Combinator::Child => doc
            .parent_element(node)
            .is_some_and(|p| matches_from(doc, p, complex, idx - 1)),
        Combinator::Descendant => {
            let mut ancestor = doc.parent_element(node);
            while let Some(a) = ancestor {
                if matches_from(doc, a, complex, idx - 1) {
                    return true;
                }
                ancestor = doc.parent_element(a);
            }
            false
        }
    }
}

fn matches_compound(doc: &Document, node: NodeId, compound: &Compound) -> bool {
    let Some(tag) = doc.tag_name(node) else {
        return false;
    };
    if compound.tag.as_deref().is_some_and(|t| t != tag) {
        return false;
    }
    if !compound
        .ids
        .iter()
        .all(|id| doc.attribute(node, "id") == Some(id.as_str()))
    {
        return false;
    }
    if !compound.classes.iter().all(|c| doc.has_class(node, c)) {
        return false;
    }
    if !compound.attrs.iter().all(|a| matches_attr(doc, node, a)) {
        return false;
    }
    compound.pseudos.iter().all(|p| {
        let siblings = doc
            .parent(node)
            .map(|parent| doc.element_children(parent))
            .unwrap_or_default();
        match p {
            Pseudo::FirstChild => siblings.first() == Some(&node),
            Pseudo::LastChild => siblings.last() == Some(&node),
        }
    })
}

fn matches_attr(doc: &Document, node: NodeId, sel: &AttrSelector) -> bool {
    let Some(value) = doc.attribute(node, &sel.name) else {
        return false;
    };
    match &sel.op {
        AttrOp::Exists => true,
        AttrOp::Equals(v) => value == v,
        AttrOp::Includes(v) => value.split_whitespace().any(|w| w == v),
        AttrOp::Prefix(v) => !v.is_empty() && value.starts_with(v.as_str()),
        AttrOp::Suffix(v) => !v.is_empty() && value.ends_with(v.as_str()),
        AttrOp::Substring(v) => !v.is_empty() && value.contains(v.as_str()),
    }
}
