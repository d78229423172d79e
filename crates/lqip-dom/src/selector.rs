//! Selector Matching
//!
//! The subset of CSS selectors used for element discovery: compound
//! selectors (`img`, `*`, `#id`, `.class`, `[attr]`, `[attr="v"]`) joined by
//! the descendant combinator, and comma-separated lists.

use crate::{DomError, DomTree, ElementData, NodeId};

/// Attribute condition inside `[...]`
#[derive(Debug, Clone, PartialEq, Eq)]
struct AttrMatch {
    name: String,
    value: Option<String>,
}

/// Compound selector (no combinators)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Compound {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attrs: Vec<AttrMatch>,
}

impl Compound {
    /// Check a single element against this compound
    pub fn matches(&self, element: &ElementData) -> bool {
        if let Some(tag) = &self.tag {
            if !element.tag.eq_ignore_ascii_case(tag) {
                return false;
            }
        }
        if let Some(id) = &self.id {
            if element.id() != Some(id.as_str()) {
                return false;
            }
        }
        if !self.classes.iter().all(|c| element.attrs.has_class(c)) {
            return false;
        }
        self.attrs.iter().all(|a| match (&a.value, element.attrs.get(&a.name)) {
            (_, None) => false,
            (None, Some(_)) => true,
            (Some(expected), Some(actual)) => expected == actual,
        })
    }
}

/// Parsed selector list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    /// Alternatives of the comma list; each is a descendant chain, outermost first
    alternatives: Vec<Vec<Compound>>,
}

impl Selector {
    pub fn parse(input: &str) -> Result<Self, DomError> {
        let invalid = |message: &str| DomError::InvalidSelector {
            selector: input.to_string(),
            message: message.to_string(),
        };

        let mut alternatives = Vec::new();
        for part in crate::style::split_top_level(input, ',') {
            let chars: Vec<char> = part.chars().collect();
            let mut pos = 0;
            let mut chain = Vec::new();
            loop {
                while pos < chars.len() && chars[pos].is_whitespace() {
                    pos += 1;
                }
                if pos >= chars.len() {
                    break;
                }
                chain.push(parse_compound(&chars, &mut pos).map_err(|m| invalid(m))?);
            }
            if chain.is_empty() {
                return Err(invalid("empty selector"));
            }
            alternatives.push(chain);
        }
        Ok(Self { alternatives })
    }

    /// Check whether `id` matches any alternative
    pub fn matches(&self, tree: &DomTree, id: NodeId) -> bool {
        self.alternatives.iter().any(|chain| chain_matches(chain, tree, id))
    }
}

fn chain_matches(chain: &[Compound], tree: &DomTree, id: NodeId) -> bool {
    let Some((last, outer)) = chain.split_last() else {
        return false;
    };
    if !tree.element(id).is_some_and(|e| last.matches(e)) {
        return false;
    }

    // Right-to-left: each outer compound must match some further ancestor
    let mut ancestors = tree.ancestors(id);
    outer.iter().rev().all(|compound| {
        ancestors
            .by_ref()
            .any(|a| tree.element(a).is_some_and(|e| compound.matches(e)))
    })
}

fn is_ident_char(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '-' || ch == '_'
}

fn parse_ident(chars: &[char], pos: &mut usize) -> Result<String, &'static str> {
    let start = *pos;
    while *pos < chars.len() && is_ident_char(chars[*pos]) {
        *pos += 1;
    }
    if *pos == start {
        return Err("expected identifier");
    }
    Ok(chars[start..*pos].iter().collect())
}

fn parse_compound(chars: &[char], pos: &mut usize) -> Result<Compound, &'static str> {
    let start = *pos;
    let mut compound = Compound::default();

    while *pos < chars.len() {
        match chars[*pos] {
            '*' if *pos == start => *pos += 1,
            '#' => {
                *pos += 1;
                compound.id = Some(parse_ident(chars, pos)?);
            }
            '.' => {
                *pos += 1;
                compound.classes.push(parse_ident(chars, pos)?);
            }
            '[' => {
                *pos += 1;
                compound.attrs.push(parse_attr(chars, pos)?);
            }
            ch if is_ident_char(ch) && *pos == start => {
                compound.tag = Some(parse_ident(chars, pos)?.to_ascii_lowercase());
            }
            ch if ch.is_whitespace() => break,
            _ => return Err("unsupported selector syntax"),
        }
    }
    Ok(compound)
}

fn parse_attr(chars: &[char], pos: &mut usize) -> Result<AttrMatch, &'static str> {
    let skip_ws = |pos: &mut usize| {
        while *pos < chars.len() && chars[*pos].is_whitespace() {
            *pos += 1;
        }
    };

    skip_ws(pos);
    let name = parse_ident(chars, pos)?.to_ascii_lowercase();
    skip_ws(pos);

    let value = match chars.get(*pos) {
        Some(']') => None,
        Some('=') => {
            *pos += 1;
            skip_ws(pos);
            let value = match chars.get(*pos) {
                Some(&q @ ('"' | '\'')) => {
                    *pos += 1;
                    let start = *pos;
                    while *pos < chars.len() && chars[*pos] != q {
                        *pos += 1;
                    }
                    if *pos >= chars.len() {
                        return Err("unterminated string");
                    }
                    let value: String = chars[start..*pos].iter().collect();
                    *pos += 1;
                    value
                }
                _ => parse_ident(chars, pos)?,
            };
            skip_ws(pos);
            Some(value)
        }
        _ => return Err("expected ']' or '='"),
    };

    if chars.get(*pos) != Some(&']') {
        return Err("expected ']'");
    }
    *pos += 1;
    Ok(AttrMatch { name, value })
}
