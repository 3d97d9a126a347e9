//! CSS selector subset used to locate widget markup.
//!
//! Supported grammar:
//!
//! ```text
//! selector  := complex ( "," complex )*
//! complex   := compound ( whitespace compound )*      # descendant combinator only
//! compound  := ( tag | "*" )? ( "#" id | "." class | "[" attr "]" | ":not(" compound ")" )*
//! attr      := name ( "=" ( quoted | bare ) )?
//! ```
//!
//! That covers every selector the widgets and the default configuration use
//! (`figure.figure`, `.caption .id`, `[data-progress="chapter"]`,
//! `button:not([disabled])`, ...). Anything else is a [`SelectorError`], so a
//! typo in a configured selector fails loudly at config validation instead of
//! silently matching nothing.

use crate::dom::{Document, NodeId};
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SelectorError {
    #[error("empty selector")]
    Empty,
    #[error("unexpected character {found:?} at {position} in selector {selector:?}")]
    Unexpected {
        selector: String,
        found: char,
        position: usize,
    },
    #[error("unterminated {what} in selector {selector:?}")]
    Unterminated { selector: String, what: &'static str },
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct AttrTest {
    name: String,
    value: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Compound {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attrs: Vec<AttrTest>,
    negations: Vec<Compound>,
}

impl Compound {
    fn is_empty(&self) -> bool {
        self.tag.is_none()
            && self.id.is_none()
            && self.classes.is_empty()
            && self.attrs.is_empty()
            && self.negations.is_empty()
    }

    fn matches(&self, doc: &Document, node: NodeId) -> bool {
        let Some(tag) = doc.tag(node) else {
            return false;
        };
        if self.tag.as_deref().is_some_and(|t| t != tag) {
            return false;
        }
        if let Some(id) = &self.id
            && doc.attr(node, "id") != Some(id.as_str())
        {
            return false;
        }
        if !self.classes.iter().all(|c| doc.has_class(node, c)) {
            return false;
        }
        let attrs_ok = self.attrs.iter().all(|test| match &test.value {
            Some(expected) => doc.attr(node, &test.name) == Some(expected.as_str()),
            None => doc.has_attr(node, &test.name),
        });
        attrs_ok && !self.negations.iter().any(|neg| neg.matches(doc, node))
    }
}

/// A parsed selector list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    source: String,
    alternatives: Vec<Vec<Compound>>,
}

impl Selector {
    pub fn parse(source: &str) -> Result<Self, SelectorError> {
        let mut alternatives = Vec::new();
        for part in source.split(',') {
            let part = part.trim();
            if part.is_empty() {
                return Err(SelectorError::Empty);
            }
            let mut chain = Vec::new();
            for word in part.split_whitespace() {
                chain.push(Parser::new(source, word).compound()?);
            }
            alternatives.push(chain);
        }
        Ok(Self {
            source: source.to_string(),
            alternatives,
        })
    }

    /// Whether `node` matches any alternative of this selector.
    pub fn matches(&self, doc: &Document, node: NodeId) -> bool {
        self.alternatives
            .iter()
            .any(|chain| chain_matches(chain, doc, node))
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Match the rightmost compound against `node`, then walk up the ancestors
/// for the rest. Greedy matching is exact for descendant-only chains.
fn chain_matches(chain: &[Compound], doc: &Document, node: NodeId) -> bool {
    let Some((last, rest)) = chain.split_last() else {
        return false;
    };
    if !last.matches(doc, node) {
        return false;
    }
    let mut pending = rest.iter().rev().peekable();
    for ancestor in doc.ancestors(node) {
        match pending.peek() {
            Some(compound) if compound.matches(doc, ancestor) => {
                pending.next();
            }
            Some(_) => {}
            None => break,
        }
    }
    pending.peek().is_none()
}

struct Parser<'a> {
    selector: &'a str,
    chars: Vec<char>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(selector: &'a str, word: &str) -> Self {
        Self {
            selector,
            chars: word.chars().collect(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn unexpected(&self, found: char) -> SelectorError {
        SelectorError::Unexpected {
            selector: self.selector.to_string(),
            found,
            position: self.pos,
        }
    }

    fn unterminated(&self, what: &'static str) -> SelectorError {
        SelectorError::Unterminated {
            selector: self.selector.to_string(),
            what,
        }
    }

    fn ident(&mut self) -> String {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_alphanumeric() || c == '-' || c == '_')
        {
            self.pos += 1;
        }
        self.chars[start..self.pos].iter().collect()
    }

    fn compound(&mut self) -> Result<Compound, SelectorError> {
        let compound = self.compound_until(None)?;
        if let Some(c) = self.peek() {
            return Err(self.unexpected(c));
        }
        Ok(compound)
    }

    fn compound_until(&mut self, stop: Option<char>) -> Result<Compound, SelectorError> {
        let mut compound = Compound::default();
        let mut universal = false;
        if self.peek() == Some('*') {
            self.pos += 1;
            universal = true;
        } else if self.peek().is_some_and(|c| c.is_alphabetic()) {
            compound.tag = Some(self.ident().to_ascii_lowercase());
        }
        while let Some(c) = self.peek() {
            if Some(c) == stop {
                break;
            }
            match c {
                '#' => {
                    self.pos += 1;
                    compound.id = Some(self.non_empty_ident()?);
                }
                '.' => {
                    self.pos += 1;
                    compound.classes.push(self.non_empty_ident()?);
                }
                '[' => {
                    self.pos += 1;
                    compound.attrs.push(self.attr_test()?);
                }
                ':' => {
                    self.pos += 1;
                    let name = self.ident();
                    if name != "not" || self.peek() != Some('(') {
                        return Err(self.unexpected(':'));
                    }
                    self.pos += 1;
                    let inner = self.compound_until(Some(')'))?;
                    if self.peek() != Some(')') {
                        return Err(self.unterminated(":not()"));
                    }
                    self.pos += 1;
                    compound.negations.push(inner);
                }
                other => return Err(self.unexpected(other)),
            }
        }
        if compound.is_empty() && !universal {
            return Err(SelectorError::Empty);
        }
        Ok(compound)
    }

    fn non_empty_ident(&mut self) -> Result<String, SelectorError> {
        let ident = self.ident();
        if ident.is_empty() {
            return Err(match self.peek() {
                Some(c) => self.unexpected(c),
                None => self.unterminated("name"),
            });
        }
        Ok(ident)
    }

    fn attr_test(&mut self) -> Result<AttrTest, SelectorError> {
        let name = self.non_empty_ident()?.to_ascii_lowercase();
        match self.peek() {
            Some(']') => {
                self.pos += 1;
                Ok(AttrTest { name, value: None })
            }
            Some('=') => {
                self.pos += 1;
                let value = match self.peek() {
                    Some(quote @ ('"' | '\'')) => {
                        self.pos += 1;
                        let start = self.pos;
                        while self.peek().is_some_and(|c| c != quote) {
                            self.pos += 1;
                        }
                        if self.peek().is_none() {
                            return Err(self.unterminated("string"));
                        }
                        let value: String = self.chars[start..self.pos].iter().collect();
                        self.pos += 1;
                        value
                    }
                    _ => self.ident(),
                };
                if self.peek() != Some(']') {
                    return Err(self.unterminated("attribute selector"));
                }
                self.pos += 1;
                Ok(AttrTest {
                    name,
                    value: Some(value),
                })
            }
            Some(c) => Err(self.unexpected(c)),
            None => Err(self.unterminated("attribute selector")),
        }
    }
}
