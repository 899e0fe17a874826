//! Minimal S-expression reader shared by the netlist and board parsers.
//!
//! KiCad writes both `.net` exports and `.kicad_pcb` boards as nested lists
//! of bare symbols and double-quoted strings. Numbers are kept as atoms and
//! converted by the callers.

use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Unexpected end of input")]
    UnexpectedEof,
    #[error("Unexpected token at position {0}: {1}")]
    UnexpectedToken(usize, String),
    #[error("Trailing content at position {0}")]
    TrailingContent(usize),
}

#[derive(Debug, Clone, PartialEq)]
pub enum SExp {
    Atom(String),
    List(Vec<SExp>),
}

impl SExp {
    pub fn as_atom(&self) -> Option<&str> {
        match self {
            SExp::Atom(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[SExp]> {
        match self {
            SExp::List(items) => Some(items),
            _ => None,
        }
    }

    /// Head symbol of a list, e.g. `comp` for `(comp (ref R1) ...)`.
    pub fn tag(&self) -> Option<&str> {
        self.as_list()
            .and_then(|items| items.first())
            .and_then(|first| first.as_atom())
    }

    /// Atom at position `index` of a list (0 is the tag).
    pub fn atom_at(&self, index: usize) -> Option<&str> {
        self.as_list()
            .and_then(|items| items.get(index))
            .and_then(|item| item.as_atom())
    }

    /// First child list whose tag is `key`.
    pub fn child(&self, key: &str) -> Option<&SExp> {
        self.as_list()?
            .iter()
            .find(|item| item.tag() == Some(key))
    }

    /// All child lists whose tag is `key`, in document order.
    pub fn children<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a SExp> + 'a {
        self.as_list()
            .unwrap_or(&[])
            .iter()
            .filter(move |item| item.tag() == Some(key))
    }

    /// Value atom of `(key value)`, the common single-value property shape.
    pub fn value_of(&self, key: &str) -> Option<&str> {
        self.child(key).and_then(|c| c.atom_at(1))
    }

    /// Bare atoms following the tag, e.g. `smd`, `board_only` in `(attr smd board_only)`.
    pub fn flags(&self) -> Vec<&str> {
        self.as_list()
            .unwrap_or(&[])
            .iter()
            .skip(1)
            .filter_map(|item| item.as_atom())
            .collect()
    }
}

impl fmt::Display for SExp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SExp::Atom(s) => {
                if s.is_empty() || s.contains(|c: char| c.is_whitespace() || c == '(' || c == ')' || c == '"') {
                    write!(f, "\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
                } else {
                    write!(f, "{}", s)
                }
            }
            SExp::List(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, ")")
            }
        }
    }
}

pub struct SExpParser {
    input: Vec<char>,
    pos: usize,
}

impl SExpParser {
    pub fn new(input: &str) -> Self {
        Self {
            input: input.chars().collect(),
            pos: 0,
        }
    }

    /// Parse exactly one top-level expression; anything but whitespace after it is an error.
    pub fn parse(&mut self) -> Result<SExp, ParseError> {
        let root = self.parse_sexp()?;
        self.skip_whitespace();
        if !self.is_eof() {
            return Err(ParseError::TrailingContent(self.pos));
        }
        Ok(root)
    }

    fn parse_sexp(&mut self) -> Result<SExp, ParseError> {
        self.skip_whitespace();

        match self.peek() {
            None => Err(ParseError::UnexpectedEof),
            Some('(') => self.parse_list(),
            Some(')') => Err(ParseError::UnexpectedToken(self.pos, ")".to_string())),
            Some('"') => self.parse_string(),
            Some(_) => self.parse_symbol(),
        }
    }

    fn parse_list(&mut self) -> Result<SExp, ParseError> {
        self.advance();
        let mut items = Vec::new();

        loop {
            self.skip_whitespace();
            match self.peek() {
                None => return Err(ParseError::UnexpectedEof),
                Some(')') => {
                    self.advance();
                    return Ok(SExp::List(items));
                }
                Some(_) => items.push(self.parse_sexp()?),
            }
        }
    }

    fn parse_string(&mut self) -> Result<SExp, ParseError> {
        self.advance();
        let mut s = String::new();

        loop {
            let ch = self.peek().ok_or(ParseError::UnexpectedEof)?;
            self.advance();
            match ch {
                '"' => return Ok(SExp::Atom(s)),
                '\\' => {
                    let escaped = self.peek().ok_or(ParseError::UnexpectedEof)?;
                    self.advance();
                    s.push(match escaped {
                        'n' => '\n',
                        't' => '\t',
                        'r' => '\r',
                        other => other,
                    });
                }
                other => s.push(other),
            }
        }
    }

    fn parse_symbol(&mut self) -> Result<SExp, ParseError> {
        let start = self.pos;
        while let Some(ch) = self.peek() {
            if ch.is_whitespace() || ch == '(' || ch == ')' || ch == '"' {
                break;
            }
            self.advance();
        }
        Ok(SExp::Atom(self.input[start..self.pos].iter().collect()))
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.advance();
        }
    }

    fn is_eof(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn peek(&self) -> Option<char> {
        self.input.get(self.pos).copied()
    }

    fn advance(&mut self) {
        if self.pos < self.input.len() {
            self.pos += 1;
        }
    }
}

/// Parse a complete document.
pub fn parse_document(input: &str) -> Result<SExp, ParseError> {
    SExpParser::new(input).parse()
}
