//! Filter parser and tokenizer.
//!
//! Grammar, loosest binding first:
//!
//! ```text
//! and-expr  := or-expr (("and")? or-expr)*
//! or-expr   := not-expr (("or" | "|") not-expr)*
//! not-expr  := ("not" | "!")* primary
//! primary   := "(" and-expr ")" | term
//! term      := word | phrase | key ":" (word | phrase)
//! ```

use logos::Logos;

use crate::error::{Result, TreeError};
use crate::types::{ItemId, ItemMode};

use super::expression::{FilterTerm, VisibilityFilter};

// ---------------------------------------------------------------------------
// Token types
// ---------------------------------------------------------------------------

#[derive(Logos, Debug, Clone, PartialEq, Eq)]
#[logos(skip r"[ \t\r\n\f]+")]
enum RawToken {
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("|")]
    Pipe,
    #[token("!")]
    Bang,
    #[regex(r#""([^"\\]|\\.)*""#, unquote)]
    Phrase(String),
    #[regex(r#"[^ \t\r\n\f()|!"]+"#, |lex| lex.slice().to_string())]
    Word(String),
}

fn unquote(lex: &mut logos::Lexer<RawToken>) -> String {
    let slice = lex.slice();
    let inner = &slice[1..slice.len() - 1];
    let mut phrase = String::with_capacity(inner.len());
    let mut escaped = false;
    for ch in inner.chars() {
        if escaped {
            phrase.push(ch);
            escaped = false;
        } else if ch == '\\' {
            escaped = true;
        } else {
            phrase.push(ch);
        }
    }
    phrase
}

#[derive(Debug, Clone)]
struct FilterToken {
    kind: FilterTokenKind,
    position: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum FilterTokenKind {
    Word(String),
    Phrase(String),
    LParen,
    RParen,
    Pipe,
    Bang,
    And,
    Or,
    Not,
}

// ---------------------------------------------------------------------------
// Filter parser
// ---------------------------------------------------------------------------

pub struct FilterParser {
    tokens: Vec<FilterToken>,
    index: usize,
}

impl FilterParser {
    /// Parses a textual filter. Blank input admits every row.
    pub fn parse(input: &str) -> Result<VisibilityFilter> {
        let tokens = tokenize_filter_input(input)?;
        if tokens.is_empty() {
            return Ok(VisibilityFilter::all());
        }

        let mut parser = Self { tokens, index: 0 };
        let expression = parser.parse_and_expression(false)?;
        if let Some(token) = parser.peek() {
            return Err(TreeError::FilterParse(format!(
                "unexpected token near byte {}",
                token.position
            )));
        }
        Ok(expression)
    }

    fn parse_and_expression(&mut self, in_group: bool) -> Result<VisibilityFilter> {
        let mut parts = Vec::new();

        while !self.is_end() && !(in_group && self.next_is(&FilterTokenKind::RParen)) {
            if self.consume(&FilterTokenKind::And) {
                continue;
            }
            parts.push(self.parse_or_expression()?);
        }

        Ok(parts
            .into_iter()
            .reduce(VisibilityFilter::and)
            .unwrap_or_else(VisibilityFilter::all))
    }

    fn parse_or_expression(&mut self) -> Result<VisibilityFilter> {
        let mut parts = vec![self.parse_not_expression()?];

        while self.consume_or_separator() {
            if self.is_end() {
                return Err(TreeError::FilterParse(
                    "expected filter term after 'or'".to_string(),
                ));
            }
            parts.push(self.parse_not_expression()?);
        }

        Ok(match parts.len() {
            1 => parts.remove(0),
            _ => VisibilityFilter::Or(parts),
        })
    }

    fn parse_not_expression(&mut self) -> Result<VisibilityFilter> {
        let mut negate = false;
        while self.consume(&FilterTokenKind::Bang) || self.consume(&FilterTokenKind::Not) {
            negate = !negate;
        }

        let expression = self.parse_primary_expression()?;
        if negate {
            Ok(VisibilityFilter::Not(Box::new(expression)))
        } else {
            Ok(expression)
        }
    }

    fn parse_primary_expression(&mut self) -> Result<VisibilityFilter> {
        let token = self.next().ok_or_else(|| {
            TreeError::FilterParse("expected filter term but reached end of input".to_string())
        })?;

        match token.kind {
            FilterTokenKind::LParen => self.parse_group(token.position),
            FilterTokenKind::Word(raw) => match raw.strip_suffix(':') {
                Some(name) if !name.is_empty() => match self.next_phrase() {
                    Some(phrase) => parse_named_term(name, &phrase, &raw),
                    None => parse_filter_word(&raw),
                },
                _ => parse_filter_word(&raw),
            },
            FilterTokenKind::Phrase(phrase) => Ok(VisibilityFilter::name_contains(&phrase)),
            _ => Err(TreeError::FilterParse(format!(
                "expected filter term near byte {}",
                token.position
            ))),
        }
    }

    fn parse_group(&mut self, opened_at: usize) -> Result<VisibilityFilter> {
        if self.next_is(&FilterTokenKind::RParen) {
            return Err(TreeError::FilterParse(format!(
                "empty group near byte {opened_at}"
            )));
        }
        let expression = self.parse_and_expression(true)?;
        if self.consume(&FilterTokenKind::RParen) {
            return Ok(expression);
        }
        Err(TreeError::FilterParse(format!(
            "missing closing ')' for group opened near byte {opened_at}"
        )))
    }

    fn consume(&mut self, kind: &FilterTokenKind) -> bool {
        self.next_is(kind) && {
            self.index += 1;
            true
        }
    }

    /// Takes a quoted phrase directly following a `key:` word.
    fn next_phrase(&mut self) -> Option<String> {
        let Some(FilterToken {
            kind: FilterTokenKind::Phrase(phrase),
            ..
        }) = self.peek()
        else {
            return None;
        };
        let phrase = phrase.clone();
        self.index += 1;
        Some(phrase)
    }

    fn consume_or_separator(&mut self) -> bool {
        self.consume(&FilterTokenKind::Pipe) || self.consume(&FilterTokenKind::Or)
    }

    fn next_is(&self, kind: &FilterTokenKind) -> bool {
        matches!(self.peek(), Some(token) if &token.kind == kind)
    }

    fn is_end(&self) -> bool {
        self.index >= self.tokens.len()
    }

    fn peek(&self) -> Option<&FilterToken> {
        self.tokens.get(self.index)
    }

    fn next(&mut self) -> Option<FilterToken> {
        let token = self.tokens.get(self.index).cloned()?;
        self.index += 1;
        Some(token)
    }
}

// ---------------------------------------------------------------------------
// Term parsing
// ---------------------------------------------------------------------------

fn parse_filter_word(raw: &str) -> Result<VisibilityFilter> {
    let Some((name, argument)) = raw.split_once(':').filter(|(name, _)| !name.is_empty()) else {
        return parse_bare_word(raw);
    };
    parse_named_term(name, argument.trim(), raw)
}

/// Parses `name:argument`. Unknown names fall back to a substring match on
/// the whole `raw` word.
fn parse_named_term(name: &str, argument: &str, raw: &str) -> Result<VisibilityFilter> {
    match name.to_ascii_lowercase().as_str() {
        "id" | "ids" => {
            let ids = split_list(argument)
                .map(|value| {
                    value.parse::<u64>().map(ItemId::new).map_err(|_| {
                        TreeError::FilterParse(format!("id: invalid item id {value:?}"))
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            if ids.is_empty() {
                return Err(TreeError::FilterParse(
                    "id: requires at least one item id".to_string(),
                ));
            }
            Ok(VisibilityFilter::term(FilterTerm::ItemIds(ids)))
        }
        "mode" => {
            let bits = parse_mode_bits(argument)?;
            if bits == 0 {
                return Err(TreeError::FilterParse(
                    "mode: requires at least one bit".to_string(),
                ));
            }
            Ok(VisibilityFilter::mode_any(ItemMode::from_raw(bits)))
        }
        "name" => {
            if argument.is_empty() {
                return Err(TreeError::FilterParse(
                    "name: requires a search value".to_string(),
                ));
            }
            Ok(VisibilityFilter::name_contains(argument))
        }
        "ext" => {
            let extensions = split_list(argument)
                .map(|value| value.trim_start_matches('.').to_ascii_lowercase())
                .filter(|value| !value.is_empty())
                .collect::<Vec<_>>();
            if extensions.is_empty() {
                return Err(TreeError::FilterParse(
                    "ext: requires at least one extension".to_string(),
                ));
            }
            Ok(VisibilityFilter::term(FilterTerm::Extension(extensions)))
        }
        _ => Ok(VisibilityFilter::name_contains(raw)),
    }
}

fn parse_bare_word(word: &str) -> Result<VisibilityFilter> {
    Ok(match word.to_ascii_lowercase().as_str() {
        "all" => VisibilityFilter::all(),
        "none" => VisibilityFilter::none(),
        "container" | "containers" => VisibilityFilter::mode_any(ItemMode::CONTAINER),
        "artifact" | "artifacts" => VisibilityFilter::mode_any(ItemMode::ARTIFACT),
        "replica" | "replicas" => VisibilityFilter::mode_any(ItemMode::REPLICA),
        "file" | "files" => VisibilityFilter::term(FilterTerm::PlainFile),
        "content" => VisibilityFilter::term(FilterTerm::HasContent),
        _ => VisibilityFilter::name_contains(word),
    })
}

fn split_list(argument: &str) -> impl Iterator<Item = &str> {
    argument
        .split(';')
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

fn parse_mode_bits(argument: &str) -> Result<u32> {
    let parsed = match argument
        .strip_prefix("0x")
        .or_else(|| argument.strip_prefix("0X"))
    {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => argument.parse::<u32>(),
    };
    parsed.map_err(|_| TreeError::FilterParse(format!("mode: invalid bits {argument:?}")))
}

// ---------------------------------------------------------------------------
// Tokenizer
// ---------------------------------------------------------------------------

fn tokenize_filter_input(input: &str) -> Result<Vec<FilterToken>> {
    let mut tokens = Vec::new();

    for (raw, span) in RawToken::lexer(input).spanned() {
        let position = span.start;
        let raw = raw.map_err(|_| {
            TreeError::FilterParse(format!("unexpected character near byte {position}"))
        })?;
        let kind = match raw {
            RawToken::LParen => FilterTokenKind::LParen,
            RawToken::RParen => FilterTokenKind::RParen,
            RawToken::Pipe => FilterTokenKind::Pipe,
            RawToken::Bang => FilterTokenKind::Bang,
            RawToken::Phrase(phrase) => FilterTokenKind::Phrase(phrase),
            RawToken::Word(word) => {
                if word.eq_ignore_ascii_case("and") {
                    FilterTokenKind::And
                } else if word.eq_ignore_ascii_case("or") {
                    FilterTokenKind::Or
                } else if word.eq_ignore_ascii_case("not") {
                    FilterTokenKind::Not
                } else {
                    FilterTokenKind::Word(word)
                }
            }
        };
        tokens.push(FilterToken { kind, position });
    }

    Ok(tokens)
}
