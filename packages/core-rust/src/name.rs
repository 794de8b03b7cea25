//! Resource identity strings and identity patterns.
//!
//! A [`ResourceName`] is a domain plus an ordered list of `key=value` pairs,
//! written `domain:key=value,key2=value2`. Values that contain reserved
//! characters are written quoted (`key="a,b"`) with backslash escapes for
//! `"`, `*`, `?`, `\` and newline. [`ResourceName::canonical`] sorts the keys
//! and is the stable identity string used as a registry key and emitted in
//! documents.
//!
//! A [`NamePattern`] has the same shape but allows unescaped `*` (any run)
//! and `?` (exactly one character) in the domain and in values, plus a
//! trailing `*` entry meaning "other keys may be present".

use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use regex::Regex;

/// Characters that force a value to be written in quoted form.
const RESERVED_VALUE_CHARS: &[char] = &[',', '=', ':', '"', '*', '?', '\\', '\n'];

/// Characters never allowed in a key.
const RESERVED_KEY_CHARS: &[char] = &[',', '=', ':', '"', '*', '?', '\n'];

/// Errors raised while parsing or building identity strings.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NameError {
    #[error("identity string has no domain separator ':': {0:?}")]
    MissingDomainSeparator(String),
    #[error("identity string has an empty domain")]
    EmptyDomain,
    #[error("identity string has no key properties")]
    EmptyKeyList,
    #[error("key property without '=': {0:?}")]
    MissingEquals(String),
    #[error("invalid key {0:?}")]
    InvalidKey(String),
    #[error("duplicate key {0:?}")]
    DuplicateKey(String),
    #[error("invalid character {ch:?} in unquoted value of key {key:?}")]
    InvalidValueChar { key: String, ch: char },
    #[error("unterminated quoted value for key {0:?}")]
    UnterminatedQuote(String),
    #[error("invalid escape sequence '\\{0}' in quoted value")]
    InvalidEscape(char),
    #[error("wildcards are not allowed in a resource name: {0:?}")]
    WildcardInName(String),
    #[error("pattern {pattern:?} cannot be compiled: {reason}")]
    PatternTooComplex { pattern: String, reason: String },
}

// ---------------------------------------------------------------------------
// Parsing primitives
// ---------------------------------------------------------------------------

/// One parsed character of a value or domain, keeping wildcard information.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Piece {
    Char(char),
    AnyRun,
    AnyOne,
}

fn pieces_have_wildcards(pieces: &[Piece]) -> bool {
    pieces.iter().any(|p| !matches!(p, Piece::Char(_)))
}

fn pieces_to_string(pieces: &[Piece]) -> String {
    pieces
        .iter()
        .map(|p| match p {
            Piece::Char(c) => *c,
            Piece::AnyRun => '*',
            Piece::AnyOne => '?',
        })
        .collect()
}

/// Parses a domain: every `*`/`?` is a wildcard, everything else literal.
fn parse_domain(domain: &str) -> Vec<Piece> {
    domain
        .chars()
        .map(|c| match c {
            '*' => Piece::AnyRun,
            '?' => Piece::AnyOne,
            other => Piece::Char(other),
        })
        .collect()
}

/// Result of parsing the key list after the domain separator.
struct KeyList {
    keys: Vec<(String, Vec<Piece>)>,
    /// A trailing `*` entry was present.
    open: bool,
}

fn parse_key_list(src: &str) -> Result<KeyList, NameError> {
    let mut keys: Vec<(String, Vec<Piece>)> = Vec::new();
    let mut open = false;
    let mut chars = src.chars().peekable();

    loop {
        // Key (or the open-list marker).
        let mut key = String::new();
        while let Some(&c) = chars.peek() {
            if c == '=' || c == ',' {
                break;
            }
            key.push(c);
            chars.next();
        }

        if key == "*" && matches!(chars.peek(), None | Some(',')) {
            open = true;
        } else {
            if chars.next() != Some('=') {
                return Err(NameError::MissingEquals(key));
            }
            if key.is_empty() || key.contains(RESERVED_KEY_CHARS) {
                return Err(NameError::InvalidKey(key));
            }
            if keys.iter().any(|(k, _)| *k == key) {
                return Err(NameError::DuplicateKey(key));
            }

            let value = if chars.peek() == Some(&'"') {
                chars.next();
                parse_quoted(&mut chars, &key)?
            } else {
                parse_unquoted(&mut chars, &key)?
            };
            keys.push((key, value));
        }

        match chars.next() {
            None => break,
            Some(',') => {}
            Some(other) => {
                let key = keys.last().map(|(k, _)| k.clone()).unwrap_or_default();
                return Err(NameError::InvalidValueChar { key, ch: other });
            }
        }
    }

    if keys.is_empty() && !open {
        return Err(NameError::EmptyKeyList);
    }
    Ok(KeyList { keys, open })
}

fn parse_quoted(
    chars: &mut std::iter::Peekable<std::str::Chars<'_>>,
    key: &str,
) -> Result<Vec<Piece>, NameError> {
    let mut out = Vec::new();
    loop {
        match chars.next() {
            None => return Err(NameError::UnterminatedQuote(key.to_string())),
            Some('"') => return Ok(out),
            Some('\\') => match chars.next() {
                Some('"') => out.push(Piece::Char('"')),
                Some('*') => out.push(Piece::Char('*')),
                Some('?') => out.push(Piece::Char('?')),
                Some('\\') => out.push(Piece::Char('\\')),
                Some('n') => out.push(Piece::Char('\n')),
                Some(other) => return Err(NameError::InvalidEscape(other)),
                None => return Err(NameError::UnterminatedQuote(key.to_string())),
            },
            Some('*') => out.push(Piece::AnyRun),
            Some('?') => out.push(Piece::AnyOne),
            Some(c) => out.push(Piece::Char(c)),
        }
    }
}

fn parse_unquoted(
    chars: &mut std::iter::Peekable<std::str::Chars<'_>>,
    key: &str,
) -> Result<Vec<Piece>, NameError> {
    let mut out = Vec::new();
    while let Some(&c) = chars.peek() {
        match c {
            ',' => break,
            '*' => out.push(Piece::AnyRun),
            '?' => out.push(Piece::AnyOne),
            '=' | ':' | '"' | '\n' | '\\' => {
                return Err(NameError::InvalidValueChar {
                    key: key.to_string(),
                    ch: c,
                })
            }
            other => out.push(Piece::Char(other)),
        }
        chars.next();
    }
    Ok(out)
}

/// Writes a value in the form that parses back to the same value.
fn write_value(out: &mut String, value: &str) {
    if !value.is_empty() && !value.contains(RESERVED_VALUE_CHARS) {
        out.push_str(value);
        return;
    }
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '*' => out.push_str("\\*"),
            '?' => out.push_str("\\?"),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            other => out.push(other),
        }
    }
    out.push('"');
}

/// Returns `value` quoted and escaped when it contains reserved characters.
#[must_use]
pub fn quote_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    write_value(&mut out, value);
    out
}

// ---------------------------------------------------------------------------
// ResourceName
// ---------------------------------------------------------------------------

/// Structured identity of a managed resource.
///
/// Equality, hashing and ordering use the canonical form, so two names that
/// differ only in key order are the same identity.
#[derive(Debug, Clone)]
pub struct ResourceName {
    domain: String,
    keys: Vec<(String, String)>,
    canonical: String,
}

impl ResourceName {
    /// Builds a name from a domain and ordered key/value pairs.
    ///
    /// # Errors
    ///
    /// Returns `NameError` for an empty or wildcard domain, an empty key list,
    /// invalid or duplicate keys.
    pub fn new<D, K, V>(domain: D, keys: impl IntoIterator<Item = (K, V)>) -> Result<Self, NameError>
    where
        D: Into<String>,
        K: Into<String>,
        V: Into<String>,
    {
        let domain = domain.into();
        validate_domain(&domain)?;

        let mut pairs: Vec<(String, String)> = Vec::new();
        for (k, v) in keys {
            let key = k.into();
            if key.is_empty() || key.contains(RESERVED_KEY_CHARS) {
                return Err(NameError::InvalidKey(key));
            }
            if pairs.iter().any(|(existing, _)| *existing == key) {
                return Err(NameError::DuplicateKey(key));
            }
            pairs.push((key, v.into()));
        }
        if pairs.is_empty() {
            return Err(NameError::EmptyKeyList);
        }

        let canonical = canonical_string(&domain, &pairs);
        Ok(Self {
            domain,
            keys: pairs,
            canonical,
        })
    }

    /// Parses an identity string such as `app:type=Cache,name="a,b"`.
    ///
    /// # Errors
    ///
    /// Returns `NameError` if the string is malformed or contains wildcards.
    pub fn parse(s: &str) -> Result<Self, NameError> {
        let (domain, rest) = s
            .split_once(':')
            .ok_or_else(|| NameError::MissingDomainSeparator(s.to_string()))?;
        validate_domain(domain)?;

        let list = parse_key_list(rest)?;
        if list.open || list.keys.iter().any(|(_, v)| pieces_have_wildcards(v)) {
            return Err(NameError::WildcardInName(s.to_string()));
        }
        let keys = list
            .keys
            .into_iter()
            .map(|(k, v)| (k, pieces_to_string(&v)))
            .collect::<Vec<_>>();
        Self::new(domain, keys)
    }

    #[must_use]
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Key/value pairs in their original order.
    #[must_use]
    pub fn keys(&self) -> &[(String, String)] {
        &self.keys
    }

    /// Looks up the value of one key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.keys
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Stable identity string: domain, then keys sorted by name.
    #[must_use]
    pub fn canonical(&self) -> &str {
        &self.canonical
    }
}

fn validate_domain(domain: &str) -> Result<(), NameError> {
    if domain.is_empty() {
        return Err(NameError::EmptyDomain);
    }
    if domain.contains(['*', '?']) {
        return Err(NameError::WildcardInName(domain.to_string()));
    }
    if domain.contains([':', '\n']) {
        return Err(NameError::MissingDomainSeparator(domain.to_string()));
    }
    Ok(())
}

fn canonical_string(domain: &str, keys: &[(String, String)]) -> String {
    let mut sorted: Vec<&(String, String)> = keys.iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(&b.0));
    let mut out = String::from(domain);
    out.push(':');
    for (i, (k, v)) in sorted.into_iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push_str(k);
        out.push('=');
        write_value(&mut out, v);
    }
    out
}

impl fmt::Display for ResourceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::from(&self.domain);
        out.push(':');
        for (i, (k, v)) in self.keys.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            out.push_str(k);
            out.push('=');
            write_value(&mut out, v);
        }
        f.write_str(&out)
    }
}

impl FromStr for ResourceName {
    type Err = NameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl PartialEq for ResourceName {
    fn eq(&self, other: &Self) -> bool {
        self.canonical == other.canonical
    }
}

impl Eq for ResourceName {}

impl Hash for ResourceName {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.canonical.hash(state);
    }
}

impl PartialOrd for ResourceName {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ResourceName {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.canonical.cmp(&other.canonical)
    }
}

// ---------------------------------------------------------------------------
// Glob
// ---------------------------------------------------------------------------

/// Compiled wildcard expression: `*` matches any run, `?` one character.
#[derive(Debug, Clone)]
pub struct Glob {
    source: String,
    matcher: Matcher,
}

#[derive(Debug, Clone)]
enum Matcher {
    /// Only `*` wildcards.
    Any,
    /// No wildcards: equal to `source`.
    Literal,
    Regex(Regex),
}

impl Glob {
    /// Compiles a raw glob where every `*` and `?` is a wildcard.
    ///
    /// # Errors
    ///
    /// Returns `NameError::PatternTooComplex` when the wildcard expression
    /// exceeds the regex engine's size limits.
    pub fn new(pattern: &str) -> Result<Self, NameError> {
        Self::from_pieces(&parse_domain(pattern))
    }

    /// Glob matching every string.
    #[must_use]
    pub fn any() -> Self {
        Self {
            source: "*".to_string(),
            matcher: Matcher::Any,
        }
    }

    /// Glob matching exactly `text`, wildcard characters included.
    #[must_use]
    pub fn literal(text: &str) -> Self {
        Self {
            source: text.to_string(),
            matcher: Matcher::Literal,
        }
    }

    fn from_pieces(pieces: &[Piece]) -> Result<Self, NameError> {
        let source = pieces_to_string(pieces);
        if !pieces_have_wildcards(pieces) {
            return Ok(Self::literal(&source));
        }
        if pieces.iter().all(|p| *p == Piece::AnyRun) {
            return Ok(Self {
                source,
                matcher: Matcher::Any,
            });
        }

        let mut expr = String::from("^");
        let mut literal = String::new();
        for piece in pieces {
            match piece {
                Piece::Char(c) => literal.push(*c),
                Piece::AnyRun | Piece::AnyOne => {
                    expr.push_str(&regex::escape(&literal));
                    literal.clear();
                    expr.push_str(if *piece == Piece::AnyRun { "(?s:.*)" } else { "(?s:.)" });
                }
            }
        }
        expr.push_str(&regex::escape(&literal));
        expr.push('$');

        let regex = Regex::new(&expr).map_err(|err| NameError::PatternTooComplex {
            pattern: source.clone(),
            reason: err.to_string(),
        })?;
        Ok(Self {
            source,
            matcher: Matcher::Regex(regex),
        })
    }

    #[must_use]
    pub fn is_match(&self, text: &str) -> bool {
        match &self.matcher {
            Matcher::Any => true,
            Matcher::Literal => text == self.source,
            Matcher::Regex(regex) => regex.is_match(text),
        }
    }

    #[must_use]
    pub fn is_literal(&self) -> bool {
        matches!(self.matcher, Matcher::Literal)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.source
    }
}

// ---------------------------------------------------------------------------
// NamePattern
// ---------------------------------------------------------------------------

/// Pattern selecting zero or more resource names.
#[derive(Debug, Clone)]
pub struct NamePattern {
    source: String,
    domain: Glob,
    keys: Vec<(String, Glob)>,
    open: bool,
}

impl NamePattern {
    /// Parses a pattern. A bare `*` (or `*:*`) selects every name.
    ///
    /// # Errors
    ///
    /// Returns `NameError` when the key list is malformed.
    pub fn parse(s: &str) -> Result<Self, NameError> {
        let trimmed = s.trim();
        if trimmed == "*" {
            return Ok(Self::any());
        }
        let (domain, rest) = trimmed
            .split_once(':')
            .ok_or_else(|| NameError::MissingDomainSeparator(trimmed.to_string()))?;
        if domain.is_empty() {
            return Err(NameError::EmptyDomain);
        }
        let list = parse_key_list(rest)?;
        let keys = list
            .keys
            .iter()
            .map(|(k, v)| Ok((k.clone(), Glob::from_pieces(v)?)))
            .collect::<Result<_, NameError>>()?;
        Ok(Self {
            source: trimmed.to_string(),
            domain: Glob::from_pieces(&parse_domain(domain))?,
            keys,
            open: list.open,
        })
    }

    /// Pattern matching every name.
    #[must_use]
    pub fn any() -> Self {
        Self {
            source: "*:*".to_string(),
            domain: Glob::any(),
            keys: Vec::new(),
            open: true,
        }
    }

    #[must_use]
    pub fn matches(&self, name: &ResourceName) -> bool {
        if !self.domain.is_match(name.domain()) {
            return false;
        }
        if !self.open && self.keys.len() != name.keys().len() {
            return false;
        }
        self.keys
            .iter()
            .all(|(k, glob)| name.get(k).is_some_and(|v| glob.is_match(v)))
    }

    /// When the pattern can only ever match one name, returns that name.
    #[must_use]
    pub fn as_exact(&self) -> Option<ResourceName> {
        if self.open || !self.domain.is_literal() || self.keys.iter().any(|(_, g)| !g.is_literal()) {
            return None;
        }
        ResourceName::new(
            self.domain.as_str(),
            self.keys.iter().map(|(k, g)| (k.clone(), g.as_str().to_string())),
        )
        .ok()
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl From<&ResourceName> for NamePattern {
    fn from(name: &ResourceName) -> Self {
        let literal = Glob::literal;
        Self {
            source: name.canonical().to_string(),
            domain: literal(name.domain()),
            keys: name
                .keys()
                .iter()
                .map(|(k, v)| (k.clone(), literal(v)))
                .collect(),
            open: false,
        }
    }
}

impl fmt::Display for NamePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl FromStr for NamePattern {
    type Err = NameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
