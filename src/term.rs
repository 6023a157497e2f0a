//! RDF terms - IRIs, blank nodes and literals
//!
//! The canonical text form of every term is its N-Triples syntax:
//! - `<http://example.org/beet>`
//! - `_:b0`
//! - `"Beta vulgaris"@la`, `"42"^^<http://www.w3.org/2001/XMLSchema#integer>`
//!
//! The same form is used as the storage encoding, so `parse(to_string(t)) == t`.

use crate::{Error, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

/// Well-known vocabulary IRIs
pub mod vocab {
    pub const XSD_STRING: &str = "http://www.w3.org/2001/XMLSchema#string";
    pub const XSD_INTEGER: &str = "http://www.w3.org/2001/XMLSchema#integer";
    pub const XSD_DECIMAL: &str = "http://www.w3.org/2001/XMLSchema#decimal";
    pub const RDF_LANG_STRING: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#langString";
    pub const RDF_TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";
    pub const RDFS_LABEL: &str = "http://www.w3.org/2000/01/rdf-schema#label";
    pub const RDFS_COMMENT: &str = "http://www.w3.org/2000/01/rdf-schema#comment";
}

fn scheme_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*:").expect("valid regex"))
}

fn language_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z]+(-[A-Za-z0-9]+)*$").expect("valid regex"))
}

// ========== IRI ==========

/// An absolute IRI
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Iri(String);

impl Iri {
    /// Create an IRI, validating that it is absolute and free of forbidden characters
    pub fn new(iri: impl Into<String>) -> Result<Self> {
        let iri = iri.into();
        if !scheme_regex().is_match(&iri) {
            return Err(Error::InvalidTerm(format!("IRI must be absolute: {}", iri)));
        }
        if let Some(c) = iri
            .chars()
            .find(|c| c.is_whitespace() || c.is_control() || "<>\"{}|^`\\".contains(*c))
        {
            return Err(Error::InvalidTerm(format!("IRI contains {:?}: {}", c, iri)));
        }
        Ok(Self(iri))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Resolve a possibly relative reference against this IRI as base.
    ///
    /// Covers the reference shapes found in practice: absolute, empty,
    /// fragment-only, network-path, absolute-path and relative-path.
    /// Dot segments are not normalized.
    pub fn resolve(&self, reference: &str) -> Result<Iri> {
        if scheme_regex().is_match(reference) {
            return Iri::new(reference);
        }

        let base = self.0.as_str();
        let without_fragment = base.split_once('#').map_or(base, |(b, _)| b);
        let (scheme, rest) = base.split_once(':').unwrap_or((base, ""));

        let resolved = if reference.is_empty() {
            without_fragment.to_string()
        } else if reference.starts_with('#') {
            format!("{}{}", without_fragment, reference)
        } else if reference.starts_with("//") {
            format!("{}:{}", scheme, reference)
        } else if reference.starts_with('/') {
            let authority_end = rest
                .strip_prefix("//")
                .and_then(|r| r.find('/').map(|i| i + 2))
                .unwrap_or(rest.len());
            format!("{}:{}{}", scheme, &rest[..authority_end], reference)
        } else {
            let without_query = without_fragment
                .split_once('?')
                .map_or(without_fragment, |(b, _)| b);
            match without_query.rfind('/') {
                Some(slash) if slash > scheme.len() + 2 => {
                    format!("{}{}", &without_query[..=slash], reference)
                }
                _ => format!("{}/{}", without_query, reference),
            }
        };

        Iri::new(resolved)
    }
}

impl fmt::Display for Iri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}>", self.0)
    }
}

// ========== Blank node ==========

/// A blank node, identified by a document-local label
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlankNode(String);

impl BlankNode {
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        let valid = !id.is_empty()
            && !id.ends_with('.')
            && id.chars().all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.'));
        if !valid {
            return Err(Error::InvalidTerm(format!("Invalid blank node label: {}", id)));
        }
        Ok(Self(id))
    }

    pub fn id(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BlankNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "_:{}", self.0)
    }
}

// ========== Literal ==========

/// An RDF literal with its datatype and optional language tag
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Literal {
    lexical: String,
    datatype: Iri,
    language: Option<String>,
}

impl Literal {
    /// Plain `xsd:string` literal
    pub fn simple(lexical: impl Into<String>) -> Self {
        Self {
            lexical: lexical.into(),
            datatype: Iri(vocab::XSD_STRING.to_string()),
            language: None,
        }
    }

    /// Language-tagged string; the tag is normalized to lowercase
    pub fn with_language(lexical: impl Into<String>, language: &str) -> Result<Self> {
        if !language_regex().is_match(language) {
            return Err(Error::InvalidTerm(format!("Invalid language tag: {}", language)));
        }
        Ok(Self {
            lexical: lexical.into(),
            datatype: Iri(vocab::RDF_LANG_STRING.to_string()),
            language: Some(language.to_ascii_lowercase()),
        })
    }

    pub fn typed(lexical: impl Into<String>, datatype: Iri) -> Self {
        Self {
            lexical: lexical.into(),
            datatype,
            language: None,
        }
    }

    pub fn lexical(&self) -> &str {
        &self.lexical
    }

    pub fn datatype(&self) -> &Iri {
        &self.datatype
    }

    pub fn language(&self) -> Option<&str> {
        self.language.as_deref()
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("\"")?;
        for c in self.lexical.chars() {
            match c {
                '"' => f.write_str("\\\"")?,
                '\\' => f.write_str("\\\\")?,
                '\n' => f.write_str("\\n")?,
                '\r' => f.write_str("\\r")?,
                '\t' => f.write_str("\\t")?,
                c => write!(f, "{}", c)?,
            }
        }
        f.write_str("\"")?;
        match &self.language {
            Some(lang) => write!(f, "@{}", lang),
            None if self.datatype.as_str() == vocab::XSD_STRING => Ok(()),
            None => write!(f, "^^{}", self.datatype),
        }
    }
}

// ========== Positions ==========

/// A term allowed in subject and context position
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Resource {
    Iri(Iri),
    Blank(BlankNode),
}

/// A term allowed in object position
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Value {
    Iri(Iri),
    Blank(BlankNode),
    Literal(Literal),
}

impl Resource {
    /// Convenience constructor for an IRI resource
    pub fn iri(iri: &str) -> Result<Self> {
        Ok(Resource::Iri(Iri::new(iri)?))
    }

    pub fn parse(text: &str) -> Result<Self> {
        match Value::parse(text)? {
            Value::Iri(i) => Ok(Resource::Iri(i)),
            Value::Blank(b) => Ok(Resource::Blank(b)),
            Value::Literal(_) => Err(Error::InvalidTerm(format!(
                "Literal not allowed as resource: {}",
                text
            ))),
        }
    }
}

impl Value {
    pub fn iri(iri: &str) -> Result<Self> {
        Ok(Value::Iri(Iri::new(iri)?))
    }

    pub fn literal(lexical: impl Into<String>) -> Self {
        Value::Literal(Literal::simple(lexical))
    }

    /// Parse exactly one term in N-Triples syntax
    pub fn parse(text: &str) -> Result<Self> {
        let (value, rest) = read_value(text.trim(), None)?;
        if !rest.trim().is_empty() {
            return Err(Error::InvalidTerm(format!("Trailing input after term: {}", text)));
        }
        Ok(value)
    }

    pub fn as_literal(&self) -> Option<&Literal> {
        match self {
            Value::Literal(l) => Some(l),
            _ => None,
        }
    }
}

impl From<Resource> for Value {
    fn from(r: Resource) -> Self {
        match r {
            Resource::Iri(i) => Value::Iri(i),
            Resource::Blank(b) => Value::Blank(b),
        }
    }
}

impl From<Iri> for Resource {
    fn from(i: Iri) -> Self {
        Resource::Iri(i)
    }
}

impl From<Iri> for Value {
    fn from(i: Iri) -> Self {
        Value::Iri(i)
    }
}

impl From<Literal> for Value {
    fn from(l: Literal) -> Self {
        Value::Literal(l)
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resource::Iri(i) => i.fmt(f),
            Resource::Blank(b) => b.fmt(f),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Iri(i) => i.fmt(f),
            Value::Blank(b) => b.fmt(f),
            Value::Literal(l) => l.fmt(f),
        }
    }
}

impl FromStr for Value {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl FromStr for Resource {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl FromStr for Iri {
    type Err = Error;

    /// Accepts both `<iri>` and bare `iri`
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        match s.strip_prefix('<').and_then(|r| r.strip_suffix('>')) {
            Some(inner) => Iri::new(inner),
            None => Iri::new(s),
        }
    }
}

macro_rules! serde_as_ntriples {
    ($ty:ty) => {
        impl Serialize for $ty {
            fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
            where
                S: serde::Serializer,
            {
                serializer.serialize_str(&self.to_string())
            }
        }

        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                let s = String::deserialize(deserializer)?;
                s.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

serde_as_ntriples!(Iri);
serde_as_ntriples!(Resource);
serde_as_ntriples!(Value);

// ========== Lexing ==========

/// Read one term from the start of `input`, returning it with the unread rest.
///
/// Relative IRIs are resolved against `base` when one is given.
pub(crate) fn read_value<'a>(input: &'a str, base: Option<&Iri>) -> Result<(Value, &'a str)> {
    if input.starts_with('<') {
        let (iri, rest) = read_iri(input, base)?;
        Ok((Value::Iri(iri), rest))
    } else if input.starts_with("_:") {
        let (node, rest) = read_blank(input)?;
        Ok((Value::Blank(node), rest))
    } else if input.starts_with('"') {
        let (literal, rest) = read_literal(input, base)?;
        Ok((Value::Literal(literal), rest))
    } else {
        let token: String = input.chars().take_while(|c| !c.is_whitespace()).collect();
        Err(Error::InvalidTerm(format!("Unexpected token: {}", token)))
    }
}

pub(crate) fn read_iri<'a>(input: &'a str, base: Option<&Iri>) -> Result<(Iri, &'a str)> {
    let body = input
        .strip_prefix('<')
        .ok_or_else(|| Error::InvalidTerm("IRI must start with '<'".to_string()))?;
    let end = body
        .find('>')
        .ok_or_else(|| Error::InvalidTerm("Unterminated IRI".to_string()))?;
    let raw = unescape(&body[..end], false)?;
    let iri = match base {
        Some(base) => base.resolve(&raw)?,
        None => Iri::new(raw)?,
    };
    Ok((iri, &body[end + 1..]))
}

fn read_blank(input: &str) -> Result<(BlankNode, &str)> {
    let body = &input[2..];
    let mut end = body
        .char_indices()
        .find(|(_, c)| !(c.is_alphanumeric() || matches!(c, '_' | '-' | '.')))
        .map_or(body.len(), |(i, _)| i);
    // A trailing '.' terminates the statement, not the label
    while end > 0 && body[..end].ends_with('.') {
        end -= 1;
    }
    Ok((BlankNode::new(&body[..end])?, &body[end..]))
}

fn read_literal<'a>(input: &'a str, base: Option<&Iri>) -> Result<(Literal, &'a str)> {
    let body = &input[1..];
    let mut escaped = false;
    let mut close = None;
    for (i, c) in body.char_indices() {
        if escaped {
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == '"' {
            close = Some(i);
            break;
        }
    }
    let close = close.ok_or_else(|| Error::InvalidTerm("Unterminated string literal".to_string()))?;
    let lexical = unescape(&body[..close], true)?;
    let rest = &body[close + 1..];

    if let Some(tagged) = rest.strip_prefix('@') {
        let end = tagged
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '-'))
            .unwrap_or(tagged.len());
        let literal = Literal::with_language(lexical, &tagged[..end])?;
        Ok((literal, &tagged[end..]))
    } else if let Some(typed) = rest.strip_prefix("^^") {
        let (datatype, rest) = read_iri(typed, base)?;
        Ok((Literal::typed(lexical, datatype), rest))
    } else {
        Ok((Literal::simple(lexical), rest))
    }
}

fn unescape(raw: &str, string_escapes: bool) -> Result<String> {
    if !raw.contains('\\') {
        return Ok(raw.to_string());
    }

    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        let escape = chars
            .next()
            .ok_or_else(|| Error::InvalidTerm("Dangling escape".to_string()))?;
        match escape {
            'u' | 'U' => {
                let len = if escape == 'u' { 4 } else { 8 };
                let hex: String = chars.by_ref().take(len).collect();
                let decoded = u32::from_str_radix(&hex, 16)
                    .ok()
                    .filter(|_| hex.len() == len)
                    .and_then(char::from_u32)
                    .ok_or_else(|| Error::InvalidTerm(format!("Invalid unicode escape: \\{}{}", escape, hex)))?;
                out.push(decoded);
            }
            't' if string_escapes => out.push('\t'),
            'b' if string_escapes => out.push('\u{8}'),
            'n' if string_escapes => out.push('\n'),
            'r' if string_escapes => out.push('\r'),
            'f' if string_escapes => out.push('\u{c}'),
            '"' | '\'' | '\\' if string_escapes => out.push(escape),
            other => return Err(Error::InvalidTerm(format!("Invalid escape: \\{}", other))),
        }
    }
    Ok(out)
}
