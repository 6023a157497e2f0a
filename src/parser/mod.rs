//! RDF parsing collaborators
//!
//! The repository only depends on [`RdfParser`]. Parsers are looked up by
//! [`RdfFormat`] in a [`ParserRegistry`]; the format comes from the caller,
//! from the file extension, or from sniffing the document.
//!
//! Only line-based formats ship with the crate. Turtle, RDF/XML and JSON-LD
//! are recognised so that callers get a precise error instead of a parse
//! failure deep inside the wrong grammar.

pub mod ntriples;

pub use ntriples::{NQuadsParser, NTriplesParser};

use std::fmt;
use std::io::{BufRead, Read};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};
use crate::statement::Statement;
use crate::term::{BlankNode, Iri, Resource, Value};
use crate::{Error, Result};

/// Statement lines inspected when sniffing a document
const SNIFF_LINES: usize = 64;

/// Serialization formats known to format detection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RdfFormat {
    NTriples,
    NQuads,
    Turtle,
    RdfXml,
    JsonLd,
}

impl RdfFormat {
    pub const ALL: [RdfFormat; 5] = [
        RdfFormat::NTriples,
        RdfFormat::NQuads,
        RdfFormat::Turtle,
        RdfFormat::RdfXml,
        RdfFormat::JsonLd,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            RdfFormat::NTriples => "N-Triples",
            RdfFormat::NQuads => "N-Quads",
            RdfFormat::Turtle => "Turtle",
            RdfFormat::RdfXml => "RDF/XML",
            RdfFormat::JsonLd => "JSON-LD",
        }
    }

    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            RdfFormat::NTriples => &["nt"],
            RdfFormat::NQuads => &["nq"],
            RdfFormat::Turtle => &["ttl"],
            RdfFormat::RdfXml => &["rdf", "rdfs", "owl", "xml"],
            RdfFormat::JsonLd => &["jsonld"],
        }
    }

    pub fn mime_types(&self) -> &'static [&'static str] {
        match self {
            RdfFormat::NTriples => &["application/n-triples", "text/plain"],
            RdfFormat::NQuads => &["application/n-quads", "text/x-nquads"],
            RdfFormat::Turtle => &["text/turtle", "application/x-turtle"],
            RdfFormat::RdfXml => &["application/rdf+xml", "application/xml"],
            RdfFormat::JsonLd => &["application/ld+json"],
        }
    }

    /// Format implied by a file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|format| format.extensions().contains(&ext.as_str()))
    }

    /// Format named by a MIME type; parameters such as `charset` are ignored
    pub fn from_mime_type(mime: &str) -> Option<Self> {
        let essence = mime.split(';').next()?.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|format| format.mime_types().contains(&essence.as_str()))
    }

    /// Format from a user-facing name such as `ntriples`, `N-Quads` or `ttl`
    pub fn from_name(name: &str) -> Option<Self> {
        let wanted: String = name
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        Self::ALL.into_iter().find(|format| {
            let canonical: String = format
                .name()
                .chars()
                .filter(|c| c.is_ascii_alphanumeric())
                .collect::<String>()
                .to_ascii_lowercase();
            canonical == wanted || format.extensions().contains(&wanted.as_str())
        })
    }

    /// Guess the format from the start of a document
    pub fn sniff(document: &str) -> Option<Self> {
        let head = document.trim_start_matches('\u{feff}').trim_start();
        if head.starts_with("<?xml") || head.starts_with("<rdf:RDF") {
            return Some(RdfFormat::RdfXml);
        }
        if head.starts_with('{') || head.starts_with('[') {
            return Some(RdfFormat::JsonLd);
        }

        let mut quads = false;
        let statements = head
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty() && !l.starts_with('#'))
            .take(SNIFF_LINES);
        for line in statements {
            match ntriples::term_count(line) {
                Some(3) => {}
                Some(4) => quads = true,
                _ => return Some(RdfFormat::Turtle),
            }
        }
        Some(if quads { RdfFormat::NQuads } else { RdfFormat::NTriples })
    }
}

impl fmt::Display for RdfFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A parser for one serialization format.
///
/// Parsing is all-or-nothing: any malformed statement fails the whole
/// document with [`Error::Format`].
pub trait RdfParser: Send + Sync {
    fn format(&self) -> RdfFormat;

    /// Parse a complete document; relative IRIs resolve against `base`
    fn parse(&self, document: &str, base: Option<&Iri>) -> Result<Vec<Statement>>;
}

/// Where statements are read from
pub enum Input<'a> {
    /// A file on disk; its extension hints the format
    File(&'a Path),
    /// A byte stream, decoded as UTF-8
    Bytes(Box<dyn Read + 'a>),
    /// A character stream
    Text(Box<dyn BufRead + 'a>),
}

impl<'a> Input<'a> {
    pub fn file(path: &'a Path) -> Self {
        Input::File(path)
    }

    pub fn bytes(reader: impl Read + 'a) -> Self {
        Input::Bytes(Box::new(reader))
    }

    pub fn text(reader: impl BufRead + 'a) -> Self {
        Input::Text(Box::new(reader))
    }

    /// Format implied by the input itself, if any
    pub fn format_hint(&self) -> Option<RdfFormat> {
        match self {
            Input::File(path) => RdfFormat::from_path(path),
            Input::Bytes(_) | Input::Text(_) => None,
        }
    }

    /// Short description for log and error messages
    pub fn describe(&self) -> String {
        match self {
            Input::File(path) => path.display().to_string(),
            Input::Bytes(_) => "byte stream".to_string(),
            Input::Text(_) => "character stream".to_string(),
        }
    }

    /// Read the whole document
    pub fn read_document(self) -> Result<String> {
        match self {
            Input::File(path) => decode_utf8(std::fs::read(path)?),
            Input::Bytes(mut reader) => {
                let mut bytes = Vec::new();
                reader.read_to_end(&mut bytes)?;
                decode_utf8(bytes)
            }
            Input::Text(mut reader) => {
                let mut text = String::new();
                reader.read_to_string(&mut text).map_err(|e| match e.kind() {
                    std::io::ErrorKind::InvalidData => Error::Format(format!("invalid character data: {}", e)),
                    _ => Error::Io(e),
                })?;
                match text.strip_prefix('\u{feff}') {
                    Some(stripped) => Ok(stripped.to_string()),
                    None => Ok(text),
                }
            }
        }
    }
}

impl fmt::Debug for Input<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Input({})", self.describe())
    }
}

fn decode_utf8(mut bytes: Vec<u8>) -> Result<String> {
    if bytes.starts_with(&[0xEF, 0xBB, 0xBF]) {
        bytes.drain(..3);
    }
    String::from_utf8(bytes).map_err(|e| Error::Format(format!("input is not valid UTF-8: {}", e)))
}

/// Registry of parsers, keyed by format.
///
/// Blank node labels are local to the document they appear in: every call
/// to [`ParserRegistry::parse`] gets its own nodes unless labels are
/// preserved.
#[derive(Default)]
pub struct ParserRegistry {
    parsers: Vec<Box<dyn RdfParser>>,
    preserve_blank_node_ids: bool,
}

impl ParserRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a parser, replacing any parser for the same format
    pub fn register(&mut self, parser: impl RdfParser + 'static) {
        self.parsers.retain(|p| p.format() != parser.format());
        self.parsers.push(Box::new(parser));
    }

    pub fn find(&self, format: RdfFormat) -> Option<&dyn RdfParser> {
        self.parsers
            .iter()
            .find(|p| p.format() == format)
            .map(|p| p.as_ref())
    }

    pub fn formats(&self) -> Vec<RdfFormat> {
        self.parsers.iter().map(|p| p.format()).collect()
    }

    /// Keep blank node labels exactly as written, shared across documents
    pub fn preserve_blank_node_ids(mut self, preserve: bool) -> Self {
        self.preserve_blank_node_ids = preserve;
        self
    }

    pub fn preserves_blank_node_ids(&self) -> bool {
        self.preserve_blank_node_ids
    }

    /// Read and parse `input` completely.
    ///
    /// The format is `format` when given, else the input's hint, else sniffed
    /// from the document.
    pub fn parse(&self, input: Input<'_>, base: Option<&Iri>, format: Option<RdfFormat>) -> Result<Vec<Statement>> {
        let source = input.describe();
        let hint = format.or_else(|| input.format_hint());
        let document = input.read_document()?;

        let format = hint
            .or_else(|| RdfFormat::sniff(&document))
            .ok_or_else(|| Error::Format(format!("cannot detect RDF format of {}", source)))?;
        let parser = self
            .find(format)
            .ok_or_else(|| Error::Format(format!("no parser registered for {} ({})", format, source)))?;

        let statements = parser.parse(&document, base).map_err(|e| match e {
            Error::Format(msg) => Error::Format(format!("{}: {}", source, msg)),
            other => other,
        })?;
        tracing::debug!("Parsed {} statements from {} as {}", statements.len(), source, format);

        if self.preserve_blank_node_ids {
            return Ok(statements);
        }
        scope_blank_nodes(statements, &document_scope())
    }
}

static DOCUMENTS: AtomicU64 = AtomicU64::new(0);

/// Suffix unique to one parse, also across processes sharing a store
fn document_scope() -> String {
    let seq = DOCUMENTS.fetch_add(1, Ordering::Relaxed);
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    let seed = format!("{}:{}:{}", std::process::id(), nanos, seq);
    blake3::hash(seed.as_bytes()).to_hex().as_str()[..12].to_string()
}

/// Rename every blank node to `<label>-<scope>`
fn scope_blank_nodes(statements: Vec<Statement>, scope: &str) -> Result<Vec<Statement>> {
    let scoped = |node: &BlankNode| BlankNode::new(format!("{}-{}", node.id(), scope));

    statements
        .into_iter()
        .map(|mut st| -> Result<Statement> {
            if let Resource::Blank(node) = &st.subject {
                st.subject = Resource::Blank(scoped(node)?);
            }
            if let Value::Blank(node) = &st.object {
                st.object = Value::Blank(scoped(node)?);
            }
            if let Some(Resource::Blank(node)) = &st.context {
                st.context = Some(Resource::Blank(scoped(node)?));
            }
            Ok(st)
        })
        .collect()
}

impl fmt::Debug for ParserRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParserRegistry")
            .field("formats", &self.formats())
            .field("preserve_blank_node_ids", &self.preserve_blank_node_ids)
            .finish()
    }
}

/// Registry with every built-in parser
pub fn default_registry() -> ParserRegistry {
    let mut registry = ParserRegistry::new();
    registry.register(NTriplesParser::new());
    registry.register(NQuadsParser::new());
    registry
}
