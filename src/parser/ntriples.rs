//! Line-based N-Triples and N-Quads parsers

use super::{RdfFormat, RdfParser};
use crate::statement::Statement;
use crate::term::{read_iri, read_value, Iri, Resource, Value};
use crate::{Error, Result};

/// N-Triples parser: one `subject predicate object .` per line
#[derive(Debug, Clone, Default)]
pub struct NTriplesParser;

impl NTriplesParser {
    pub fn new() -> Self {
        Self
    }
}

impl RdfParser for NTriplesParser {
    fn format(&self) -> RdfFormat {
        RdfFormat::NTriples
    }

    fn parse(&self, document: &str, base: Option<&Iri>) -> Result<Vec<Statement>> {
        parse_document(document, base, false)
    }
}

/// N-Quads parser: N-Triples with an optional fourth context term
#[derive(Debug, Clone, Default)]
pub struct NQuadsParser;

impl NQuadsParser {
    pub fn new() -> Self {
        Self
    }
}

impl RdfParser for NQuadsParser {
    fn format(&self) -> RdfFormat {
        RdfFormat::NQuads
    }

    fn parse(&self, document: &str, base: Option<&Iri>) -> Result<Vec<Statement>> {
        parse_document(document, base, true)
    }
}

fn parse_document(document: &str, base: Option<&Iri>, quads: bool) -> Result<Vec<Statement>> {
    let mut statements = Vec::new();
    for (idx, line) in document.lines().enumerate() {
        let parsed = parse_line(line, base, quads)
            .map_err(|e| Error::Format(format!("line {}: {}", idx + 1, detail(e))))?;
        if let Some(statement) = parsed {
            statements.push(statement);
        }
    }
    Ok(statements)
}

fn detail(err: Error) -> String {
    match err {
        Error::InvalidTerm(msg) | Error::Format(msg) => msg,
        other => other.to_string(),
    }
}

/// Parse one line; `None` for blank and comment lines
fn parse_line(line: &str, base: Option<&Iri>, quads: bool) -> Result<Option<Statement>> {
    let rest = line.trim_start();
    if rest.is_empty() || rest.starts_with('#') {
        return Ok(None);
    }

    let (subject, rest) = read_value(rest, base)?;
    let subject = as_resource(subject, "subject")?;
    let (predicate, rest) = read_iri(rest.trim_start(), base)
        .map_err(|e| Error::Format(format!("predicate: {}", detail(e))))?;
    let (object, rest) = read_value(rest.trim_start(), base)?;

    let mut rest = rest.trim_start();
    let mut context = None;
    if !rest.starts_with('.') {
        if !quads {
            return Err(Error::Format(format!("expected '.' but found {:?}", truncate(rest))));
        }
        let (graph, after) = read_value(rest, base)?;
        context = Some(as_resource(graph, "context")?);
        rest = after.trim_start();
    }

    let tail = rest
        .strip_prefix('.')
        .ok_or_else(|| Error::Format("statement must end with '.'".to_string()))?
        .trim();
    if !(tail.is_empty() || tail.starts_with('#')) {
        return Err(Error::Format(format!("unexpected input after '.': {:?}", truncate(tail))));
    }

    Ok(Some(Statement {
        subject,
        predicate,
        object,
        context,
    }))
}

fn as_resource(value: Value, position: &str) -> Result<Resource> {
    match value {
        Value::Iri(iri) => Ok(Resource::Iri(iri)),
        Value::Blank(node) => Ok(Resource::Blank(node)),
        Value::Literal(literal) => Err(Error::Format(format!(
            "literal {} not allowed as {}",
            literal, position
        ))),
    }
}

fn truncate(text: &str) -> String {
    text.chars().take(40).collect()
}

/// Number of terms on a statement line, if it lexes
pub(crate) fn term_count(line: &str) -> Option<usize> {
    let mut rest = line.trim();
    let mut count = 0;
    while !rest.is_empty() && !rest.starts_with('.') {
        let (_, after) = read_value(rest, None).ok()?;
        rest = after.trim_start();
        count += 1;
    }
    Some(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::term::Literal;

    fn ex(local: &str) -> Iri {
        Iri::new(format!("http://example.org/{}", local)).unwrap()
    }

    #[test]
    fn test_parse_triples_with_comments() {
        let doc = r#"
# beets
<http://example.org/beet> <http://example.org/name> "Beet"@en .
_:b1 <http://example.org/weight> "12"^^<http://www.w3.org/2001/XMLSchema#integer> . # grams

<http://example.org/beet> <http://example.org/related> _:b1.
"#;
        let statements = NTriplesParser::new().parse(doc, None).unwrap();
        assert_eq!(statements.len(), 3);
        assert_eq!(
            statements[0],
            Statement::new(ex("beet").into(), ex("name"), Literal::with_language("Beet", "en").unwrap())
        );
        assert_eq!(statements[1].subject.to_string(), "_:b1");
        assert_eq!(statements[2].object.to_string(), "_:b1");
        assert!(statements.iter().all(|s| s.context.is_none()));
    }

    #[test]
    fn test_parse_quads() {
        let doc = "<http://example.org/s> <http://example.org/p> \"o\" <http://example.org/g> .\n\
                   <http://example.org/s> <http://example.org/p> \"o\" .\n";
        let statements = NQuadsParser::new().parse(doc, None).unwrap();
        assert_eq!(statements[0].context, Some(ex("g").into()));
        assert_eq!(statements[1].context, None);

        let err = NTriplesParser::new().parse(doc, None).unwrap_err();
        assert!(matches!(err, Error::Format(ref msg) if msg.starts_with("line 1")));
    }

    #[test]
    fn test_errors_carry_line_numbers() {
        let doc = "<http://example.org/s> <http://example.org/p> \"ok\" .\n\
                   \"lit\" <http://example.org/p> \"o\" .\n";
        let err = NTriplesParser::new().parse(doc, None).unwrap_err();
        assert!(matches!(err, Error::Format(ref msg) if msg.starts_with("line 2")));

        for bad in [
            "<http://example.org/s> <http://example.org/p> \"o\"",
            "<http://example.org/s> \"p\" \"o\" .",
            "<http://example.org/s> <http://example.org/p> \"o\" . junk",
            "<http://example.org/s> <http://example.org/p> \"unterminated .",
        ] {
            assert!(matches!(NTriplesParser::new().parse(bad, None), Err(Error::Format(_))), "{}", bad);
        }
    }

    #[test]
    fn test_relative_iris_need_base() {
        let doc = "<beet> <http://example.org/p> <#root> .";
        assert!(NTriplesParser::new().parse(doc, None).is_err());

        let base = ex("plants/");
        let statements = NTriplesParser::new().parse(doc, Some(&base)).unwrap();
        assert_eq!(statements[0].subject, Resource::Iri(ex("plants/beet")));
        assert_eq!(statements[0].object, Value::Iri(ex("plants/#root")));
    }

    #[test]
    fn test_term_count() {
        assert_eq!(term_count("<http://a.org/s> <http://a.org/p> \"o\" ."), Some(3));
        assert_eq!(term_count("<http://a.org/s> <http://a.org/p> \"o\" <http://a.org/g> ."), Some(4));
        assert_eq!(term_count("ex:s ex:p ex:o ."), None);
    }
}
