//! Statements and statement patterns
//!
//! A statement is a (subject, predicate, object, context) quad. The context
//! is optional: `None` places the statement in the default graph.

use crate::term::{Iri, Resource, Value};
use serde::{Deserialize, Serialize};
use std::fmt;

/// An RDF statement. Immutable; updates are remove + add pairs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Statement {
    pub subject: Resource,
    pub predicate: Iri,
    pub object: Value,
    /// Named graph, `None` for the default graph
    pub context: Option<Resource>,
}

impl Statement {
    /// Create a statement in the default graph
    pub fn new(subject: Resource, predicate: Iri, object: impl Into<Value>) -> Self {
        Self {
            subject,
            predicate,
            object: object.into(),
            context: None,
        }
    }

    /// Create a statement in a named graph
    pub fn in_context(subject: Resource, predicate: Iri, object: impl Into<Value>, context: Resource) -> Self {
        Self {
            subject,
            predicate,
            object: object.into(),
            context: Some(context),
        }
    }

    /// Copy of this statement moved to another context
    pub fn with_context(&self, context: Option<Resource>) -> Self {
        Self {
            context,
            ..self.clone()
        }
    }

    /// Whether the object is a literal (and therefore full-text indexable)
    pub fn has_literal_object(&self) -> bool {
        matches!(self.object, Value::Literal(_))
    }

    /// Stable content key, used by the full-text index to address entries
    pub fn key(&self) -> String {
        blake3::hash(self.to_string().as_bytes()).to_hex().to_string()
    }
}

impl fmt::Display for Statement {
    /// N-Quads line (without trailing newline)
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.subject, self.predicate, self.object)?;
        if let Some(context) = &self.context {
            write!(f, " {}", context)?;
        }
        write!(f, " .")
    }
}

/// A statement pattern. `None` in a term position matches anything.
///
/// `contexts` restricts the graphs searched: empty means every graph, and a
/// `None` entry stands for the default graph.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pattern {
    pub subject: Option<Resource>,
    pub predicate: Option<Iri>,
    pub object: Option<Value>,
    pub contexts: Vec<Option<Resource>>,
}

impl Pattern {
    /// Pattern matching every statement
    pub fn any() -> Self {
        Self::default()
    }

    /// Pattern matching exactly one statement
    pub fn exact(statement: &Statement) -> Self {
        Self {
            subject: Some(statement.subject.clone()),
            predicate: Some(statement.predicate.clone()),
            object: Some(statement.object.clone()),
            contexts: vec![statement.context.clone()],
        }
    }

    pub fn subject(mut self, subject: Resource) -> Self {
        self.subject = Some(subject);
        self
    }

    pub fn predicate(mut self, predicate: Iri) -> Self {
        self.predicate = Some(predicate);
        self
    }

    pub fn object(mut self, object: impl Into<Value>) -> Self {
        self.object = Some(object.into());
        self
    }

    pub fn contexts(mut self, contexts: impl IntoIterator<Item = Option<Resource>>) -> Self {
        self.contexts = contexts.into_iter().collect();
        self
    }

    /// Whether every term position is bound to a single context
    pub fn is_exact(&self) -> bool {
        self.subject.is_some() && self.predicate.is_some() && self.object.is_some() && self.contexts.len() == 1
    }

    pub fn matches(&self, statement: &Statement) -> bool {
        self.subject.as_ref().is_none_or(|s| *s == statement.subject)
            && self.predicate.as_ref().is_none_or(|p| *p == statement.predicate)
            && self.object.as_ref().is_none_or(|o| *o == statement.object)
            && (self.contexts.is_empty() || self.contexts.contains(&statement.context))
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn slot<T: fmt::Display>(f: &mut fmt::Formatter<'_>, term: &Option<T>) -> fmt::Result {
            match term {
                Some(t) => write!(f, "{} ", t),
                None => write!(f, "* "),
            }
        }
        slot(f, &self.subject)?;
        slot(f, &self.predicate)?;
        slot(f, &self.object)?;
        if self.contexts.is_empty() {
            write!(f, "[*]")
        } else {
            let names: Vec<String> = self
                .contexts
                .iter()
                .map(|c| c.as_ref().map_or_else(|| "default".to_string(), |c| c.to_string()))
                .collect();
            write!(f, "[{}]", names.join(", "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::term::Literal;

    fn ex(local: &str) -> Iri {
        Iri::new(format!("http://example.org/{}", local)).unwrap()
    }

    fn sample(name: &str) -> Statement {
        Statement::new(ex("beet").into(), ex("name"), Literal::simple(name))
    }

    #[test]
    fn test_display_as_nquads() {
        let st = sample("Beta");
        assert_eq!(st.to_string(), "<http://example.org/beet> <http://example.org/name> \"Beta\" .");
        let quad = st.with_context(Some(ex("g").into()));
        assert!(quad.to_string().ends_with("<http://example.org/g> ."));
    }

    #[test]
    fn test_pattern_wildcards() {
        let st = sample("Beta");
        assert!(Pattern::any().matches(&st));
        assert!(Pattern::any().subject(ex("beet").into()).matches(&st));
        assert!(!Pattern::any().subject(ex("carrot").into()).matches(&st));
        assert!(Pattern::exact(&st).matches(&st));
        assert!(Pattern::exact(&st).is_exact());
    }

    #[test]
    fn test_pattern_contexts() {
        let default_graph = sample("Beta");
        let named = default_graph.with_context(Some(ex("g").into()));

        let only_default = Pattern::any().contexts([None]);
        assert!(only_default.matches(&default_graph));
        assert!(!only_default.matches(&named));

        let only_named = Pattern::any().contexts([Some(ex("g").into())]);
        assert!(only_named.matches(&named));
        assert!(!only_named.matches(&default_graph));
    }

    #[test]
    fn test_key_is_structural() {
        assert_eq!(sample("Beta").key(), sample("Beta").key());
        assert_ne!(sample("Beta").key(), sample("Beet").key());
    }
}
