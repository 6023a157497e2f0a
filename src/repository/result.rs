use crate::statement::Statement;

/// Statements matched at call time.
///
/// The snapshot does not follow later writes. Release it with
/// [`RepositoryResult::close`] or by dropping it.
#[derive(Debug)]
pub struct RepositoryResult {
    statements: std::vec::IntoIter<Statement>,
    closed: bool,
}

impl RepositoryResult {
    pub(crate) fn new(statements: Vec<Statement>) -> Self {
        Self {
            statements: statements.into_iter(),
            closed: false,
        }
    }

    /// Statements not yet consumed
    pub fn remaining(&self) -> usize {
        self.statements.len()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Release the snapshot; iteration ends
    pub fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.statements = Vec::new().into_iter();
        }
    }
}

impl Iterator for RepositoryResult {
    type Item = Statement;

    fn next(&mut self) -> Option<Statement> {
        if self.closed {
            return None;
        }
        self.statements.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.statements.size_hint()
    }
}

impl ExactSizeIterator for RepositoryResult {}
