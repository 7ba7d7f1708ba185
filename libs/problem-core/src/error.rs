//! Failure type that already carries a fully formed [`Problem`].

use std::fmt;

use crate::problem::Problem;

/// An error whose classification is known at the raise site.
///
/// Classification short-circuits on this type: the carried problem is used
/// as-is instead of consulting any handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProblemError {
    problem: Problem,
}

impl ProblemError {
    #[must_use]
    pub fn new(problem: Problem) -> Self {
        Self { problem }
    }

    #[must_use]
    pub fn problem(&self) -> &Problem {
        &self.problem
    }

    #[must_use]
    pub fn into_problem(self) -> Problem {
        self.problem
    }
}

impl fmt::Display for ProblemError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let p = &self.problem;
        match (p.detail(), p.title()) {
            (Some(detail), _) => f.write_str(detail),
            (None, Some(title)) => f.write_str(title),
            (None, None) => write!(f, "problem {} ({})", p.type_uri(), p.status_or_default()),
        }
    }
}

impl std::error::Error for ProblemError {}

impl From<Problem> for ProblemError {
    fn from(problem: Problem) -> Self {
        Self::new(problem)
    }
}

impl Problem {
    /// Wrap this problem into an error value that can be returned with `?`.
    pub fn into_error(self) -> ProblemError {
        ProblemError::new(self)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::catalog::security;

    #[test]
    fn message_prefers_detail_then_title() {
        let err = security::ACCESS_DENIED
            .with_title("Access denied")
            .with_detail("admin only")
            .into_error();
        assert_eq!(err.to_string(), "admin only");

        let err = security::ACCESS_DENIED.with_title("Access denied").into_error();
        assert_eq!(err.to_string(), "Access denied");
    }

    #[test]
    fn message_falls_back_to_type_and_status() {
        let err = ProblemError::from(security::ACCESS_DENIED);
        assert_eq!(err.to_string(), "problem access_denied (403 Forbidden)");
    }
}
