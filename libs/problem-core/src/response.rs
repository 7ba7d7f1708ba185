//! Mutable staging area for a problem on its way to the transport layer.

use std::borrow::Cow;

use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use serde::{Serialize, Serializer};
use serde_json::Value;

use crate::payload::{self, PayloadError};
use crate::problem::{Problem, Properties};
use crate::status::Status;

/// A problem plus the response headers accumulated while handling one failure.
///
/// Derivations replace the *current* problem; all getters read through to it,
/// so later stages observe earlier edits. [`problem`](Self::problem) keeps
/// the pristine original for stages that need the untouched values, such as
/// message lookups keyed on the original type.
#[derive(Debug, Clone)]
pub struct ResponseProblem {
    original: Problem,
    current: Problem,
    headers: HeaderMap,
}

impl ResponseProblem {
    /// Stage `problem`, keeping any extension data it already carries.
    #[must_use]
    pub fn with(problem: Problem) -> Self {
        Self {
            current: problem.clone(),
            original: problem,
            headers: HeaderMap::new(),
        }
    }

    fn derive(&mut self, f: impl FnOnce(Problem) -> Problem) -> &mut Self {
        let current = std::mem::take(&mut self.current);
        self.current = f(current);
        self
    }

    pub fn with_type(&mut self, type_uri: impl Into<Cow<'static, str>>) -> &mut Self {
        self.derive(|p| p.with_type(type_uri))
    }

    pub fn with_title(&mut self, title: impl Into<Cow<'static, str>>) -> &mut Self {
        self.derive(|p| p.with_title(title))
    }

    pub fn with_status(&mut self, status: impl Into<Status>) -> &mut Self {
        self.derive(|p| p.with_status(status))
    }

    pub fn with_detail(&mut self, detail: impl Into<Cow<'static, str>>) -> &mut Self {
        self.derive(|p| p.with_detail(detail))
    }

    /// # Errors
    /// Returns [`PayloadError`] when the payload is rejected; the staged
    /// problem is left unchanged in that case.
    pub fn with_payload<T>(&mut self, payload: &T) -> Result<&mut Self, PayloadError>
    where
        T: Serialize + ?Sized,
    {
        let object = payload::to_object(payload)?;
        Ok(self.derive(|p| p.with_payload_object(object)))
    }

    pub fn with_properties(&mut self, edit: impl FnOnce(&mut Properties)) -> &mut Self {
        self.derive(|p| p.with_properties(edit))
    }

    pub fn with_properties_map(&mut self, properties: Properties) -> &mut Self {
        self.derive(|p| p.with_properties_map(properties))
    }

    pub fn with_property(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.derive(|p| p.with_property(key, value))
    }

    /// Append a response header; existing values for `name` are kept.
    pub fn add_header(&mut self, name: HeaderName, value: HeaderValue) -> &mut Self {
        self.headers.append(name, value);
        self
    }

    pub fn with_headers(&mut self, edit: impl FnOnce(&mut HeaderMap)) -> &mut Self {
        edit(&mut self.headers);
        self
    }

    #[must_use]
    pub fn type_uri(&self) -> &str {
        self.current.type_uri()
    }

    #[must_use]
    pub fn title(&self) -> Option<&str> {
        self.current.title()
    }

    #[must_use]
    pub fn status(&self) -> Option<&Status> {
        self.current.status()
    }

    #[must_use]
    pub fn detail(&self) -> Option<&str> {
        self.current.detail()
    }

    #[must_use]
    pub fn payload(&self) -> Option<&Properties> {
        self.current.payload()
    }

    #[must_use]
    pub fn properties(&self) -> Option<&Properties> {
        self.current.properties()
    }

    /// The problem as originally staged, before any derivation.
    #[must_use]
    pub fn problem(&self) -> &Problem {
        &self.original
    }

    /// The problem with every derivation applied so far.
    #[must_use]
    pub fn current(&self) -> &Problem {
        &self.current
    }

    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Response status; 500 when the problem carries none.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        self.current.status_or_default().as_status_code()
    }

    /// Freeze into the final problem and headers.
    #[must_use]
    pub fn into_parts(self) -> (Problem, HeaderMap) {
        (self.current, self.headers)
    }

    pub fn into_problem(self) -> Problem {
        self.current
    }
}

impl From<Problem> for ResponseProblem {
    fn from(problem: Problem) -> Self {
        Self::with(problem)
    }
}

impl PartialEq for ResponseProblem {
    fn eq(&self, other: &Self) -> bool {
        self.current == other.current && self.headers == other.headers
    }
}

impl Serialize for ResponseProblem {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.current.serialize(serializer)
    }
}

/// Axum integration: staged headers are merged into the response.
#[cfg(feature = "axum")]
impl axum::response::IntoResponse for ResponseProblem {
    fn into_response(self) -> axum::response::Response {
        use axum::response::IntoResponse as _;

        let (problem, headers) = self.into_parts();
        let mut resp = problem.into_response();
        for (name, value) in &headers {
            resp.headers_mut().append(name.clone(), value.clone());
        }
        resp
    }
}
