//! Numeric status plus reason phrase carried by a [`Problem`](crate::Problem).

use std::borrow::Cow;
use std::fmt;

use http::StatusCode;

/// Status of a problem occurrence: a numeric code and its reason phrase.
///
/// Only the numeric code is rendered on the wire; the reason phrase is kept
/// for logs and for transports that print a status line.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Status {
    code: u16,
    reason: Cow<'static, str>,
}

impl Status {
    pub const BAD_REQUEST: Self = Self::from_static(400, "Bad Request");
    pub const UNAUTHORIZED: Self = Self::from_static(401, "Unauthorized");
    pub const FORBIDDEN: Self = Self::from_static(403, "Forbidden");
    pub const NOT_FOUND: Self = Self::from_static(404, "Not Found");
    pub const METHOD_NOT_ALLOWED: Self = Self::from_static(405, "Method Not Allowed");
    pub const NOT_ACCEPTABLE: Self = Self::from_static(406, "Not Acceptable");
    pub const CONFLICT: Self = Self::from_static(409, "Conflict");
    pub const UNSUPPORTED_MEDIA_TYPE: Self = Self::from_static(415, "Unsupported Media Type");
    pub const UNPROCESSABLE_ENTITY: Self = Self::from_static(422, "Unprocessable Entity");
    pub const INTERNAL_SERVER_ERROR: Self = Self::from_static(500, "Internal Server Error");
    pub const NOT_IMPLEMENTED: Self = Self::from_static(501, "Not Implemented");
    pub const SERVICE_UNAVAILABLE: Self = Self::from_static(503, "Service Unavailable");

    /// Status with a static reason phrase, usable in constants.
    #[must_use]
    pub const fn from_static(code: u16, reason: &'static str) -> Self {
        Self {
            code,
            reason: Cow::Borrowed(reason),
        }
    }

    #[must_use]
    pub fn new(code: u16, reason: impl Into<Cow<'static, str>>) -> Self {
        Self {
            code,
            reason: reason.into(),
        }
    }

    /// Status for a valid HTTP code, using the canonical reason phrase.
    ///
    /// Returns `None` for codes outside `100..=999`.
    #[must_use]
    pub fn from_code(code: u16) -> Option<Self> {
        StatusCode::from_u16(code)
            .ok()
            .map(|status| Self::from_static(code, status.canonical_reason().unwrap_or("")))
    }

    #[inline]
    #[must_use]
    pub const fn code(&self) -> u16 {
        self.code
    }

    #[inline]
    #[must_use]
    pub fn reason(&self) -> &str {
        &self.reason
    }

    /// The HTTP status code; codes that are not valid HTTP statuses map to 500.
    #[must_use]
    pub fn as_status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl From<StatusCode> for Status {
    fn from(status: StatusCode) -> Self {
        Self::from_static(status.as_u16(), status.canonical_reason().unwrap_or(""))
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.reason.is_empty() {
            write!(f, "{}", self.code)
        } else {
            write!(f, "{} {}", self.code, self.reason)
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn from_code_uses_canonical_reason() {
        let status = Status::from_code(404).unwrap();
        assert_eq!(status, Status::NOT_FOUND);
        assert_eq!(status.reason(), "Not Found");
    }

    #[test]
    fn from_code_rejects_out_of_range() {
        assert!(Status::from_code(42).is_none());
        assert!(Status::from_code(1000).is_none());
    }

    #[test]
    fn converts_from_http_status_code() {
        let status = Status::from(StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(status, Status::UNPROCESSABLE_ENTITY);
        assert_eq!(status.as_status_code(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn custom_reason_is_kept_but_code_drives_equality_of_http_status() {
        let status = Status::new(409, "Version Mismatch");
        assert_eq!(status.as_status_code(), StatusCode::CONFLICT);
        assert_ne!(status, Status::CONFLICT);
        assert_eq!(status.to_string(), "409 Version Mismatch");
    }
}
