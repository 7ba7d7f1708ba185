//! Canonical problem catalog.
//!
//! Each entry is a compile-time [`Problem`] constant carrying a type and a
//! status only; titles and details are attached per occurrence, either by
//! the handler (`with_detail`) or by a message catalog customizer.

use crate::problem::Problem;
use crate::status::Status;

pub mod general {
    use super::{Problem, Status};

    pub const ILLEGAL_ARGUMENT: Problem = Problem::bad_request("illegal_argument");
    pub const INTERNAL_SERVER_ERROR: Problem =
        Problem::create(Status::INTERNAL_SERVER_ERROR, "internal_server_error");
    pub const UNSUPPORTED_OPERATION: Problem = Problem::not_implemented("unsupported_operation");
}

pub mod web {
    use super::{Problem, Status};

    pub const METHOD_NOT_ALLOWED: Problem =
        Problem::create(Status::METHOD_NOT_ALLOWED, "method_not_allowed");
    pub const NOT_ACCEPTABLE: Problem = Problem::create(Status::NOT_ACCEPTABLE, "not_acceptable");
    pub const BAD_REQUEST: Problem = Problem::bad_request("bad_request");
    pub const UNSUPPORTED_MEDIA_TYPE: Problem =
        Problem::create(Status::UNSUPPORTED_MEDIA_TYPE, "unsupported_media_type");
}

pub mod security {
    use super::Problem;

    pub const ACCESS_DENIED: Problem = Problem::forbidden("access_denied");
    pub const UNAUTHORIZED: Problem = Problem::unauthorized("unauthorized");
    pub const ACCOUNT_EXPIRED: Problem = Problem::unauthorized("account_expired");
    pub const CREDENTIALS_EXPIRED: Problem = Problem::unauthorized("credentials_expired");
    pub const ACCOUNT_LOCKED: Problem = Problem::unauthorized("account_locked");
    pub const USERNAME_NOT_FOUND: Problem = Problem::unauthorized("username_not_found");
}

pub mod request {
    use super::Problem;

    pub const MISSING_REQUEST_VALUE: Problem = Problem::bad_request("missing_request_value");
    pub const MISSING_REQUEST_PART: Problem = Problem::bad_request("missing_request_part");
    pub const NO_HANDLER_FOUND: Problem = Problem::not_found("no_handler_found");
    pub const REQUEST_BINDING: Problem = Problem::bad_request("request_binding");
}

pub mod validation {
    use super::Problem;

    pub const CONSTRAINT_VIOLATION: Problem = Problem::bad_request("constraint_violation");
    pub const VALIDATION_FAILED: Problem = Problem::bad_request("validation_failed");
}

pub mod parameters {
    use super::Problem;

    pub const MISSING_PARAMETER: Problem = Problem::bad_request("missing_parameter");
}

/// Every catalog entry, in declaration order.
#[must_use]
pub fn all() -> Vec<Problem> {
    vec![
        general::ILLEGAL_ARGUMENT,
        general::INTERNAL_SERVER_ERROR,
        general::UNSUPPORTED_OPERATION,
        web::METHOD_NOT_ALLOWED,
        web::NOT_ACCEPTABLE,
        web::BAD_REQUEST,
        web::UNSUPPORTED_MEDIA_TYPE,
        security::ACCESS_DENIED,
        security::UNAUTHORIZED,
        security::ACCOUNT_EXPIRED,
        security::CREDENTIALS_EXPIRED,
        security::ACCOUNT_LOCKED,
        security::USERNAME_NOT_FOUND,
        request::MISSING_REQUEST_VALUE,
        request::MISSING_REQUEST_PART,
        request::NO_HANDLER_FOUND,
        request::REQUEST_BINDING,
        validation::CONSTRAINT_VIOLATION,
        validation::VALIDATION_FAILED,
        parameters::MISSING_PARAMETER,
    ]
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn catalog_entry_to_problem_works() {
        let problem = security::ACCESS_DENIED.with_detail("admin role required");
        assert_eq!(problem.status(), Some(&Status::FORBIDDEN));
        assert_eq!(problem.type_uri(), "access_denied");
        assert_eq!(problem.detail(), Some("admin role required"));
        assert_eq!(problem.title(), None);
    }

    #[test]
    fn catalog_types_are_unique() {
        let entries = all();
        let types: HashSet<&str> = entries.iter().map(Problem::type_uri).collect();
        assert_eq!(types.len(), entries.len());
    }

    #[test]
    fn every_entry_has_a_status() {
        assert!(all().iter().all(|p| p.status().is_some()));
    }
}
