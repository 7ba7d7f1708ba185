//! Problem documents for error responses
//!
//! This crate provides pure data types for error reporting, with no dependency
//! on an HTTP framework unless the `axum` feature is enabled. It includes:
//! - RFC 9457 Problem Details (`Problem`) with copy-on-write derivation
//! - Status codes with reason phrases (`Status`)
//! - A canonical catalog of problem categories (`catalog`)
//! - An error that carries its own problem (`ProblemError`)
//! - Per-failure response staging with headers (`ResponseProblem`)
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod catalog;
pub mod error;
pub mod payload;
pub mod problem;
pub mod response;
pub mod status;

pub use error::ProblemError;
pub use payload::PayloadError;
pub use problem::{APPLICATION_PROBLEM_JSON, BLANK_TYPE, Problem, Properties};
pub use response::ResponseProblem;
pub use status::Status;
