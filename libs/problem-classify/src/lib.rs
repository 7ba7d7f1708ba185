//! Classification of failures into problem documents
//!
//! A [`HandlerRegistry`] maps failure types to handlers, resolving every
//! concrete type to the handler of its nearest registered ancestor in a
//! declared [`TypeHierarchy`]. A [`ClassificationManager`] unwraps a
//! failure's cause chain, dispatches to the matching handler and runs the
//! configured [`ProblemCustomizer`]s on the result.
//!
//! The crate also ships:
//! - built-in failure types (`failures`) and their default handlers (`defaults`)
//! - message catalogs for localized titles and details (`messages`)
//! - `figment` based configuration (`config`)
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod config;
pub mod customize;
pub mod defaults;
pub mod failures;
pub mod hierarchy;
pub mod manager;
pub mod messages;
pub mod registry;

pub use config::{ClassifierConfig, ConfigError, MessagesConfig};
pub use customize::{
    CustomizeContext, MessageCatalogCustomizer, ProblemCustomizer, RequestIdCustomizer,
    TypeBaseCustomizer,
};
pub use defaults::register_defaults;
pub use hierarchy::{FailureType, Subtype, TypeHierarchy};
pub use manager::{ClassificationManager, ClassificationManagerBuilder, RequestScope};
pub use messages::{MessageSource, StaticMessageSource};
pub use registry::{
    BoxError, DuplicatePolicy, Handled, Handler, HandlerRegistry, HandlerRegistryBuilder,
    IntoHandled, RegistryError,
};
