//! Customizers run, in order, on every classified problem before it is
//! handed to the transport layer.

use std::error::Error;
use std::fmt;
use std::sync::Arc;

use problem_core::{BLANK_TYPE, ResponseProblem};
use serde_json::Value;
use url::Url;

use crate::messages::MessageSource;

/// Per-failure information available to customizers.
#[derive(Clone, Copy)]
pub struct CustomizeContext<'a> {
    failure: &'a (dyn Error + 'static),
    request_id: Option<&'a str>,
    locale: Option<&'a str>,
}

impl<'a> CustomizeContext<'a> {
    #[must_use]
    pub fn new(failure: &'a (dyn Error + 'static)) -> Self {
        Self {
            failure,
            request_id: None,
            locale: None,
        }
    }

    #[must_use]
    pub fn with_request_id(mut self, request_id: Option<&'a str>) -> Self {
        self.request_id = request_id;
        self
    }

    #[must_use]
    pub fn with_locale(mut self, locale: Option<&'a str>) -> Self {
        self.locale = locale;
        self
    }

    /// The failure the problem was produced for.
    #[must_use]
    pub fn failure(&self) -> &'a (dyn Error + 'static) {
        self.failure
    }

    #[must_use]
    pub fn request_id(&self) -> Option<&'a str> {
        self.request_id
    }

    #[must_use]
    pub fn locale(&self) -> Option<&'a str> {
        self.locale
    }
}

impl fmt::Debug for CustomizeContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomizeContext")
            .field("failure", &self.failure.to_string())
            .field("request_id", &self.request_id)
            .field("locale", &self.locale)
            .finish()
    }
}

/// A step of the customizer chain. Each step sees the edits of the steps
/// before it.
pub trait ProblemCustomizer: Send + Sync {
    fn customize(&self, ctx: &CustomizeContext<'_>, response: &mut ResponseProblem);
}

impl<F> ProblemCustomizer for F
where
    F: Fn(&CustomizeContext<'_>, &mut ResponseProblem) + Send + Sync,
{
    fn customize(&self, ctx: &CustomizeContext<'_>, response: &mut ResponseProblem) {
        self(ctx, response);
    }
}

/// Adds the request id to the map channel.
#[derive(Debug, Clone)]
pub struct RequestIdCustomizer {
    key: String,
}

impl RequestIdCustomizer {
    pub const DEFAULT_KEY: &'static str = "request_id";

    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }

    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Default for RequestIdCustomizer {
    fn default() -> Self {
        Self::new(Self::DEFAULT_KEY)
    }
}

impl ProblemCustomizer for RequestIdCustomizer {
    fn customize(&self, ctx: &CustomizeContext<'_>, response: &mut ResponseProblem) {
        if let Some(id) = ctx.request_id() {
            response.with_property(self.key.clone(), id);
        }
    }
}

/// Fills in missing titles and details from a message catalog and resolves
/// `{message.code}` placeholders.
///
/// Codes are derived from the type of the problem as originally produced:
/// `<prefix><sep><type>` for the title and `<prefix><sep><type><sep>detail`
/// for the detail. Message arguments are the map-channel values in order,
/// followed by the payload as a single object.
#[derive(Clone)]
pub struct MessageCatalogCustomizer {
    source: Arc<dyn MessageSource>,
    code_prefix: String,
    separator: String,
}

impl MessageCatalogCustomizer {
    pub const DEFAULT_CODE_PREFIX: &'static str = "problem";
    pub const DEFAULT_SEPARATOR: &'static str = ".";

    #[must_use]
    pub fn new(source: Arc<dyn MessageSource>) -> Self {
        Self {
            source,
            code_prefix: Self::DEFAULT_CODE_PREFIX.to_owned(),
            separator: Self::DEFAULT_SEPARATOR.to_owned(),
        }
    }

    #[must_use]
    pub fn with_code_prefix(mut self, code_prefix: impl Into<String>) -> Self {
        self.code_prefix = code_prefix.into();
        self
    }

    #[must_use]
    pub fn with_separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = separator.into();
        self
    }

    #[must_use]
    pub fn title_code(&self, type_uri: &str) -> String {
        format!("{}{}{}", self.code_prefix, self.separator, type_uri)
    }

    #[must_use]
    pub fn detail_code(&self, type_uri: &str) -> String {
        format!("{}{}detail", self.title_code(type_uri), self.separator)
    }

    fn resolve(
        &self,
        current: Option<&str>,
        fallback_code: &str,
        args: &[Value],
        locale: Option<&str>,
    ) -> Option<String> {
        match current {
            None => self.source.message(fallback_code, args, locale),
            Some(text) => placeholder(text).and_then(|code| self.source.message(code, args, locale)),
        }
    }
}

impl fmt::Debug for MessageCatalogCustomizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageCatalogCustomizer")
            .field("code_prefix", &self.code_prefix)
            .field("separator", &self.separator)
            .finish_non_exhaustive()
    }
}

impl ProblemCustomizer for MessageCatalogCustomizer {
    fn customize(&self, ctx: &CustomizeContext<'_>, response: &mut ResponseProblem) {
        let type_uri = response.problem().type_uri().to_owned();
        let args = message_args(response);
        let locale = ctx.locale();

        let title = self.resolve(response.title(), &self.title_code(&type_uri), &args, locale);
        let detail = self.resolve(response.detail(), &self.detail_code(&type_uri), &args, locale);
        if let Some(title) = title {
            response.with_title(title);
        }
        if let Some(detail) = detail {
            response.with_detail(detail);
        }
    }
}

fn placeholder(text: &str) -> Option<&str> {
    let code = text.strip_prefix('{')?.strip_suffix('}')?;
    (!code.is_empty() && !code.contains(char::is_whitespace)).then_some(code)
}

fn message_args(response: &ResponseProblem) -> Vec<Value> {
    let mut args: Vec<Value> = response
        .properties()
        .map_or_else(Vec::new, |map| map.values().cloned().collect());
    if let Some(payload) = response.payload() {
        args.push(Value::Object(payload.clone()));
    }
    args
}

/// Resolves relative problem types against a base URI.
#[derive(Debug, Clone)]
pub struct TypeBaseCustomizer {
    base: Url,
}

impl TypeBaseCustomizer {
    #[must_use]
    pub fn new(base: Url) -> Self {
        Self { base }
    }

    /// # Errors
    /// Returns the parse error when `base` is not an absolute URI.
    pub fn parse(base: &str) -> Result<Self, url::ParseError> {
        Url::parse(base).map(Self::new)
    }
}

impl ProblemCustomizer for TypeBaseCustomizer {
    fn customize(&self, _ctx: &CustomizeContext<'_>, response: &mut ResponseProblem) {
        let type_uri = response.type_uri().to_owned();
        if type_uri == BLANK_TYPE || Url::parse(&type_uri).is_ok() {
            return;
        }
        match self.base.join(&type_uri) {
            Ok(resolved) => {
                response.with_type(String::from(resolved));
            }
            Err(e) => {
                tracing::debug!(type_uri = %type_uri, error = %e, "problem type left unresolved");
            }
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::messages::StaticMessageSource;
    use problem_core::catalog::{security, validation};
    use serde::Serialize;
    use serde_json::json;

    #[derive(Debug, thiserror::Error)]
    #[error("boom")]
    struct Boom;

    #[test]
    fn request_id_is_added_when_known() {
        let mut response = ResponseProblem::with(security::ACCESS_DENIED);
        let ctx = CustomizeContext::new(&Boom);
        RequestIdCustomizer::default().customize(&ctx, &mut response);
        assert!(response.properties().is_none());

        let ctx = ctx.with_request_id(Some("r-1"));
        RequestIdCustomizer::new("trace").customize(&ctx, &mut response);
        assert_eq!(response.properties().unwrap().get("trace"), Some(&json!("r-1")));
    }

    #[test]
    fn missing_title_and_detail_come_from_the_catalog() {
        let source = StaticMessageSource::new()
            .with_message(None, "problem.access_denied", "Access Denied")
            .with_message(None, "problem.access_denied.detail", "Admin only");
        let customizer = MessageCatalogCustomizer::new(Arc::new(source));

        let mut response = ResponseProblem::with(security::ACCESS_DENIED);
        customizer.customize(&CustomizeContext::new(&Boom), &mut response);
        assert_eq!(response.title(), Some("Access Denied"));
        assert_eq!(response.detail(), Some("Admin only"));
    }

    #[test]
    fn explicit_text_is_kept_and_placeholders_are_resolved() {
        let source = StaticMessageSource::new()
            .with_message(None, "problem.access_denied", "Access Denied")
            .with_message(None, "errors.custom", "Custom {0}");
        let customizer = MessageCatalogCustomizer::new(Arc::new(source));

        let mut response = ResponseProblem::with(
            security::ACCESS_DENIED
                .with_title("{errors.custom}")
                .with_detail("plain text")
                .with_property("user", "alice"),
        );
        customizer.customize(&CustomizeContext::new(&Boom), &mut response);
        assert_eq!(response.title(), Some("Custom alice"));
        assert_eq!(response.detail(), Some("plain text"));
    }

    #[test]
    fn arguments_follow_property_insertion_order() {
        let source = StaticMessageSource::new()
            .with_message(None, "problem.access_denied", "{0} may not {1}");
        let customizer = MessageCatalogCustomizer::new(Arc::new(source));

        let mut response = ResponseProblem::with(
            security::ACCESS_DENIED
                .with_property("user", "alice")
                .with_property("action", "delete"),
        );
        customizer.customize(&CustomizeContext::new(&Boom), &mut response);
        assert_eq!(response.title(), Some("alice may not delete"));
    }

    #[test]
    fn codes_follow_prefix_and_separator() {
        let customizer = MessageCatalogCustomizer::new(Arc::new(StaticMessageSource::new()))
            .with_code_prefix("err")
            .with_separator("/");
        assert_eq!(customizer.title_code("access_denied"), "err/access_denied");
        assert_eq!(customizer.detail_code("access_denied"), "err/access_denied/detail");
    }

    #[test]
    fn payload_is_passed_as_the_last_argument() {
        #[derive(Serialize)]
        struct Limits {
            max: u32,
        }

        let source = StaticMessageSource::new().with_message(
            None,
            "problem.constraint_violation",
            "{0} exceeded: {1}",
        );
        let customizer = MessageCatalogCustomizer::new(Arc::new(source));
        let mut response = ResponseProblem::with(
            validation::CONSTRAINT_VIOLATION
                .with_payload(&Limits { max: 3 })
                .unwrap()
                .with_property("name", "quota"),
        );
        customizer.customize(&CustomizeContext::new(&Boom), &mut response);
        assert_eq!(response.title(), Some(r#"quota exceeded: {"max":3}"#));
    }

    #[test]
    fn relative_types_are_joined_with_the_base() {
        let customizer = TypeBaseCustomizer::parse("https://errors.example.com/problems/").unwrap();
        let ctx = CustomizeContext::new(&Boom);

        let mut relative = ResponseProblem::with(security::ACCESS_DENIED);
        customizer.customize(&ctx, &mut relative);
        assert_eq!(
            relative.type_uri(),
            "https://errors.example.com/problems/access_denied"
        );
        assert_eq!(relative.problem().type_uri(), "access_denied");

        let mut absolute = ResponseProblem::with(security::ACCESS_DENIED.with_type("urn:x"));
        customizer.customize(&ctx, &mut absolute);
        assert_eq!(absolute.type_uri(), "urn:x");

        let mut blank = ResponseProblem::with(problem_core::Problem::blank());
        customizer.customize(&ctx, &mut blank);
        assert_eq!(blank.type_uri(), BLANK_TYPE);
    }
}
