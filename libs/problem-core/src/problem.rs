//! RFC 9457 Problem Details as an immutable value with copy-on-write derivation.
//!
//! A [`Problem`] carries the four standard members (`type`, `title`, `status`,
//! `detail`) and at most two extension channels:
//! - the *payload* channel: a typed value serialized to an object whose fields
//!   are flattened into the document;
//! - the *map* channel: free-form key/value properties, also flattened.
//!
//! When both are present, the rendered document is the payload's fields with
//! the map overlaid on top (map wins on key collisions).

use std::borrow::Cow;
use std::hash::{Hash, Hasher};

use serde::de::DeserializeOwned;
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::payload::{self, PayloadError};
use crate::status::Status;

/// Content type for Problem Details as per RFC 9457.
pub const APPLICATION_PROBLEM_JSON: &str = "application/problem+json";

/// Problem type used when no type is given.
pub const BLANK_TYPE: &str = "about:blank";

/// Ordered key/value properties of the map channel.
pub type Properties = serde_json::Map<String, Value>;

const STANDARD_MEMBERS: [&str; 4] = ["type", "title", "status", "detail"];

static DEFAULT_STATUS: Status = Status::INTERNAL_SERVER_ERROR;

/// RFC 9457 Problem Details document.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub struct Problem {
    type_uri: Cow<'static, str>,
    title: Option<Cow<'static, str>>,
    status: Option<Status>,
    detail: Option<Cow<'static, str>>,
    payload: Option<Properties>,
    properties: Option<Properties>,
}

impl Problem {
    /// Problem with the blank type and no other members.
    pub const fn blank() -> Self {
        Self {
            type_uri: Cow::Borrowed(BLANK_TYPE),
            title: None,
            status: None,
            detail: None,
            payload: None,
            properties: None,
        }
    }

    /// Problem of the given category and status.
    pub const fn create(status: Status, type_uri: &'static str) -> Self {
        Self {
            type_uri: Cow::Borrowed(type_uri),
            title: None,
            status: Some(status),
            detail: None,
            payload: None,
            properties: None,
        }
    }

    /// Problem with the blank type and the given status.
    pub const fn status_only(status: Status) -> Self {
        Self::create(status, BLANK_TYPE)
    }

    /// Problem from its standard members. A missing type becomes [`BLANK_TYPE`].
    pub fn from_parts(
        type_uri: Option<impl Into<Cow<'static, str>>>,
        title: Option<impl Into<Cow<'static, str>>>,
        status: Option<Status>,
        detail: Option<impl Into<Cow<'static, str>>>,
    ) -> Self {
        Self {
            type_uri: type_uri.map_or(Cow::Borrowed(BLANK_TYPE), Into::into),
            title: title.map(Into::into),
            status,
            detail: detail.map(Into::into),
            payload: None,
            properties: None,
        }
    }

    pub const fn bad_request(type_uri: &'static str) -> Self {
        Self::create(Status::BAD_REQUEST, type_uri)
    }

    pub const fn unauthorized(type_uri: &'static str) -> Self {
        Self::create(Status::UNAUTHORIZED, type_uri)
    }

    pub const fn forbidden(type_uri: &'static str) -> Self {
        Self::create(Status::FORBIDDEN, type_uri)
    }

    pub const fn not_found(type_uri: &'static str) -> Self {
        Self::create(Status::NOT_FOUND, type_uri)
    }

    pub const fn conflict(type_uri: &'static str) -> Self {
        Self::create(Status::CONFLICT, type_uri)
    }

    pub const fn unprocessable_entity(type_uri: &'static str) -> Self {
        Self::create(Status::UNPROCESSABLE_ENTITY, type_uri)
    }

    pub const fn internal_server_error(type_uri: &'static str) -> Self {
        Self::create(Status::INTERNAL_SERVER_ERROR, type_uri)
    }

    pub const fn not_implemented(type_uri: &'static str) -> Self {
        Self::create(Status::NOT_IMPLEMENTED, type_uri)
    }

    pub const fn service_unavailable(type_uri: &'static str) -> Self {
        Self::create(Status::SERVICE_UNAVAILABLE, type_uri)
    }

    pub fn with_type(mut self, type_uri: impl Into<Cow<'static, str>>) -> Self {
        self.type_uri = type_uri.into();
        self
    }

    pub fn with_title(mut self, title: impl Into<Cow<'static, str>>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_status(mut self, status: impl Into<Status>) -> Self {
        self.status = Some(status.into());
        self
    }

    pub fn with_detail(mut self, detail: impl Into<Cow<'static, str>>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Attach a typed payload whose fields are flattened into the document.
    ///
    /// The payload replaces both extension channels.
    ///
    /// # Errors
    /// Returns [`PayloadError::MapPayload`] for map-typed payloads and
    /// [`PayloadError::NotAnObject`] for payloads that do not serialize as an
    /// object.
    pub fn with_payload<T>(self, payload: &T) -> Result<Self, PayloadError>
    where
        T: Serialize + ?Sized,
    {
        let object = payload::to_object(payload)?;
        Ok(self.with_payload_object(object))
    }

    pub(crate) fn with_payload_object(mut self, object: Properties) -> Self {
        self.payload = Some(object);
        self.properties = None;
        self
    }

    /// Replace both extension channels with the given map.
    pub fn with_properties_map(mut self, properties: Properties) -> Self {
        self.payload = None;
        self.properties = Some(properties);
        self
    }

    /// Edit a snapshot of the map channel (empty if unset) and carry the
    /// result. The payload channel is kept.
    pub fn with_properties(mut self, edit: impl FnOnce(&mut Properties)) -> Self {
        let mut properties = self.properties.take().unwrap_or_default();
        edit(&mut properties);
        self.properties = Some(properties);
        self
    }

    /// Insert or overwrite a single map-channel property. The payload channel
    /// is kept.
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties
            .get_or_insert_with(Properties::new)
            .insert(key.into(), value.into());
        self
    }

    #[inline]
    #[must_use]
    pub fn type_uri(&self) -> &str {
        &self.type_uri
    }

    #[inline]
    #[must_use]
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    #[inline]
    #[must_use]
    pub fn status(&self) -> Option<&Status> {
        self.status.as_ref()
    }

    /// The status, or `500 Internal Server Error` when none is set.
    #[must_use]
    pub fn status_or_default(&self) -> &Status {
        self.status.as_ref().unwrap_or(&DEFAULT_STATUS)
    }

    #[inline]
    #[must_use]
    pub fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }

    /// Serialized fields of the typed payload, if one is attached.
    #[inline]
    #[must_use]
    pub fn payload(&self) -> Option<&Properties> {
        self.payload.as_ref()
    }

    /// Deserialize the payload channel back into a typed value.
    ///
    /// Returns `None` when no payload is attached.
    ///
    /// # Errors
    /// Returns the deserialization error when the payload does not match `T`.
    pub fn payload_as<T: DeserializeOwned>(&self) -> Option<Result<T, serde_json::Error>> {
        self.payload
            .as_ref()
            .map(|object| serde_json::from_value(Value::Object(object.clone())))
    }

    #[inline]
    #[must_use]
    pub fn properties(&self) -> Option<&Properties> {
        self.properties.as_ref()
    }

    /// Whether either extension channel is populated.
    #[must_use]
    pub fn is_extended(&self) -> bool {
        self.payload.is_some() || self.properties.is_some()
    }

    /// Extension members as rendered: payload fields, then the map overlaid.
    #[must_use]
    pub fn extensions(&self) -> Properties {
        let mut merged = self.payload.clone().unwrap_or_default();
        if let Some(properties) = &self.properties {
            for (key, value) in properties {
                merged.insert(key.clone(), value.clone());
            }
        }
        merged
    }
}

impl Default for Problem {
    fn default() -> Self {
        Self::blank()
    }
}

impl Hash for Problem {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_uri.hash(state);
        self.title.hash(state);
        self.status.hash(state);
        self.detail.hash(state);
    }
}

impl Serialize for Problem {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("type", &self.type_uri)?;
        if let Some(title) = &self.title {
            map.serialize_entry("title", title)?;
        }
        if let Some(status) = &self.status {
            map.serialize_entry("status", &status.code())?;
        }
        if let Some(detail) = &self.detail {
            map.serialize_entry("detail", detail)?;
        }
        for (key, value) in &self.extensions() {
            if !STANDARD_MEMBERS.contains(&key.as_str()) {
                map.serialize_entry(key, value)?;
            }
        }
        map.end()
    }
}

#[derive(Deserialize)]
struct WireProblem {
    #[serde(rename = "type", default)]
    type_uri: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    status: Option<Value>,
    #[serde(default)]
    detail: Option<String>,
    #[serde(flatten)]
    extra: Properties,
}

impl<'de> Deserialize<'de> for Problem {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let wire = WireProblem::deserialize(deserializer)?;
        let status = wire.status.map(|value| {
            value
                .as_u64()
                .and_then(|code| u16::try_from(code).ok())
                .and_then(Status::from_code)
                .unwrap_or(Status::INTERNAL_SERVER_ERROR)
        });
        let mut problem = Self::from_parts(wire.type_uri, wire.title, status, wire.detail);
        if !wire.extra.is_empty() {
            problem.properties = Some(wire.extra);
        }
        Ok(problem)
    }
}

/// Axum integration: make Problem directly usable as a response
#[cfg(feature = "axum")]
impl axum::response::IntoResponse for Problem {
    fn into_response(self) -> axum::response::Response {
        use axum::http::{HeaderValue, header};

        let status = self.status_or_default().as_status_code();
        let mut resp = axum::Json(self).into_response();
        *resp.status_mut() = status;
        resp.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static(APPLICATION_PROBLEM_JSON),
        );
        resp
    }
}
