//! Typed payload validation for the payload extension channel.
//!
//! A payload is flattened into the problem document, so it must serialize as
//! a JSON object. Map-typed payloads are rejected: they belong in the map
//! channel (`with_properties*`), and accepting them here would make it
//! ambiguous which channel is active.

use serde::Serialize;
use serde::ser::{self, Impossible};
use serde_json::Value;
use std::fmt;

use crate::problem::Properties;

/// Error raised when a typed payload cannot be attached to a problem.
#[derive(Debug, thiserror::Error)]
pub enum PayloadError {
    #[error("payload is a map; use the map channel (`with_properties`) instead")]
    MapPayload,
    #[error("payload must serialize as an object, got {kind}")]
    NotAnObject { kind: &'static str },
    #[error("payload serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Serialize `payload` into the object stored in the payload channel.
///
/// # Errors
/// Returns [`PayloadError`] when the payload is a map, is not object-shaped,
/// or fails to serialize.
pub(crate) fn to_object<T>(payload: &T) -> Result<Properties, PayloadError>
where
    T: Serialize + ?Sized,
{
    match payload.serialize(ShapeProbe) {
        Err(Shape::Struct) => {}
        Err(Shape::Map) => return Err(PayloadError::MapPayload),
        Err(Shape::Other(kind)) => return Err(PayloadError::NotAnObject { kind }),
        Ok(()) => return Err(PayloadError::NotAnObject { kind: "unit" }),
    }
    match serde_json::to_value(payload)? {
        Value::Object(map) => Ok(map),
        other => Err(PayloadError::NotAnObject {
            kind: value_kind(&other),
        }),
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Outcome of probing a value's top-level serde shape. Reported through the
/// error path so probing stops at the first call.
#[derive(Debug)]
enum Shape {
    Struct,
    Map,
    Other(&'static str),
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Struct => f.write_str("struct"),
            Self::Map => f.write_str("map"),
            Self::Other(kind) => f.write_str(kind),
        }
    }
}

impl std::error::Error for Shape {}

impl ser::Error for Shape {
    fn custom<M: fmt::Display>(_msg: M) -> Self {
        Self::Other("custom")
    }
}

struct ShapeProbe;

macro_rules! scalar_shapes {
    ($($method:ident($ty:ty) => $kind:literal;)*) => {
        $(
            fn $method(self, _v: $ty) -> Result<(), Shape> {
                Err(Shape::Other($kind))
            }
        )*
    };
}

impl ser::Serializer for ShapeProbe {
    type Ok = ();
    type Error = Shape;
    type SerializeSeq = Impossible<(), Shape>;
    type SerializeTuple = Impossible<(), Shape>;
    type SerializeTupleStruct = Impossible<(), Shape>;
    type SerializeTupleVariant = Impossible<(), Shape>;
    type SerializeMap = Impossible<(), Shape>;
    type SerializeStruct = Impossible<(), Shape>;
    type SerializeStructVariant = Impossible<(), Shape>;

    scalar_shapes! {
        serialize_bool(bool) => "bool";
        serialize_i8(i8) => "number";
        serialize_i16(i16) => "number";
        serialize_i32(i32) => "number";
        serialize_i64(i64) => "number";
        serialize_u8(u8) => "number";
        serialize_u16(u16) => "number";
        serialize_u32(u32) => "number";
        serialize_u64(u64) => "number";
        serialize_f32(f32) => "number";
        serialize_f64(f64) => "number";
        serialize_char(char) => "string";
        serialize_str(&str) => "string";
        serialize_bytes(&[u8]) => "bytes";
        serialize_unit_struct(&'static str) => "unit";
    }

    fn serialize_none(self) -> Result<(), Shape> {
        Err(Shape::Other("null"))
    }

    fn serialize_some<T: ?Sized + Serialize>(self, value: &T) -> Result<(), Shape> {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Result<(), Shape> {
        Err(Shape::Other("unit"))
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
    ) -> Result<(), Shape> {
        Err(Shape::Other("string"))
    }

    fn serialize_newtype_struct<T: ?Sized + Serialize>(
        self,
        _name: &'static str,
        value: &T,
    ) -> Result<(), Shape> {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: ?Sized + Serialize>(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _value: &T,
    ) -> Result<(), Shape> {
        // Externally tagged: `{"Variant": value}`, a struct-like single key object.
        Err(Shape::Struct)
    }

    fn serialize_seq(self, _len: Option<usize>) -> Result<Self::SerializeSeq, Shape> {
        Err(Shape::Other("array"))
    }

    fn serialize_tuple(self, _len: usize) -> Result<Self::SerializeTuple, Shape> {
        Err(Shape::Other("array"))
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleStruct, Shape> {
        Err(Shape::Other("array"))
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleVariant, Shape> {
        Err(Shape::Struct)
    }

    fn serialize_map(self, len: Option<usize>) -> Result<Self::SerializeMap, Shape> {
        // Derived structs with `#[serde(flatten)]` fields serialize as a map of
        // unknown length; real map types always report their length.
        match len {
            Some(_) => Err(Shape::Map),
            None => Err(Shape::Struct),
        }
    }

    fn serialize_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStruct, Shape> {
        Err(Shape::Struct)
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStructVariant, Shape> {
        Err(Shape::Struct)
    }
}
