// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Value normalization.
//!
//! Maps a native [`Variant`] onto the closed [`TypeTag`] enumeration and a
//! JSON payload. The mapping is total over `Variant`: every case either
//! yields exactly one tag or yields no payload at all.
//!
//! | Variant                 | Tag          | JSON payload              |
//! |-------------------------|--------------|---------------------------|
//! | `Boolean`               | `bool`       | `true` / `false`          |
//! | `SByte` .. `UInt64`     | `int8` .. `uint64` | number              |
//! | `Float`, `Double`       | `float`, `double`  | number (finite only) |
//! | `String`                | `string`     | string                    |
//! | `DateTime`              | `datetime`   | `YYYY-MM-DDThh:mm:ss.sssZ`|
//! | `StatusCode`            | `statuscode` | raw 32-bit number         |
//! | `Guid`, `ByteString`, `Array`, `Null` | none | none            |

use chrono::{DateTime, Utc};
use serde_json::{Number, Value};

use crate::event::{format_timestamp, parse_timestamp, TypeTag, ValueChangeEvent};
use crate::status::StatusCode;
use crate::value::Variant;

/// Identity of the monitored item a value belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemContext<'a> {
    /// Owning server.
    pub server_id: i32,
    /// Namespace of the node.
    pub namespace_index: u16,
    /// Identifier of the node.
    pub identifier: &'a str,
}

impl<'a> ItemContext<'a> {
    /// Creates a new item context.
    #[inline]
    pub const fn new(server_id: i32, namespace_index: u16, identifier: &'a str) -> Self {
        Self {
            server_id,
            namespace_index,
            identifier,
        }
    }
}

/// Normalizes a native value into a value-change event.
///
/// Unrecognized values produce an event with neither `type` nor `value`;
/// callers must not forward such events.
pub fn normalize(value: &Variant, timestamp: DateTime<Utc>, ctx: ItemContext<'_>) -> ValueChangeEvent {
    let (type_tag, value) = match encode(value) {
        Some((tag, json)) => (Some(tag), Some(json)),
        None => (None, None),
    };

    ValueChangeEvent {
        server_id: ctx.server_id,
        namespace_index: ctx.namespace_index,
        identifier: ctx.identifier.to_string(),
        type_tag,
        value,
        timestamp: format_timestamp(&timestamp),
    }
}

/// Returns the tag a value normalizes to, if any.
pub fn classify(value: &Variant) -> Option<TypeTag> {
    match value {
        Variant::Boolean(_) => Some(TypeTag::Bool),
        Variant::SByte(_) => Some(TypeTag::Int8),
        Variant::Byte(_) => Some(TypeTag::UInt8),
        Variant::Int16(_) => Some(TypeTag::Int16),
        Variant::UInt16(_) => Some(TypeTag::UInt16),
        Variant::Int32(_) => Some(TypeTag::Int32),
        Variant::UInt32(_) => Some(TypeTag::UInt32),
        Variant::Int64(_) => Some(TypeTag::Int64),
        Variant::UInt64(_) => Some(TypeTag::UInt64),
        Variant::Float(_) => Some(TypeTag::Float),
        Variant::Double(_) => Some(TypeTag::Double),
        Variant::String(_) => Some(TypeTag::String),
        Variant::DateTime(_) => Some(TypeTag::DateTime),
        Variant::StatusCode(_) => Some(TypeTag::StatusCode),
        Variant::Guid(_)
        | Variant::ByteString(_)
        | Variant::Array(_)
        | Variant::Null => None,
    }
}

fn encode(value: &Variant) -> Option<(TypeTag, Value)> {
    let tag = classify(value)?;
    let json = match value {
        Variant::Boolean(v) => Value::Bool(*v),
        Variant::SByte(v) => Value::from(*v),
        Variant::Byte(v) => Value::from(*v),
        Variant::Int16(v) => Value::from(*v),
        Variant::UInt16(v) => Value::from(*v),
        Variant::Int32(v) => Value::from(*v),
        Variant::UInt32(v) => Value::from(*v),
        Variant::Int64(v) => Value::from(*v),
        Variant::UInt64(v) => Value::from(*v),
        Variant::Float(v) => float_payload(f64::from(*v)),
        Variant::Double(v) => float_payload(*v),
        Variant::String(v) => Value::String(v.clone()),
        Variant::DateTime(v) => Value::String(format_timestamp(v)),
        Variant::StatusCode(v) => Value::from(v.bits()),
        _ => return None,
    };
    Some((tag, json))
}

// JSON has no NaN or infinity; those travel as their text form.
fn float_payload(v: f64) -> Value {
    match Number::from_f64(v) {
        Some(n) => Value::Number(n),
        None => Value::String(v.to_string()),
    }
}

fn float_from_payload(value: &Value) -> Option<f64> {
    match value {
        Value::String(text) => text.parse::<f64>().ok().filter(|v| !v.is_finite()),
        other => other.as_f64(),
    }
}

/// Reconstructs the native value from a tag and its JSON payload.
///
/// Returns `None` if the payload does not fit the tag.
pub fn decode(tag: TypeTag, value: &Value) -> Option<Variant> {
    let variant = match tag {
        TypeTag::Bool => Variant::Boolean(value.as_bool()?),
        TypeTag::Int8 => Variant::SByte(i8::try_from(value.as_i64()?).ok()?),
        TypeTag::UInt8 => Variant::Byte(u8::try_from(value.as_u64()?).ok()?),
        TypeTag::Int16 => Variant::Int16(i16::try_from(value.as_i64()?).ok()?),
        TypeTag::UInt16 => Variant::UInt16(u16::try_from(value.as_u64()?).ok()?),
        TypeTag::Int32 => Variant::Int32(i32::try_from(value.as_i64()?).ok()?),
        TypeTag::UInt32 => Variant::UInt32(u32::try_from(value.as_u64()?).ok()?),
        TypeTag::Int64 => Variant::Int64(value.as_i64()?),
        TypeTag::UInt64 => Variant::UInt64(value.as_u64()?),
        TypeTag::Float => Variant::Float(float_from_payload(value)? as f32),
        TypeTag::Double => Variant::Double(float_from_payload(value)?),
        TypeTag::String => Variant::String(value.as_str()?.to_string()),
        TypeTag::DateTime => Variant::DateTime(parse_timestamp(value.as_str()?)?),
        TypeTag::StatusCode => {
            Variant::StatusCode(StatusCode::from_bits(u32::try_from(value.as_u64()?).ok()?))
        }
    };
    Some(variant)
}

// =============================================================================
// Tests
// =============================================================================
