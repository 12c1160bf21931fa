// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use indexmap::IndexMap;
use uuid::Uuid;

/// The variable value domain (spec.md §6): every shape a query variable or a
/// JSON-bound depth level may take.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    /// Textual decimal representation; EdgeDB's `decimal` has no exact
    /// counterpart in `std`, so we carry the canonical digit string and let
    /// the server parse it, the same way the teacher carries `SQLValue`
    /// variants it can't natively represent in Rust.
    Decimal(String),
    Str(String),
    Bytes(bytes::Bytes),
    Uuid(Uuid),
    Json(serde_json::Value),
    LocalDate(chrono::NaiveDate),
    LocalTime(chrono::NaiveTime),
    LocalDateTime(chrono::NaiveDateTime),
    Instant(chrono::DateTime<chrono::Utc>),
    Duration(chrono::Duration),
    Array(Vec<Value>),
    Tuple(Vec<Value>),
    NamedTuple(IndexMap<String, Value>),
    Set(Vec<Value>),
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int64(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<Uuid> for Value {
    fn from(v: Uuid) -> Self {
        Value::Uuid(v)
    }
}
