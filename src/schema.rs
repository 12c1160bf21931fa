// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Compile-time schema descriptors and the introspection contract.
//!
//! Design Note 1 (spec.md §9) replaces runtime reflection with a
//! `TypeDescriptor` table produced by a derive/codegen step. This module
//! defines the descriptor shapes such a derive would target; `Entity` is the
//! trait an actual `#[derive(Entity)]` macro would implement.

use std::collections::HashMap;

use crate::error::BuilderError;
use crate::value::Value;

/// The scalar kinds a property can hold, keyed to an EdgeQL scalar name via
/// [`scalar_type_name`]. Array element types are boxed since `ValueType` is
/// otherwise `Copy`-sized and arrays are the only recursive case.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueType {
    Bool,
    Int16,
    Int32,
    Int64,
    Float32,
    Float64,
    Decimal,
    Str,
    Bytes,
    Uuid,
    Json,
    LocalDate,
    LocalTime,
    LocalDateTime,
    Instant,
    Duration,
    Array(Box<ValueType>),
    /// A kind with no EdgeQL scalar mapping at all (e.g. a tuple, named
    /// tuple, or set passed where a scalar was expected). Exists only so
    /// [`BuilderError::UnserializableType`] can name what was rejected;
    /// [`scalar_type_name`] always fails on it.
    Unsupported(&'static str),
}

/// Look up the EdgeQL scalar type name for a [`ValueType`].
///
/// Fails with [`BuilderError::UnserializableType`] if no scalar mapping
/// exists: `Array` recurses and could carry an `Unsupported` element type,
/// and `Unsupported` itself (spec.md §7's "no scalar mapping exists")
/// always fails.
pub fn scalar_type_name(value_type: &ValueType) -> Result<String, BuilderError> {
    let name = match value_type {
        ValueType::Bool => "bool".to_string(),
        ValueType::Int16 => "int16".to_string(),
        ValueType::Int32 => "int32".to_string(),
        ValueType::Int64 => "int64".to_string(),
        ValueType::Float32 => "float32".to_string(),
        ValueType::Float64 => "float64".to_string(),
        ValueType::Decimal => "decimal".to_string(),
        ValueType::Str => "str".to_string(),
        ValueType::Bytes => "bytes".to_string(),
        ValueType::Uuid => "uuid".to_string(),
        ValueType::Json => "json".to_string(),
        ValueType::LocalDate => "cal::local_date".to_string(),
        ValueType::LocalTime => "cal::local_time".to_string(),
        ValueType::LocalDateTime => "cal::local_datetime".to_string(),
        ValueType::Instant => "datetime".to_string(),
        ValueType::Duration => "duration".to_string(),
        ValueType::Array(inner) => format!("array<{}>", scalar_type_name(inner)?),
        ValueType::Unsupported(_) => return Err(BuilderError::UnserializableType(value_type.clone())),
    };
    Ok(name)
}

/// Metadata for one property of an entity type.
#[derive(Debug, Clone, Copy)]
pub struct PropertyDescriptor {
    pub source_name: &'static str,
    pub edgedb_name: &'static str,
    pub value_type: Option<&'static ValueTypeSlot>,
    pub is_link: bool,
    pub is_multi_link: bool,
    pub link_target: Option<fn() -> &'static TypeDescriptor>,
    pub is_exclusive: bool,
    pub is_id: bool,
    pub ignored: bool,
}

/// `ValueType` owns a `Box` for the `Array` case, so it can't be embedded
/// directly in a `const`/`static` [`PropertyDescriptor`]. `ValueTypeSlot`
/// wraps a `fn() -> ValueType` so non-array scalars stay zero-cost while
/// arrays are still expressible in static descriptor tables.
pub struct ValueTypeSlot(pub fn() -> ValueType);

impl std::fmt::Debug for ValueTypeSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ValueTypeSlot({:?})", (self.0)())
    }
}

impl PropertyDescriptor {
    pub fn value_type(&self) -> Option<ValueType> {
        self.value_type.map(|slot| (slot.0)())
    }
}

/// Metadata for an entity type, as a schema layer (spec.md §3) would
/// reflect it.
#[derive(Debug)]
pub struct TypeDescriptor {
    pub edgedb_name: &'static str,
    pub properties: &'static [PropertyDescriptor],
}

impl TypeDescriptor {
    pub fn property(&self, source_name: &str) -> Option<&'static PropertyDescriptor> {
        self.properties.iter().find(|p| p.source_name == source_name)
    }

    /// Properties statically known to carry a single-column exclusivity
    /// constraint. This is a *hint*; the authoritative set of exclusive
    /// constraints used to synthesize `unless conflict on` always comes from
    /// [`SchemaInfo`] (see SPEC_FULL.md §4.2's open-question resolution).
    pub fn statically_exclusive_properties(&self) -> Vec<&'static PropertyDescriptor> {
        self.properties.iter().filter(|p| p.is_exclusive).collect()
    }
}

/// `get_edgedb_type_name` (spec.md §4.4): trivial now that the name lives on
/// the static descriptor rather than behind reflection.
pub fn edgedb_type_name(type_descriptor: &TypeDescriptor) -> &'static str {
    type_descriptor.edgedb_name
}

/// `get_edgedb_property_name` (spec.md §4.4).
pub fn edgedb_property_name(property: &PropertyDescriptor) -> &'static str {
    property.edgedb_name
}

/// One object type's schema-confirmed exclusive constraints, as returned by
/// [`crate::server::Server::describe_schema`] (spec.md §6's `SchemaInfo`
/// contract): each constraint is a list of property names, single-property
/// constraints being lists of length one.
#[derive(Debug, Clone, Default)]
pub struct ObjectInfo {
    pub exclusive_constraints: Vec<Vec<&'static str>>,
}

/// Schema facts gathered by a single round of introspection, keyed by
/// `edgedb_name`.
#[derive(Debug, Clone, Default)]
pub struct SchemaInfo {
    by_type_name: HashMap<&'static str, ObjectInfo>,
}

impl SchemaInfo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, type_descriptor: &TypeDescriptor, info: ObjectInfo) {
        self.by_type_name.insert(type_descriptor.edgedb_name, info);
    }

    pub fn get(&self, type_descriptor: &TypeDescriptor) -> Option<&ObjectInfo> {
        self.by_type_name.get(type_descriptor.edgedb_name)
    }
}

/// Value carried by a scalar property when serializing a typed object
/// (spec.md §4.2.1).
#[derive(Debug, Clone)]
pub enum PropertyValue {
    Scalar(Value),
    SingleLink(Option<LinkValue>),
    MultiLink(Vec<LinkValue>),
}

/// A link target: either an object already persisted (identified by its
/// server-assigned id) or a new object that still needs to be inserted.
#[derive(Debug, Clone)]
pub enum LinkValue {
    Tracked(uuid::Uuid),
    New(std::sync::Arc<dyn Entity>),
}

/// The compile-time replacement for reflection (spec.md §9, Design Note 1):
/// an entity knows its own `TypeDescriptor` and can hand back the value of
/// any of its non-ignored properties by source name.
pub trait Entity: std::fmt::Debug + Send + Sync {
    fn type_descriptor(&self) -> &'static TypeDescriptor;
    fn property_value(&self, source_name: &str) -> PropertyValue;
    /// `Some` if this object was loaded from the database and therefore
    /// carries a server-assigned id; `None` for objects the caller
    /// constructed purely in memory.
    fn tracked_id(&self) -> Option<uuid::Uuid>;
}

impl dyn Entity {
    /// The "address-like token" of Design Note 4: identity derived from the
    /// trait object's data pointer. Two `Arc<dyn Entity>` clones pointing at
    /// the same allocation produce the same [`ReferenceId`], which is what
    /// global deduplication (spec.md §4.2.1 invariant 3) keys on.
    pub fn reference_id(&self) -> ReferenceId {
        ReferenceId((self as *const dyn Entity).cast::<()>() as usize)
    }
}

/// Stable identity key for deduplicating globals built from the same
/// reference object (spec.md §3, §4.2.1, §4.4 `get_or_add_global`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReferenceId(usize);
