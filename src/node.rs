// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Node base (spec.md §3, §4.1): the shared shape and lifecycle every clause
//! node (Insert, Select, Update, Delete, With, For) implements.

use crate::error::BuilderError;
use crate::globals::QueryGlobals;
use crate::schema::{SchemaInfo, TypeDescriptor};
use crate::variables::QueryVariables;

/// Fields every node kind carries (spec.md §3's `Node`): `kind` is implicit
/// in which concrete struct holds a `NodeCommon`, and `sub_nodes` is
/// represented by each concrete node holding its own nested builders where
/// relevant (e.g. the Insert node's `else` child, the For node's body)
/// rather than a generic untyped list.
#[derive(Debug)]
pub struct NodeCommon {
    pub operating_type: &'static TypeDescriptor,
    pub text_buffer: String,
    pub is_auto_generated: bool,
    pub requires_introspection: bool,
    pub set_as_global: bool,
    pub global_name: Option<String>,
    /// Types this node discovered it needs `SchemaInfo` for during Visit
    /// (link targets needing `unless conflict` synthesis, JSON bulk
    /// levels, or the node's own operating type for an autogenerated
    /// conflict). Feeds the builder's `describe_schema` call.
    pub introspected_types: Vec<&'static TypeDescriptor>,
}

impl NodeCommon {
    pub fn new(operating_type: &'static TypeDescriptor) -> Self {
        Self {
            operating_type,
            text_buffer: String::new(),
            is_auto_generated: false,
            requires_introspection: false,
            set_as_global: false,
            global_name: None,
            introspected_types: Vec::new(),
        }
    }
}

/// The Visit/Finalize lifecycle (spec.md §2, §4.1).
///
/// `visit` emits a node's local text using currently-known information and
/// may flag `requires_introspection`. `finalize` runs after schema
/// information has (optionally) been gathered and may rewrite or append to
/// the text buffer — e.g. synthesizing `unless conflict on …`.
pub trait Node: std::fmt::Debug {
    fn common(&self) -> &NodeCommon;
    fn common_mut(&mut self) -> &mut NodeCommon;

    /// Lets the builder recover a concrete node type (e.g. `InsertNode`) from
    /// the trait object to apply chained configuration like
    /// `unless_conflict_on` to "the last Insert node" (spec.md §4.1).
    fn as_any_mut(&mut self) -> &mut dyn std::any::Any;

    fn visit(
        &mut self,
        variables: &mut QueryVariables,
        globals: &mut QueryGlobals,
    ) -> Result<(), BuilderError>;

    fn finalize(
        &mut self,
        schema_info: Option<&SchemaInfo>,
        variables: &mut QueryVariables,
        globals: &mut QueryGlobals,
    ) -> Result<(), BuilderError>;

    fn requires_introspection(&self) -> bool {
        self.common().requires_introspection
    }

    fn is_auto_generated(&self) -> bool {
        self.common().is_auto_generated
    }

    /// The node's contribution to the final concatenated statement text: its
    /// own buffer, unless it was promoted to a global (spec.md §4.2.4), in
    /// which case downstream text references the result by bare global name.
    fn emitted_text(&self) -> &str {
        match &self.common().global_name {
            Some(name) if self.common().set_as_global => name,
            _ => &self.common().text_buffer,
        }
    }
}

/// Wraps the whole assembled statement text of a node as a global (spec.md
/// §4.2.4's final Finalize step): `(…)` around the buffer, registered under
/// `global_name`, with the local buffer cleared so downstream nodes
/// reference the result by name instead.
pub fn promote_to_global(common: &mut NodeCommon, globals: &mut QueryGlobals, global_name: String) {
    let wrapped = format!("({})", common.text_buffer);
    globals.register(global_name.clone(), crate::globals::SubQuery::Ready(wrapped), None);
    common.text_buffer.clear();
    common.global_name = Some(global_name);
}
