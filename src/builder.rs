// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! The top-level query builder (spec.md §4.1): assembles a node graph via
//! chained operations and runs the two-phase Visit/Finalize pipeline that
//! turns it into executable EdgeQL text plus its variable bindings.

use std::sync::Arc;

use tracing::{debug, instrument};

use crate::delete::DeleteNode;
use crate::error::BuilderError;
use crate::expr::{value_type_of, Expr};
use crate::for_node::ForNode;
use crate::globals::QueryGlobals;
use crate::insert::{ConflictClause, ElseClause, InsertNode, JsonBulkInput, ShapeField};
use crate::node::Node;
use crate::schema::{scalar_type_name, Entity, SchemaInfo, TypeDescriptor};
use crate::select::{SelectNode, SortDirection};
use crate::server::Server;
use crate::update::UpdateNode;
use crate::variables::QueryVariables;
use crate::with::WithNode;

/// A builder exposing the chained operations of spec.md §4.1
/// (`insert`/`select`/`update`/…). Each chained call appends exactly one
/// node; node ordering is the ordering of the final statement
/// (spec.md §4.1: "Ordering matters").
#[derive(Debug, Default)]
pub struct QueryBuilder {
    nodes: Vec<Box<dyn Node>>,
    variables: QueryVariables,
    globals: QueryGlobals,
}

impl QueryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(mut self, entity: Arc<dyn Entity>) -> Self {
        self.nodes.push(Box::new(InsertNode::new_typed(entity)));
        self
    }

    pub fn insert_shape(mut self, operating_type: &'static TypeDescriptor, fields: Vec<ShapeField>) -> Self {
        self.nodes.push(Box::new(InsertNode::new_lambda(operating_type, fields)));
        self
    }

    pub fn insert_json_bulk(mut self, operating_type: &'static TypeDescriptor, input: JsonBulkInput) -> Self {
        self.nodes.push(Box::new(InsertNode::new_json_bulk(operating_type, input)));
        self
    }

    pub fn select(mut self, operating_type: &'static TypeDescriptor, filter: Option<Expr>) -> Self {
        self.nodes.push(Box::new(SelectNode::new(operating_type, filter)));
        self
    }

    pub fn update(mut self, operating_type: &'static TypeDescriptor, filter: Option<Expr>, set_fields: Vec<ShapeField>) -> Self {
        self.nodes.push(Box::new(UpdateNode::new(operating_type, filter, set_fields)));
        self
    }

    pub fn delete(mut self, operating_type: &'static TypeDescriptor, filter: Option<Expr>) -> Self {
        self.nodes.push(Box::new(DeleteNode::new(operating_type, filter)));
        self
    }

    /// Attaches a named sub-query to the `with` prelude without emitting
    /// body text of its own (spec.md §4.1, SPEC_FULL.md's `With` node).
    /// `body` is consumed purely for the node list it assembled; it was
    /// never built, so discarding its (empty) `variables`/`globals` is safe.
    pub fn with(mut self, name: impl Into<String>, body: QueryBuilder) -> Self {
        self.nodes.push(Box::new(WithNode::new(name, body.into_nodes())));
        self
    }

    /// `for <var> in <source> union (<body>)` (SPEC_FULL.md's `For` node).
    pub fn for_each(mut self, var_name: impl Into<String>, source: Expr, body: QueryBuilder) -> Self {
        self.nodes.push(Box::new(ForNode::new(var_name, source, body.into_nodes())));
        self
    }

    /// `unless_conflict()` (spec.md §4.2.3): requires introspection to
    /// synthesize the exclusive list at Finalize time. Applies to the most
    /// recently appended Insert node.
    pub fn unless_conflict(mut self) -> Self {
        if let Some(insert) = self.last_insert_mut() {
            insert.conflict = ConflictClause::Autogenerate;
        }
        self
    }

    /// `unless_conflict_on(selector)` (spec.md §4.2.3): appends the clause
    /// immediately using the translated selector, no introspection needed.
    pub fn unless_conflict_on(mut self, selector: Expr) -> Self {
        if let Some(insert) = self.last_insert_mut() {
            insert.conflict = ConflictClause::On(selector);
        }
        self
    }

    /// `else_default()`: `else (select OperatingType)`.
    pub fn else_default(mut self) -> Self {
        if let Some(insert) = self.last_insert_mut() {
            insert.else_clause = ElseClause::Default;
        }
        self
    }

    /// `else(builder)` (spec.md §4.2.3): the child is incorporated, not
    /// shared — its user nodes are cloned at construction time by the
    /// caller, and `Finalize` forces `set_as_global` off on each before
    /// building it as a nested statement.
    pub fn else_with(mut self, child: QueryBuilder) -> Self {
        if let Some(insert) = self.last_insert_mut() {
            insert.else_clause = ElseClause::Builder(Box::new(child));
        }
        self
    }

    pub fn order_by(mut self, expr: Expr, direction: SortDirection) -> Self {
        if let Some(select) = self.last_select_mut() {
            select.order_by(expr, direction);
        }
        self
    }

    pub fn offset(mut self, n: i64) -> Self {
        if let Some(select) = self.last_select_mut() {
            select.set_offset(n);
        }
        self
    }

    pub fn limit(mut self, n: i64) -> Self {
        if let Some(select) = self.last_select_mut() {
            select.set_limit(n);
        }
        self
    }

    /// Marks the most recently appended node for promotion to a global
    /// under `name` (spec.md §4.2.4's `set_as_global`/`global_name`).
    pub fn as_global(mut self, name: impl Into<String>) -> Self {
        if let Some(last) = self.nodes.last_mut() {
            last.common_mut().set_as_global = true;
            last.common_mut().global_name = Some(name.into());
        }
        self
    }

    fn last_insert_mut(&mut self) -> Option<&mut InsertNode> {
        self.nodes.iter_mut().rev().find_map(|n| n.as_any_mut().downcast_mut::<InsertNode>())
    }

    fn last_select_mut(&mut self) -> Option<&mut SelectNode> {
        self.nodes.iter_mut().rev().find_map(|n| n.as_any_mut().downcast_mut::<SelectNode>())
    }

    /// Consumes the builder for just its assembled node list, discarding
    /// the (necessarily still-empty) `variables`/`globals` it was never
    /// built with. Used when one builder's chain becomes another's
    /// `With`/`For` sub-nodes (spec.md §3's `Node.sub_nodes`).
    pub(crate) fn into_nodes(self) -> Vec<Box<dyn Node>> {
        self.nodes
    }

    /// `else(builder)`'s preparation step (spec.md §4.2.3): filter out
    /// auto-generated nodes and force `set_as_global` off on what remains —
    /// only the user's primary chain survives into the nested statement.
    pub(crate) fn strip_for_else_clause(&mut self) {
        self.nodes.retain(|n| !n.is_auto_generated());
        for node in &mut self.nodes {
            node.common_mut().set_as_global = false;
        }
    }

    pub(crate) fn take_variables(&mut self) -> QueryVariables {
        std::mem::take(&mut self.variables)
    }

    /// Runs Visit/Finalize without ever requesting introspection of its
    /// own — the caller already resolved `schema_info` for the enclosing
    /// top-level `build()` round trip (spec.md §4.2.3: `else(builder)` is
    /// built inline, sharing the parent's single schema round trip).
    pub(crate) fn build_inline(&mut self, schema_info: Option<&SchemaInfo>) -> Result<String, BuilderError> {
        for node in &mut self.nodes {
            node.visit(&mut self.variables, &mut self.globals)?;
        }
        for node in &mut self.nodes {
            node.finalize(schema_info, &mut self.variables, &mut self.globals)?;
        }
        self.emit(schema_info)
    }

    fn emit(&mut self, schema_info: Option<&SchemaInfo>) -> Result<String, BuilderError> {
        // Transparent nodes (With) contribute an empty `emitted_text` and
        // must not introduce a stray separator into the concatenated body.
        let body = self
            .nodes
            .iter()
            .map(|n| n.emitted_text())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        let globals = std::mem::take(&mut self.globals);
        let mut with_parts = Vec::new();
        for (name, text) in globals.materialize_all(schema_info)? {
            with_parts.push(format!("{name} := ({text})"));
        }
        Ok(if with_parts.is_empty() {
            body
        } else {
            format!("with {} {}", with_parts.join(", "), body)
        })
    }

    /// `Build(with_globals)` (spec.md §4.1):
    /// 1. Visit every node.
    /// 2. If any node (or pending global) set `requires_introspection`,
    ///    request `SchemaInfo` from the server once; otherwise skip.
    /// 3. Finalize every node, supplying `SchemaInfo` if obtained.
    /// 4. Materialize deferred globals.
    /// 5. Emit `with <globals>[, <variables-as-globals>] <node text>`.
    ///
    /// `with_globals` additionally restates every bound variable as a
    /// `name := <type>$name` alias in the `with` prelude (ambient, beyond
    /// what spec.md's body text needs — the body always addresses
    /// variables directly as `<type>$name`; see DESIGN.md's resolution of
    /// the "variables-as-globals" wording).
    #[instrument(skip(self, server))]
    pub async fn build(
        mut self,
        server: Option<&dyn Server>,
        with_globals: bool,
    ) -> Result<(String, QueryVariables), BuilderError> {
        for node in &mut self.nodes {
            node.visit(&mut self.variables, &mut self.globals)?;
        }

        let needs_introspection =
            self.nodes.iter().any(|n| n.requires_introspection()) || self.globals.requires_introspection();

        let schema_info = if needs_introspection {
            debug!("schema introspection required, requesting SchemaInfo");
            let server = server.ok_or(BuilderError::SchemaRequired)?;
            let mut types: Vec<&'static TypeDescriptor> = Vec::new();
            for node in &self.nodes {
                types.extend(node.common().introspected_types.iter().copied());
            }
            types.sort_by_key(|t| t.edgedb_name);
            types.dedup_by_key(|t| t.edgedb_name);
            Some(server.describe_schema(&types).await?)
        } else {
            None
        };

        for node in &mut self.nodes {
            node.finalize(schema_info.as_ref(), &mut self.variables, &mut self.globals)?;
        }

        let mut text = self.emit(schema_info.as_ref())?;

        if with_globals && !self.variables.is_empty() {
            let mut aliases = Vec::with_capacity(self.variables.len());
            for (name, value) in self.variables.iter() {
                let type_name = scalar_type_name(&value_type_of(value)?)?;
                aliases.push(format!("{name} := <{type_name}>${name}"));
            }
            text = if let Some(rest) = text.strip_prefix("with ") {
                format!("with {}, {}", aliases.join(", "), rest)
            } else {
                format!("with {} {}", aliases.join(", "), text)
            };
        }

        Ok((text, self.variables))
    }
}
