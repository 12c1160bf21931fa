// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Node-graph EdgeQL query builder.
//!
//! The core idea is [QueryBuilder]: a fluent chain of node operations
//! (`insert`, `select`, `update`, `delete`, `with`, `for_each`, …) that is
//! lazily assembled and then run through a two-phase Visit/Finalize
//! pipeline to produce executable EdgeQL text plus its variable bindings.
//! [InsertNode] — reachable as `.insert(...)` — is the heaviest component:
//! it resolves scalar properties, single/multi links (inlining them or
//! promoting them to `with`-bound globals), depth-indexed JSON bulk
//! inserts, and schema-aware `unless conflict … else …` synthesis.
//!
//! The [expr] module is the second major piece: a dispatcher from an
//! abstract expression tree (binary/unary ops, member access, calls,
//! conditionals, lambdas) to EdgeQL fragments, used by filter/selector
//! arguments and lambda-shaped insert/update shapes alike.
//!
//! This crate does not speak the EdgeDB wire protocol, decode results, or
//! manage connections — those are the caller's [Server] implementation.

mod builder;
mod delete;
mod error;
mod expr;
mod for_node;
mod globals;
mod insert;
mod node;
mod schema;
mod select;
mod server;
#[cfg(test)]
mod test_fixtures;
mod update;
mod value;
mod variables;
mod with;

pub use builder::QueryBuilder;
pub use delete::DeleteNode;
pub use error::{BuilderError, WithContext};
pub use expr::{EdgeQlOperator, Expr, ExprKind, TranslationScope};
pub use for_node::ForNode;
pub use globals::{Global, QueryGlobals, SubQuery};
pub use insert::{ConflictClause, ElseClause, InsertNode, InsertInput, JsonBulkInput, JsonBulkLevel, ShapeField};
pub use node::{Node, NodeCommon};
pub use schema::{
    edgedb_property_name, edgedb_type_name, scalar_type_name, Entity, LinkValue, ObjectInfo, PropertyDescriptor,
    PropertyValue, ReferenceId, SchemaInfo, TypeDescriptor, ValueType, ValueTypeSlot,
};
pub use select::{SelectNode, SortDirection};
pub use server::{ArgumentCodec, Capabilities, Cardinality, IoFormat, ParseResult, Server};
pub use update::UpdateNode;
pub use value::Value;
pub use variables::{generate_random_variable_name, QueryVariables};
pub use with::WithNode;

