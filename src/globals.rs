// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Query-wide sub-query globals (spec.md §3's `QueryGlobals`).
//!
//! Globals are promoted sub-queries emitted in the statement's `with`
//! prelude. Deduplication is keyed on `ReferenceId` (Design Note 4): two
//! link resolvers built from the same object, within one builder, collapse
//! into a single global (spec.md §4.2.1 invariant 3).

use indexmap::IndexMap;
use rand::Rng;

use crate::error::BuilderError;
use crate::schema::{ReferenceId, SchemaInfo};

/// A sub-query is either already-materialized text, or a closure that needs
/// [`SchemaInfo`] before it can render (Design Note 3: "deferred sub-queries
/// → closures captured in a variant"). `requires_introspection` is implied
/// by which variant is held.
pub enum SubQuery {
    Ready(String),
    Deferred(Box<dyn FnOnce(&SchemaInfo) -> Result<String, BuilderError> + Send>),
}

impl std::fmt::Debug for SubQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubQuery::Ready(text) => write!(f, "SubQuery::Ready({text:?})"),
            SubQuery::Deferred(_) => write!(f, "SubQuery::Deferred(..)"),
        }
    }
}

impl SubQuery {
    pub fn requires_introspection(&self) -> bool {
        matches!(self, SubQuery::Deferred(_))
    }

    pub fn materialize(self, schema_info: Option<&SchemaInfo>) -> Result<String, BuilderError> {
        match self {
            SubQuery::Ready(text) => Ok(text),
            SubQuery::Deferred(f) => {
                let schema_info = schema_info.ok_or(BuilderError::SchemaRequired)?;
                f(schema_info)
            }
        }
    }
}

/// A named sub-expression emitted in the `with` prelude: `name := (<sub_query>)`.
pub struct Global {
    pub name: String,
    pub sub_query: SubQuery,
    pub reference: Option<ReferenceId>,
}

impl std::fmt::Debug for Global {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Global")
            .field("name", &self.name)
            .field("sub_query", &self.sub_query)
            .field("reference", &self.reference)
            .finish()
    }
}

pub fn generate_random_global_name() -> String {
    const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::rng();
    let suffix: String = (0..12)
        .map(|_| ALPHABET[rng.random_range(0..ALPHABET.len())] as char)
        .collect();
    format!("g_{suffix}")
}

/// Insertion-ordered global table (spec.md §3, §5: "deduplicated globals
/// retain the position of their first insertion").
#[derive(Default)]
pub struct QueryGlobals {
    by_name: IndexMap<String, Global>,
    by_reference: IndexMap<ReferenceId, String>,
}

impl std::fmt::Debug for QueryGlobals {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryGlobals")
            .field("by_name", &self.by_name)
            .finish()
    }
}

impl QueryGlobals {
    pub fn new() -> Self {
        Self::default()
    }

    /// `get_or_add_global` (spec.md §4.4): global deduplication by reference
    /// object identity. If `reference` is `Some` and already known, returns
    /// the existing global's name without registering `sub_query` at all.
    pub fn get_or_add_global(&mut self, reference: Option<ReferenceId>, sub_query: SubQuery) -> String {
        if let Some(reference) = reference {
            if let Some(existing) = self.by_reference.get(&reference) {
                return existing.clone();
            }
        }
        let name = generate_random_global_name();
        self.register(name.clone(), sub_query, reference);
        name
    }

    /// Registers a global under a pre-chosen name (used when a node promotes
    /// its entire assembled text to a global under `global_name`, spec.md
    /// §4.2.4).
    pub fn register(&mut self, name: String, sub_query: SubQuery, reference: Option<ReferenceId>) {
        if let Some(reference) = reference {
            self.by_reference.insert(reference, name.clone());
        }
        self.by_name.insert(
            name.clone(),
            Global {
                name,
                sub_query,
                reference,
            },
        );
    }

    pub fn requires_introspection(&self) -> bool {
        self.by_name.values().any(|g| g.sub_query.requires_introspection())
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    /// Materializes every global in insertion order into `name := (<text>)`
    /// clauses for the `with` prelude.
    pub fn materialize_all(self, schema_info: Option<&SchemaInfo>) -> Result<Vec<(String, String)>, BuilderError> {
        let mut out = Vec::with_capacity(self.by_name.len());
        for (name, global) in self.by_name {
            let text = global.sub_query.materialize(schema_info)?;
            out.push((name, text));
        }
        Ok(out)
    }
}
