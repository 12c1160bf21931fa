// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Query-wide variable bindings (spec.md §3's `QueryVariables`).

use indexmap::IndexMap;
use rand::Rng;

use crate::value::Value;

/// Returns an identifier guaranteed unique within the builder's variable
/// namespace (spec.md §4.4). Names are opaque — callers must never parse
/// them — so a short random alphanumeric suffix is sufficient; the generator
/// never reuses a name because it never looks one up by value.
pub fn generate_random_variable_name() -> String {
    const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::rng();
    let suffix: String = (0..12)
        .map(|_| ALPHABET[rng.random_range(0..ALPHABET.len())] as char)
        .collect();
    format!("v_{suffix}")
}

/// A mapping from variable name to value, serialized alongside the query
/// (spec.md §3). Insertion order is preserved so the final `with` clause can
/// list variables-as-globals in the order they were bound (spec.md §5).
#[derive(Debug, Default)]
pub struct QueryVariables {
    bindings: IndexMap<String, Value>,
}

impl QueryVariables {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates a fresh variable name, binds `value` to it, and returns the
    /// name for use in the emitted EdgeQL body (as `<type>$name`).
    pub fn bind(&mut self, value: Value) -> String {
        let name = generate_random_variable_name();
        self.bindings.insert(name.clone(), value);
        name
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.bindings.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.bindings.iter()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Merges `other`'s bindings into `self`. Per spec.md §4.2.3's `else`
    /// clause rule (and §9's resolution of the ambiguity around it), the
    /// parent wins on a name collision — random names make collisions
    /// unreachable in practice, but `entry().or_insert()` encodes the rule
    /// literally rather than relying on that being true forever.
    pub fn extend_from(&mut self, other: QueryVariables) {
        for (name, value) in other.bindings {
            self.bindings.entry(name).or_insert(value);
        }
    }
}
