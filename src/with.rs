// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! The With node (SPEC_FULL.md §4.1 "Supplemented node kinds"): attaches a
//! named sub-query to the statement's `with` prelude without emitting any
//! body text of its own (spec.md §4.1's "transparent node").
//!
//! Unlike a link resolver's deferred global (spec.md §4.2.1), a With node's
//! sub-query is whatever the caller assembled as its own little node graph
//! (`sub_nodes`, spec.md §3's `Node.sub_nodes` field) — typically a single
//! Select, but any node kind is accepted since nothing here inspects it.

use crate::error::BuilderError;
use crate::globals::{QueryGlobals, SubQuery};
use crate::node::{Node, NodeCommon};
use crate::schema::{SchemaInfo, TypeDescriptor};
use crate::variables::QueryVariables;

/// A placeholder operating type for node kinds that don't have a single
/// meaningful entity type of their own (With, For). `operating_type` still
/// must point somewhere per spec.md §3's `Node` shape, but nothing reads it
/// for these kinds.
pub static ANONYMOUS_TYPE: TypeDescriptor = TypeDescriptor {
    edgedb_name: "<anonymous>",
    properties: &[],
};

#[derive(Debug)]
pub struct WithNode {
    common: NodeCommon,
    name: String,
    sub_nodes: Vec<Box<dyn Node>>,
}

impl WithNode {
    pub fn new(name: impl Into<String>, sub_nodes: Vec<Box<dyn Node>>) -> Self {
        Self {
            common: NodeCommon::new(&ANONYMOUS_TYPE),
            name: name.into(),
            sub_nodes,
        }
    }
}

impl Node for WithNode {
    fn common(&self) -> &NodeCommon {
        &self.common
    }

    fn common_mut(&mut self) -> &mut NodeCommon {
        &mut self.common
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }

    fn visit(&mut self, variables: &mut QueryVariables, globals: &mut QueryGlobals) -> Result<(), BuilderError> {
        for node in &mut self.sub_nodes {
            node.visit(variables, globals)?;
            if node.requires_introspection() {
                self.common.requires_introspection = true;
                self.common
                    .introspected_types
                    .extend(node.common().introspected_types.iter().copied());
            }
        }
        Ok(())
    }

    fn finalize(
        &mut self,
        schema_info: Option<&SchemaInfo>,
        variables: &mut QueryVariables,
        globals: &mut QueryGlobals,
    ) -> Result<(), BuilderError> {
        for node in &mut self.sub_nodes {
            node.finalize(schema_info, variables, globals)?;
        }
        let body = self
            .sub_nodes
            .iter()
            .map(|n| n.emitted_text())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        globals.register(self.name.clone(), SubQuery::Ready(body), None);
        // Transparent: this node contributes nothing to the statement body.
        self.common.text_buffer.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::select::SelectNode;
    use crate::test_fixtures::PERSON_TYPE;

    #[test]
    fn with_node_attaches_named_global_without_body_text() {
        let sub_nodes: Vec<Box<dyn Node>> = vec![Box::new(SelectNode::new(&PERSON_TYPE, None))];
        let mut with_node = WithNode::new("people", sub_nodes);

        let mut variables = QueryVariables::new();
        let mut globals = QueryGlobals::new();
        with_node.visit(&mut variables, &mut globals).unwrap();
        with_node.finalize(None, &mut variables, &mut globals).unwrap();

        assert_eq!(with_node.emitted_text(), "");
        let materialized = globals.materialize_all(None).unwrap();
        assert_eq!(materialized, vec![("people".to_string(), "select Person".to_string())]);
    }
}
