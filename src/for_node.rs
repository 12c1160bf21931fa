// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! The For node (SPEC_FULL.md §4.1 "Supplemented node kinds"):
//! `for <var> in <expr> union (<body>)`, where `<body>` is a nested node
//! graph built recursively through the same Visit/Finalize pipeline
//! (spec.md §3's `Node.sub_nodes`).
//!
//! Named `for_node` rather than `for` since the latter is a Rust keyword.

use crate::error::BuilderError;
use crate::expr::{translate, Expr, TranslationScope};
use crate::globals::QueryGlobals;
use crate::node::{Node, NodeCommon};
use crate::schema::SchemaInfo;
use crate::variables::QueryVariables;
use crate::with::ANONYMOUS_TYPE;

#[derive(Debug)]
pub struct ForNode {
    common: NodeCommon,
    var_name: String,
    source: Expr,
    source_text: Option<String>,
    body: Vec<Box<dyn Node>>,
}

impl ForNode {
    pub fn new(var_name: impl Into<String>, source: Expr, body: Vec<Box<dyn Node>>) -> Self {
        Self {
            common: NodeCommon::new(&ANONYMOUS_TYPE),
            var_name: var_name.into(),
            source,
            source_text: None,
            body,
        }
    }
}

impl Node for ForNode {
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
        let mut scope = TranslationScope::new();
        let source_text = translate(&self.source, &mut scope, variables)?;
        self.source_text = Some(source_text.clone());

        for node in &mut self.body {
            node.visit(variables, globals)?;
            if node.requires_introspection() {
                self.common.requires_introspection = true;
                self.common
                    .introspected_types
                    .extend(node.common().introspected_types.iter().copied());
            }
        }

        // Placeholder; `finalize` rewrites this once the body nodes have
        // their own final text.
        self.common.text_buffer = format!("for {} in {source_text} union (…)", self.var_name);
        Ok(())
    }

    fn finalize(
        &mut self,
        schema_info: Option<&SchemaInfo>,
        variables: &mut QueryVariables,
        globals: &mut QueryGlobals,
    ) -> Result<(), BuilderError> {
        for node in &mut self.body {
            node.finalize(schema_info, variables, globals)?;
        }
        let body_text = self
            .body
            .iter()
            .map(|n| n.emitted_text())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ");

        let source_text = self.source_text.clone().unwrap_or_default();
        self.common.text_buffer = format!("for {} in {source_text} union ({body_text})", self.var_name);

        if self.common.set_as_global {
            let name = self
                .common
                .global_name
                .clone()
                .unwrap_or_else(crate::globals::generate_random_global_name);
            self.common.global_name = Some(name.clone());
            crate::node::promote_to_global(&mut self.common, globals, name);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::select::SelectNode;
    use crate::test_fixtures::PERSON_TYPE;

    #[test]
    fn for_node_wraps_body_in_union() {
        let body: Vec<Box<dyn Node>> = vec![Box::new(SelectNode::new(&PERSON_TYPE, None))];
        let mut for_node = ForNode::new("p", Expr::TypeName("Person"), body);

        let mut variables = QueryVariables::new();
        let mut globals = QueryGlobals::new();
        for_node.visit(&mut variables, &mut globals).unwrap();
        for_node.finalize(None, &mut variables, &mut globals).unwrap();

        assert_eq!(for_node.emitted_text(), "for p in Person union (select Person)");
    }
}
