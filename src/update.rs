// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! The Update node (SPEC_FULL.md §4.1): `update <Type> [filter <expr>] set
//! { field := expr, ... }`.

use crate::error::BuilderError;
use crate::expr::{translate, translate_filter, Expr, TranslationScope};
use crate::globals::QueryGlobals;
use crate::insert::ShapeField;
use crate::node::{Node, NodeCommon};
use crate::schema::{SchemaInfo, TypeDescriptor};
use crate::variables::QueryVariables;

#[derive(Debug)]
pub struct UpdateNode {
    common: NodeCommon,
    filter: Option<Expr>,
    set_fields: Vec<ShapeField>,
}

impl UpdateNode {
    pub fn new(operating_type: &'static TypeDescriptor, filter: Option<Expr>, set_fields: Vec<ShapeField>) -> Self {
        Self {
            common: NodeCommon::new(operating_type),
            filter,
            set_fields,
        }
    }
}

impl Node for UpdateNode {
    fn common(&self) -> &NodeCommon {
        &self.common
    }

    fn common_mut(&mut self) -> &mut NodeCommon {
        &mut self.common
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }

    fn visit(&mut self, variables: &mut QueryVariables, _globals: &mut QueryGlobals) -> Result<(), BuilderError> {
        let td = self.common.operating_type;
        let mut text = format!("update {}", td.edgedb_name);

        if let Some(filter) = &self.filter {
            let filter_text = translate_filter(filter, variables)?;
            text.push_str(&format!(" filter {filter_text}"));
        }

        let mut scope = TranslationScope::new();
        scope.push_lambda();
        let mut parts = Vec::with_capacity(self.set_fields.len());
        for field in &self.set_fields {
            let value_text = translate(&field.value, &mut scope, variables)?;
            parts.push(format!("{} := {}", field.edgedb_name, value_text));
        }
        scope.pop_lambda();

        text.push_str(&format!(" set {{ {} }}", parts.join(", ")));
        self.common.text_buffer = text;
        Ok(())
    }

    fn finalize(
        &mut self,
        _schema_info: Option<&SchemaInfo>,
        _variables: &mut QueryVariables,
        globals: &mut QueryGlobals,
    ) -> Result<(), BuilderError> {
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
