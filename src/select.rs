// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! The Select node (SPEC_FULL.md §4.1 "Supplemented node kinds"):
//! `select <Type> [filter <expr>] [order by ...] [offset N] [limit N]`.

use crate::error::BuilderError;
use crate::expr::{translate_filter, Expr, TranslationScope};
use crate::globals::QueryGlobals;
use crate::node::{Node, NodeCommon};
use crate::schema::{SchemaInfo, TypeDescriptor};
use crate::variables::QueryVariables;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug)]
pub struct SelectNode {
    common: NodeCommon,
    filter: Option<Expr>,
    order_by: Vec<(Expr, SortDirection)>,
    offset: Option<i64>,
    limit: Option<i64>,
}

impl SelectNode {
    pub fn new(operating_type: &'static TypeDescriptor, filter: Option<Expr>) -> Self {
        Self {
            common: NodeCommon::new(operating_type),
            filter,
            order_by: Vec::new(),
            offset: None,
            limit: None,
        }
    }

    pub fn order_by(&mut self, expr: Expr, direction: SortDirection) {
        self.order_by.push((expr, direction));
    }

    pub fn set_offset(&mut self, n: i64) {
        self.offset = Some(n);
    }

    pub fn set_limit(&mut self, n: i64) {
        self.limit = Some(n);
    }
}

impl Node for SelectNode {
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
        let mut text = format!("select {}", td.edgedb_name);

        if let Some(filter) = &self.filter {
            let filter_text = translate_filter(filter, variables)?;
            text.push_str(&format!(" filter {filter_text}"));
        }

        if !self.order_by.is_empty() {
            let mut scope = TranslationScope::new();
            scope.push_lambda();
            let mut parts = Vec::with_capacity(self.order_by.len());
            for (expr, direction) in &self.order_by {
                let expr_text = crate::expr::translate(expr, &mut scope, variables)?;
                let dir = match direction {
                    SortDirection::Asc => "asc",
                    SortDirection::Desc => "desc",
                };
                parts.push(format!("{expr_text} {dir}"));
            }
            scope.pop_lambda();
            text.push_str(&format!(" order by {}", parts.join(" then ")));
        }

        if let Some(n) = self.offset {
            let name = variables.bind(crate::value::Value::Int64(n));
            text.push_str(&format!(" offset <int64>${name}"));
        }

        if let Some(n) = self.limit {
            let name = variables.bind(crate::value::Value::Int64(n));
            text.push_str(&format!(" limit <int64>${name}"));
        }

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
