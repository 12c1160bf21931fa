// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! The Insert node (spec.md §4.2): the core of this specification.
//!
//! Converts one of three inputs — a typed object value, a lambda shape
//! literal, or a JSON bulk document with a depth map — into an EdgeQL
//! `insert` statement, resolving links (inline or globalized), and
//! synthesizing `unless conflict on … else …` clauses that may require
//! schema introspection.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::builder::QueryBuilder;
use crate::error::BuilderError;
use crate::expr::{translate, translate_filter, Expr, TranslationScope};
use crate::globals::{QueryGlobals, SubQuery};
use crate::node::{Node, NodeCommon};
use crate::schema::{Entity, LinkValue, ObjectInfo, PropertyDescriptor, PropertyValue, ReferenceId, SchemaInfo, TypeDescriptor};
use crate::variables::QueryVariables;

/// A single `edgedb_name := <expr>` assignment for the lambda shape-literal
/// input (spec.md §4.2(b)).
#[derive(Debug, Clone)]
pub struct ShapeField {
    pub edgedb_name: &'static str,
    pub value: Expr,
}

/// One depth level of a JSON bulk document (spec.md §4.2.2): the array of
/// sibling objects at this depth, and the type they're inserted as.
#[derive(Debug, Clone)]
pub struct JsonBulkLevel {
    pub type_descriptor: &'static TypeDescriptor,
    /// A pre-serialized JSON array, one element per object at this depth,
    /// each annotated with depth-index/depth-from/depth-to link sites.
    pub array: serde_json::Value,
}

/// A JSON bulk document already annotated as a depth map (spec.md §4.2.2):
/// `levels[0]` is depth 1 (shallowest, the roots being inserted), through
/// `levels[D-1]` at depth `D` (deepest).
#[derive(Debug, Clone)]
pub struct JsonBulkInput {
    pub levels: Vec<JsonBulkLevel>,
}

#[derive(Debug)]
pub enum InsertInput {
    Typed(Arc<dyn Entity>),
    Lambda(Vec<ShapeField>),
    JsonBulk(JsonBulkInput),
}

#[derive(Debug, Clone)]
pub enum ConflictClause {
    None,
    /// `unless_conflict()`: requires introspection to synthesize the
    /// exclusive list (spec.md §4.2.3).
    Autogenerate,
    /// `unless_conflict_on(selector)`: the selector expression, translated
    /// without needing introspection.
    On(Expr),
}

#[derive(Debug)]
pub enum ElseClause {
    None,
    /// `else_default()`: `else (select OperatingType)`.
    Default,
    /// `else(builder)`: a cloned, filtered child builder (spec.md §4.2.3).
    Builder(Box<QueryBuilder>),
}

/// The Insert node itself (spec.md §3's `Node`, specialized).
#[derive(Debug)]
pub struct InsertNode {
    common: NodeCommon,
    input: InsertInput,
    pub conflict: ConflictClause,
    pub else_clause: ElseClause,
    /// Per-node set of entity types already inlined (spec.md §3, §4.2.1):
    /// prevents two inlined sub-queries from targeting the same type within
    /// one node.
    sub_query_map: HashSet<&'static str>,
}

impl InsertNode {
    pub fn new_typed(entity: Arc<dyn Entity>) -> Self {
        Self {
            common: NodeCommon::new(entity.type_descriptor()),
            input: InsertInput::Typed(entity),
            conflict: ConflictClause::None,
            else_clause: ElseClause::None,
            sub_query_map: HashSet::new(),
        }
    }

    pub fn new_lambda(operating_type: &'static TypeDescriptor, fields: Vec<ShapeField>) -> Self {
        Self {
            common: NodeCommon::new(operating_type),
            input: InsertInput::Lambda(fields),
            conflict: ConflictClause::None,
            else_clause: ElseClause::None,
            sub_query_map: HashSet::new(),
        }
    }

    pub fn new_json_bulk(operating_type: &'static TypeDescriptor, input: JsonBulkInput) -> Self {
        Self {
            common: NodeCommon::new(operating_type),
            input: InsertInput::JsonBulk(input),
            conflict: ConflictClause::None,
            else_clause: ElseClause::None,
            sub_query_map: HashSet::new(),
        }
    }

    fn visit_typed(
        &mut self,
        entity: &Arc<dyn Entity>,
        variables: &mut QueryVariables,
        globals: &mut QueryGlobals,
    ) -> Result<(), BuilderError> {
        let td = entity.type_descriptor();
        let fields = build_shape_fields(
            td,
            entity.as_ref(),
            variables,
            globals,
            &mut self.sub_query_map,
            &mut self.common.requires_introspection,
        )?;
        self.common.text_buffer = format!("insert {} {{ {} }}", td.edgedb_name, fields.join(", "));
        Ok(())
    }

    fn visit_lambda(&mut self, fields: &[ShapeField], variables: &mut QueryVariables) -> Result<(), BuilderError> {
        let td = self.common.operating_type;
        let mut scope = TranslationScope::new();
        scope.push_lambda();
        let mut parts = Vec::with_capacity(fields.len());
        for field in fields {
            let value_text = translate(&field.value, &mut scope, variables)?;
            parts.push(format!("{} := {}", field.edgedb_name, value_text));
        }
        scope.pop_lambda();
        self.common.text_buffer = format!("insert {} {{ {} }}", td.edgedb_name, parts.join(", "));
        Ok(())
    }

    fn visit_json_bulk(
        &mut self,
        input: &JsonBulkInput,
        variables: &mut QueryVariables,
        globals: &mut QueryGlobals,
    ) -> Result<(), BuilderError> {
        self.common.requires_introspection = true;
        let depth = input.levels.len();
        debug!(depth, "building JSON bulk insert depth map");

        let mut variable_names = vec![String::new(); depth];
        for (i, level) in input.levels.iter().enumerate() {
            variable_names[i] = variables.bind(crate::value::Value::Json(level.array.clone()));
        }

        // Build deepest-first so each shallower depth's shape text can
        // reference an already-named deeper global (names are deterministic
        // `T_d{depth}`, not randomized — spec.md §8 invariant 6).
        for i in (0..depth).rev() {
            let level_index = i + 1;
            let td = input.levels[i].type_descriptor;
            let is_deepest = level_index == depth;
            let next_depth_global = format!("T_d{}", level_index + 1);
            let var_name = variable_names[i].clone();

            let shape_text = td
                .properties
                .iter()
                .filter(|p| !p.ignored && !p.is_id)
                .map(|p| format!("{} := {}", p.edgedb_name, json_bulk_field_fragment(p, is_deepest, &next_depth_global)))
                .collect::<Vec<_>>()
                .join(", ");

            let td_for_closure = td;
            let sub_query = SubQuery::Deferred(Box::new(move |schema_info: &SchemaInfo| {
                let clause = exclusive_clause_fragment(td_for_closure, schema_info);
                let unless = match clause {
                    Some(frag) => format!("\n     unless conflict on {frag}"),
                    None => String::new(),
                };
                Ok(format!(
                    "array_agg((for iter in json_array_unpack(<json>${var_name}) union\n  (insert {} {{ {shape_text} }}{unless}\n     else (select {}))))",
                    td_for_closure.edgedb_name, td_for_closure.edgedb_name
                ))
            }));

            globals.register(format!("T_d{level_index}"), sub_query, None);
        }

        self.common.text_buffer = "T_d1".to_string();
        Ok(())
    }
}

/// `inline_or_global` (spec.md §4.2.1): if `target` already appears in the
/// owning node's `SubQueryMap`, or the sub-query requires introspection,
/// promote it to a global (deduplicated by `reference`); otherwise record
/// `target` in the map and return the sub-query text inlined.
fn inline_or_global(
    target: &'static TypeDescriptor,
    sub_query: SubQuery,
    reference: Option<ReferenceId>,
    globals: &mut QueryGlobals,
    sub_query_map: &mut HashSet<&'static str>,
) -> String {
    let already_inlined = sub_query_map.contains(target.edgedb_name);
    let needs_global = already_inlined || sub_query.requires_introspection();
    if needs_global {
        trace!(target = target.edgedb_name, "promoting link sub-query to global");
        globals.get_or_add_global(reference, sub_query)
    } else {
        sub_query_map.insert(target.edgedb_name);
        match sub_query {
            SubQuery::Ready(text) => text,
            SubQuery::Deferred(_) => unreachable!("requires_introspection() was false"),
        }
    }
}

/// The link resolver (spec.md §4.2.1): resolves a single link value
/// (tracked or new) to EdgeQL text.
fn resolve_link(
    target: &'static TypeDescriptor,
    link: &LinkValue,
    variables: &mut QueryVariables,
    globals: &mut QueryGlobals,
    sub_query_map: &mut HashSet<&'static str>,
    requires_introspection: &mut bool,
) -> Result<String, BuilderError> {
    match link {
        LinkValue::Tracked(id) => {
            let text = format!("(select {} filter .id = <uuid>\"{}\")", target.edgedb_name, id);
            Ok(inline_or_global(target, SubQuery::Ready(text), None, globals, sub_query_map))
        }
        LinkValue::New(entity) => {
            *requires_introspection = true;
            let reference = entity.as_ref().reference_id();
            let fields = build_shape_fields(target, entity.as_ref(), variables, globals, sub_query_map, requires_introspection)?;
            let shape_text = format!("{{ {} }}", fields.join(", "));
            let target_for_closure = target;
            let sub_query = SubQuery::Deferred(Box::new(move |schema_info: &SchemaInfo| {
                let clause = exclusive_clause_fragment(target_for_closure, schema_info);
                let unless = match clause {
                    Some(frag) => format!(" unless conflict on {frag}"),
                    None => String::new(),
                };
                Ok(format!(
                    "(insert {} {}{} else (select {}))",
                    target_for_closure.edgedb_name, shape_text, unless, target_for_closure.edgedb_name
                ))
            }));
            Ok(inline_or_global(target, sub_query, Some(reference), globals, sub_query_map))
        }
    }
}

/// Builds a typed object's shape fields as `edgedb_name := <expr>` strings
/// (spec.md §4.2.1). Shared by the top-level Insert node's own shape and a
/// link resolver's recursively-built deferred sub-insert shape — both need
/// the same scalar/link/multi-link dispatch.
fn build_shape_fields(
    td: &'static TypeDescriptor,
    entity: &dyn Entity,
    variables: &mut QueryVariables,
    globals: &mut QueryGlobals,
    sub_query_map: &mut HashSet<&'static str>,
    requires_introspection: &mut bool,
) -> Result<Vec<String>, BuilderError> {
    let mut fields = Vec::new();
    for prop in td.properties {
        if prop.ignored || prop.is_id {
            continue;
        }
        let value = entity.property_value(prop.source_name);
        let text = match value {
            PropertyValue::Scalar(v) => {
                let value_type = prop.value_type().ok_or_else(|| {
                    BuilderError::UnserializableProperty(td.edgedb_name.to_string(), prop.source_name.to_string())
                })?;
                let scalar_type = crate::schema::scalar_type_name(&value_type)?;
                let name = variables.bind(v);
                format!("{} := <{}>${}", prop.edgedb_name, scalar_type, name)
            }
            PropertyValue::SingleLink(None) => format!("{} := {{}}", prop.edgedb_name),
            PropertyValue::SingleLink(Some(link)) => {
                let target = prop.link_target.ok_or_else(|| {
                    BuilderError::UnserializableProperty(td.edgedb_name.to_string(), prop.source_name.to_string())
                })?;
                let resolved = resolve_link(target(), &link, variables, globals, sub_query_map, requires_introspection)?;
                format!("{} := {}", prop.edgedb_name, resolved)
            }
            PropertyValue::MultiLink(links) => {
                let target = prop.link_target.ok_or_else(|| {
                    BuilderError::UnserializableProperty(td.edgedb_name.to_string(), prop.source_name.to_string())
                })?;
                let mut parts = Vec::with_capacity(links.len());
                for link in &links {
                    parts.push(resolve_link(target(), link, variables, globals, sub_query_map, requires_introspection)?);
                }
                format!("{} := {{ {} }}", prop.edgedb_name, parts.join(", "))
            }
        };
        fields.push(text);
    }
    Ok(fields)
}

/// Flattens every returned exclusive constraint group's property names,
/// deduplicated in discovery order (SPEC_FULL.md §4.2's resolution of the
/// exclusive-synthesis open question). Renders `.prop` for one name,
/// `(.a, .b, …)` for more than one, `None` for zero.
fn exclusive_clause_fragment(td: &'static TypeDescriptor, schema_info: &SchemaInfo) -> Option<String> {
    let info: &ObjectInfo = schema_info.get(td)?;
    let mut seen = HashSet::new();
    let mut names = Vec::new();
    for group in &info.exclusive_constraints {
        for name in group {
            if seen.insert(*name) {
                names.push(*name);
            }
        }
    }
    match names.len() {
        0 => None,
        1 => Some(format!(".{}", names[0])),
        _ => Some(format!(
            "({})",
            names.iter().map(|n| format!(".{n}")).collect::<Vec<_>>().join(", ")
        )),
    }
}

/// Terminal-depth / non-terminal link fragment for the JSON bulk path
/// (spec.md §4.2.2). Declarative, as SPEC_FULL.md's Open Question
/// resolution prefers over the source's index-arithmetic `_isLast` check.
fn json_bulk_field_fragment(prop: &'static PropertyDescriptor, is_deepest: bool, next_depth_global: &str) -> String {
    if prop.is_link {
        if is_deepest {
            return "{}".to_string();
        }
        let name = prop.source_name;
        if prop.is_multi_link {
            format!(
                "distinct array_unpack({next_depth_global}[<int64>json_get(iter,'{name}','depth_from') ?? 0 : <int64>json_get(iter,'{name}','depth_to') ?? 0])"
            )
        } else {
            let target_name = prop.link_target.map(|f| f().edgedb_name).unwrap_or("");
            format!(
                "{next_depth_global}[<int64>json_get(iter,'{name}','depth_index')] if json_typeof(json_get(iter,'{name}')) != 'null' else <{target_name}>{{}}"
            )
        }
    } else {
        format!("<{}>json_get(iter,'{}')", scalar_type_name_or_str(prop), prop.source_name)
    }
}

/// Walks a typed object's link graph to gather every type that might need
/// schema introspection (self plus any `New` link target, recursively), for
/// the builder's `describe_schema` request. Over-inclusive is fine: lookups
/// against [`SchemaInfo`] for a type the server didn't describe simply miss.
fn collect_typed_candidates(entity: &dyn Entity, out: &mut Vec<&'static TypeDescriptor>) {
    let td = entity.type_descriptor();
    out.push(td);
    for prop in td.properties {
        if prop.ignored || prop.is_id {
            continue;
        }
        match entity.property_value(prop.source_name) {
            PropertyValue::SingleLink(Some(LinkValue::New(e))) => collect_typed_candidates(e.as_ref(), out),
            PropertyValue::MultiLink(links) => {
                for l in links {
                    if let LinkValue::New(e) = l {
                        collect_typed_candidates(e.as_ref(), out);
                    }
                }
            }
            _ => {}
        }
    }
}

fn scalar_type_name_or_str(prop: &'static PropertyDescriptor) -> String {
    prop.value_type()
        .and_then(|vt| crate::schema::scalar_type_name(&vt).ok())
        .unwrap_or_else(|| "str".to_string())
}

impl Node for InsertNode {
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
        if matches!(self.conflict, ConflictClause::Autogenerate) {
            self.common.requires_introspection = true;
            self.common.introspected_types.push(self.common.operating_type);
        }
        match &self.input {
            InsertInput::Typed(entity) => {
                let entity = entity.clone();
                self.visit_typed(&entity, variables, globals)?;
                if self.common.requires_introspection {
                    collect_typed_candidates(entity.as_ref(), &mut self.common.introspected_types);
                }
            }
            InsertInput::Lambda(fields) => {
                let fields = fields.clone();
                self.visit_lambda(&fields, variables)?;
            }
            InsertInput::JsonBulk(bulk) => {
                let bulk = bulk.clone();
                self.visit_json_bulk(&bulk, variables, globals)?;
                self.common.introspected_types.extend(bulk.levels.iter().map(|l| l.type_descriptor));
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
        // Fixed order (spec.md §4.2.4): conflict synthesis, then else
        // clause, then optional promotion of the whole statement to a
        // global.
        match &self.conflict {
            ConflictClause::None => {}
            ConflictClause::Autogenerate => {
                let td = self.common.operating_type;
                let schema_info = schema_info.ok_or(BuilderError::SchemaRequired)?;
                let clause = exclusive_clause_fragment(td, schema_info)
                    .ok_or_else(|| BuilderError::NoExclusiveConstraints(td.edgedb_name.to_string()))?;
                self.common.text_buffer.push_str(&format!(" unless conflict on {clause}"));
            }
            ConflictClause::On(selector) => {
                let mut scope = TranslationScope::new();
                scope.push_lambda();
                let text = translate(selector, &mut scope, variables)?;
                scope.pop_lambda();
                self.common.text_buffer.push_str(&format!(" unless conflict on {text}"));
            }
        }

        match std::mem::replace(&mut self.else_clause, ElseClause::None) {
            ElseClause::None => {}
            ElseClause::Default => {
                let td = self.common.operating_type;
                self.common.text_buffer.push_str(&format!(" else (select {})", td.edgedb_name));
            }
            ElseClause::Builder(mut child) => {
                child.strip_for_else_clause();
                let child_text = child.build_inline(schema_info)?;
                variables.extend_from(child.take_variables());
                self.common.text_buffer.push_str(&format!(" else ({child_text})"));
            }
        }

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

/// Filter translation helper used by `select`/`update`/`delete` filter
/// selectors and by `unless_conflict_on` (spec.md §8 scenario 6).
pub fn translate_selector(expr: &Expr, variables: &mut QueryVariables) -> Result<String, BuilderError> {
    translate_filter(expr, variables)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::builder::QueryBuilder;
    use crate::error::BuilderError;
    use crate::schema::Entity;
    use crate::test_fixtures::{Person, PersonExclusiveServer, Post, Tag, Team, PERSON_TYPE};
    use crate::value::Value;

    use super::{JsonBulkInput, JsonBulkLevel};

    #[tokio::test]
    async fn scalar_only_insert_end_to_end() {
        // spec.md §8 scenario 1.
        let person = Arc::new(Person { name: "Alice".to_string() });
        let builder = QueryBuilder::new().insert(person);
        let (text, variables) = builder.build(None, false).await.unwrap();
        assert_eq!(variables.len(), 1);
        let (name, value) = variables.iter().next().unwrap();
        assert_eq!(*value, Value::Str("Alice".to_string()));
        assert_eq!(text, format!("insert Person {{ name := <str>${name} }}"));
    }

    #[tokio::test]
    async fn multi_link_with_shared_reference_dedups_to_one_global() {
        // spec.md §8 scenario 3 / invariant 3: a multi-link with two
        // elements built from the *same* reference object collapses to a
        // single global referenced twice in the member set.
        let bob: Arc<dyn Entity> = Arc::new(Person { name: "Bob".to_string() });
        let team = Arc::new(Team {
            members: vec![bob.clone(), bob.clone()],
        });
        let builder = QueryBuilder::new().insert(team);
        let (text, _variables) = builder.build(Some(&PersonExclusiveServer), false).await.unwrap();

        // Exactly one global declaration in the `with` prelude...
        assert!(text.starts_with("with "));
        assert_eq!(text.matches("insert Person").count(), 1, "expected one deduplicated global, got: {text}");

        // ...and the member set references the same name twice.
        let members_clause = text.split("members := { ").nth(1).unwrap();
        let members_clause = &members_clause[..members_clause.find(" }").unwrap()];
        let refs: Vec<&str> = members_clause.split(", ").collect();
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0], refs[1]);
    }

    #[tokio::test]
    async fn autogenerated_conflict_without_exclusives_fails() {
        // spec.md §8 scenario 4.
        let builder = QueryBuilder::new().insert(Arc::new(Tag)).unless_conflict();
        let err = builder.build(Some(&PersonExclusiveServer), false).await.unwrap_err();
        assert!(matches!(err, BuilderError::NoExclusiveConstraints(ref name) if name == "Tag"));
    }

    #[tokio::test]
    async fn single_link_to_new_target_becomes_a_global() {
        // spec.md §8 scenario 2.
        let bob: Arc<dyn Entity> = Arc::new(Person { name: "Bob".to_string() });
        let post = Arc::new(Post { author: bob });
        let builder = QueryBuilder::new().insert(post);
        let (text, _variables) = builder.build(Some(&PersonExclusiveServer), false).await.unwrap();

        assert!(text.starts_with("with "));
        assert!(text.contains("unless conflict on .name else (select Person)"));
        // The Post insert references the global by bare name, not inline.
        let body = text.split(" insert Post").nth(1).unwrap();
        assert!(!body.contains("insert Person"), "author link should not be inlined: {text}");
    }

    #[tokio::test]
    async fn json_bulk_depth_two_emits_two_depth_globals() {
        // spec.md §8 scenario 5 / invariant 6.
        let child_array = serde_json::json!([{"name": "Child"}]);
        let parent_array = serde_json::json!([{"name": "Parent", "child": {"depth_index": 0}}]);

        let input = JsonBulkInput {
            levels: vec![
                JsonBulkLevel {
                    type_descriptor: &PERSON_TYPE,
                    array: parent_array,
                },
                JsonBulkLevel {
                    type_descriptor: &PERSON_TYPE,
                    array: child_array,
                },
            ],
        };

        let builder = QueryBuilder::new().insert_json_bulk(&PERSON_TYPE, input);
        let (text, variables) = builder.build(Some(&PersonExclusiveServer), false).await.unwrap();

        assert_eq!(variables.len(), 2, "one JSON variable bound per depth");
        assert!(text.contains("T_d1 := (array_agg((for iter in json_array_unpack"));
        assert!(text.contains("T_d2 := (array_agg((for iter in json_array_unpack"));
        assert!(text.trim_end().ends_with("T_d1"), "body references the shallowest depth global: {text}");
    }

    #[tokio::test]
    async fn schema_required_without_server_fails() {
        // spec.md §4.1 Failure: introspection needed but no Server supplied.
        let bob: Arc<dyn Entity> = Arc::new(Person { name: "Bob".to_string() });
        let post_author = Arc::new(Team { members: vec![bob] });
        let builder = QueryBuilder::new().insert(post_author);
        let err = builder.build(None, false).await.unwrap_err();
        assert!(matches!(err, BuilderError::SchemaRequired));
    }
}
