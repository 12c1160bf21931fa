// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Shared entity fixtures for unit tests scattered across `insert.rs`,
//! `for_node.rs`, and `with.rs` — kept in one place (test-only compiled, per
//! `#[cfg(test)]` on the `mod` declaration in `lib.rs`) so each module's own
//! test block stays focused on what it's actually exercising, the way the
//! teacher isolates its own cross-cutting test harness under `src/testing/`.

use std::sync::Arc;

use crate::error::BuilderError;
use crate::schema::{
    Entity, LinkValue, ObjectInfo, PropertyDescriptor, PropertyValue, SchemaInfo, TypeDescriptor, ValueType,
    ValueTypeSlot,
};
use crate::server::{Capabilities, Cardinality, IoFormat, ParseResult, Server};
use crate::value::Value;
use crate::variables::QueryVariables;

pub(crate) static PERSON_PROPS: &[PropertyDescriptor] = &[
    PropertyDescriptor {
        source_name: "id",
        edgedb_name: "id",
        value_type: None,
        is_link: false,
        is_multi_link: false,
        link_target: None,
        is_exclusive: false,
        is_id: true,
        ignored: false,
    },
    PropertyDescriptor {
        source_name: "name",
        edgedb_name: "name",
        value_type: Some(&ValueTypeSlot(|| ValueType::Str)),
        is_link: false,
        is_multi_link: false,
        link_target: None,
        is_exclusive: true,
        is_id: false,
        ignored: false,
    },
];

pub(crate) static PERSON_TYPE: TypeDescriptor = TypeDescriptor {
    edgedb_name: "Person",
    properties: PERSON_PROPS,
};

#[derive(Debug)]
pub(crate) struct Person {
    pub name: String,
}

impl Entity for Person {
    fn type_descriptor(&self) -> &'static TypeDescriptor {
        &PERSON_TYPE
    }

    fn property_value(&self, source_name: &str) -> PropertyValue {
        match source_name {
            "name" => PropertyValue::Scalar(Value::Str(self.name.clone())),
            other => panic!("unknown property {other}"),
        }
    }

    fn tracked_id(&self) -> Option<uuid::Uuid> {
        None
    }
}

pub(crate) static TEAM_PROPS: &[PropertyDescriptor] = &[
    PropertyDescriptor {
        source_name: "id",
        edgedb_name: "id",
        value_type: None,
        is_link: false,
        is_multi_link: false,
        link_target: None,
        is_exclusive: false,
        is_id: true,
        ignored: false,
    },
    PropertyDescriptor {
        source_name: "members",
        edgedb_name: "members",
        value_type: None,
        is_link: true,
        is_multi_link: true,
        link_target: Some(|| &PERSON_TYPE),
        is_exclusive: false,
        is_id: false,
        ignored: false,
    },
];

pub(crate) static TEAM_TYPE: TypeDescriptor = TypeDescriptor {
    edgedb_name: "Team",
    properties: TEAM_PROPS,
};

#[derive(Debug)]
pub(crate) struct Team {
    pub members: Vec<Arc<dyn Entity>>,
}

impl Entity for Team {
    fn type_descriptor(&self) -> &'static TypeDescriptor {
        &TEAM_TYPE
    }

    fn property_value(&self, source_name: &str) -> PropertyValue {
        match source_name {
            "members" => PropertyValue::MultiLink(self.members.iter().cloned().map(LinkValue::New).collect()),
            other => panic!("unknown property {other}"),
        }
    }

    fn tracked_id(&self) -> Option<uuid::Uuid> {
        None
    }
}

pub(crate) static POST_PROPS: &[PropertyDescriptor] = &[
    PropertyDescriptor {
        source_name: "id",
        edgedb_name: "id",
        value_type: None,
        is_link: false,
        is_multi_link: false,
        link_target: None,
        is_exclusive: false,
        is_id: true,
        ignored: false,
    },
    PropertyDescriptor {
        source_name: "author",
        edgedb_name: "author",
        value_type: None,
        is_link: true,
        is_multi_link: false,
        link_target: Some(|| &PERSON_TYPE),
        is_exclusive: false,
        is_id: false,
        ignored: false,
    },
];

pub(crate) static POST_TYPE: TypeDescriptor = TypeDescriptor {
    edgedb_name: "Post",
    properties: POST_PROPS,
};

#[derive(Debug)]
pub(crate) struct Post {
    pub author: Arc<dyn Entity>,
}

impl Entity for Post {
    fn type_descriptor(&self) -> &'static TypeDescriptor {
        &POST_TYPE
    }

    fn property_value(&self, source_name: &str) -> PropertyValue {
        match source_name {
            "author" => PropertyValue::SingleLink(Some(LinkValue::New(self.author.clone()))),
            other => panic!("unknown property {other}"),
        }
    }

    fn tracked_id(&self) -> Option<uuid::Uuid> {
        None
    }
}

pub(crate) static NO_EXCLUSIVE_PROPS: &[PropertyDescriptor] = &[PropertyDescriptor {
    source_name: "id",
    edgedb_name: "id",
    value_type: None,
    is_link: false,
    is_multi_link: false,
    link_target: None,
    is_exclusive: false,
    is_id: true,
    ignored: false,
}];

pub(crate) static TAG_TYPE: TypeDescriptor = TypeDescriptor {
    edgedb_name: "Tag",
    properties: NO_EXCLUSIVE_PROPS,
};

#[derive(Debug)]
pub(crate) struct Tag;

impl Entity for Tag {
    fn type_descriptor(&self) -> &'static TypeDescriptor {
        &TAG_TYPE
    }

    fn property_value(&self, source_name: &str) -> PropertyValue {
        panic!("unexpected property {source_name}")
    }

    fn tracked_id(&self) -> Option<uuid::Uuid> {
        None
    }
}

/// Reports `Person.name` as an exclusive constraint; nothing else.
pub(crate) struct PersonExclusiveServer;

#[async_trait::async_trait]
impl Server for PersonExclusiveServer {
    async fn parse(
        &self,
        _query: &str,
        _cardinality: Cardinality,
        _io_format: IoFormat,
        _capabilities: Capabilities,
    ) -> Result<ParseResult, BuilderError> {
        unimplemented!()
    }

    async fn execute(&self, _query: &str, _variables: &QueryVariables) -> Result<Vec<serde_json::Value>, BuilderError> {
        unimplemented!()
    }

    async fn describe_schema(&self, types: &[&'static TypeDescriptor]) -> Result<SchemaInfo, BuilderError> {
        let mut info = SchemaInfo::new();
        for td in types {
            if td.edgedb_name == "Person" {
                info.insert(
                    td,
                    ObjectInfo {
                        exclusive_constraints: vec![vec!["name"]],
                    },
                );
            }
        }
        Ok(info)
    }
}
