// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! The `Server` capability surface (spec.md §1, §6): the transport client,
//! connection pool, and codec subsystem live outside this crate's scope and
//! are represented only by this trait.

use async_trait::async_trait;

use crate::error::BuilderError;
use crate::schema::{SchemaInfo, TypeDescriptor};
use crate::variables::QueryVariables;

/// How many rows a query is expected to return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    AtMostOne,
    One,
    Many,
}

/// Wire encoding requested for the result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoFormat {
    Binary,
    Json,
}

/// A coarse capability bitset (DDL, transactions, session config, …). Kept
/// opaque here — the core only ever forwards it to `Server::parse`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities(pub u32);

/// The shape of an argument codec a `parse` round trip can report. A
/// well-behaved EdgeQL query compiled by this crate only ever has no
/// parameters (`Null`) or named parameters (`Object`); `Scalar` and
/// `Compound` are codec shapes the wire protocol can still report (a
/// positional-only or tuple-shaped argument list) but that this core never
/// produces, so seeing one back from the server indicates a parse/codec
/// mismatch (spec.md §7's `MalformedArgumentCodec`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgumentCodec {
    Null,
    Object,
    Scalar,
    Compound,
}

impl ArgumentCodec {
    pub fn ensure_object_or_null(self) -> Result<Self, BuilderError> {
        match self {
            ArgumentCodec::Null | ArgumentCodec::Object => Ok(self),
            ArgumentCodec::Scalar | ArgumentCodec::Compound => Err(BuilderError::MalformedArgumentCodec),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ParseResult {
    pub in_codec: ArgumentCodec,
    pub out_codec: ArgumentCodec,
    pub cardinality: Cardinality,
    pub capabilities: Capabilities,
}

/// The external collaborator this crate assumes: binary protocol, pooling,
/// authentication, and result decoding are all someone else's problem
/// (spec.md §1's Out of scope list).
#[async_trait]
pub trait Server: Send + Sync {
    async fn parse(
        &self,
        query: &str,
        cardinality: Cardinality,
        io_format: IoFormat,
        capabilities: Capabilities,
    ) -> Result<ParseResult, BuilderError>;

    async fn execute(
        &self,
        query: &str,
        variables: &QueryVariables,
    ) -> Result<Vec<serde_json::Value>, BuilderError>;

    /// Schema introspection (spec.md §6): for each type of interest, return
    /// its exclusive constraints.
    async fn describe_schema(
        &self,
        types_of_interest: &[&'static TypeDescriptor],
    ) -> Result<SchemaInfo, BuilderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ensure_object_or_null_accepts_null_and_object() {
        assert!(ArgumentCodec::Null.ensure_object_or_null().is_ok());
        assert!(ArgumentCodec::Object.ensure_object_or_null().is_ok());
    }

    #[test]
    fn ensure_object_or_null_rejects_scalar_and_compound() {
        assert!(matches!(
            ArgumentCodec::Scalar.ensure_object_or_null(),
            Err(BuilderError::MalformedArgumentCodec)
        ));
        assert!(matches!(
            ArgumentCodec::Compound.ensure_object_or_null(),
            Err(BuilderError::MalformedArgumentCodec)
        ));
    }
}
