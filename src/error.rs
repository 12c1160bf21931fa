// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use thiserror::Error;

use crate::schema::ValueType;

/// Errors surfaced while assembling or finalizing a query.
///
/// Construction errors are always reported at `build()` time (spec.md §7):
/// nodes may flag conditions during `visit`, but every diagnostic is
/// surfaced before any text leaves the builder.
#[derive(Error, Debug)]
pub enum BuilderError {
    #[error("no EdgeQL scalar mapping exists for value type {0:?}")]
    UnserializableType(ValueType),

    #[error("property `{1}` on type `{0}` is neither a scalar, a link, nor a multi-link")]
    UnserializableProperty(String, String),

    #[error("`{0}` has no exclusive constraints to synthesize `unless conflict on`")]
    NoExclusiveConstraints(String),

    #[error("schema introspection is required to finalize this query but no Server was supplied")]
    SchemaRequired,

    #[error("expression is not supported by the translator: {0}")]
    UnsupportedExpression(String),

    #[error("server returned an argument codec that is neither null nor an object codec")]
    MalformedArgumentCodec,

    #[error("operation was cancelled or timed out")]
    CancelledOrTimedOut,

    #[error("{0} {1}")]
    WithContext(String, #[source] Box<BuilderError>),
}

impl BuilderError {
    pub fn with_context(self, context: impl Into<String>) -> BuilderError {
        BuilderError::WithContext(context.into(), Box::new(self))
    }
}

/// Mirrors the teacher's `WithContext` convenience trait so `Result`-returning
/// call chains can annotate failures without an explicit `match`.
pub trait WithContext {
    fn with_context(self, context: impl Into<String>) -> Self;
}

impl<T> WithContext for Result<T, BuilderError> {
    fn with_context(self, context: impl Into<String>) -> Self {
        self.map_err(|e| e.with_context(context))
    }
}
