//! Core types for Settee
//!
//! This crate defines the vocabulary shared by the transport and engine:
//! - EntityModel / Record: the record layer's descriptor and mutable handle
//! - Revision: opaque compare-and-swap token issued by the store
//! - QueryDescriptor: abstract, SQL-shaped query handed to the translator
//! - ResultRow / Outcome: normalized results and the non-fatal failure channel
//! - ErrorSet: per-request classification of transport, store and decode errors
//! - SourceError: errors that abort an operation

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod classify;
pub mod error;
pub mod query;
pub mod types;

pub use classify::{ApplicationFailure, DecodeFailure, ErrorSet, TransportFailure};
pub use error::{Result, SourceError};
pub use query::{Direction, FieldSelection, OrderBy, QueryDescriptor};
pub use types::{
    generate_id, EntityModel, FieldMap, Outcome, Record, ResultRow, Revision, RowBody,
};
