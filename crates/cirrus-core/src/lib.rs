//! # cirrus-core
//!
//! The policy pipeline for the Cirrus cloud policy plugin.
//!
//! This crate provides:
//! - The pipeline seams (`Filter`, `Action`, `AuditWriter`, `SchemaValidator`)
//! - The service collaborator traits behind `CloudServices`
//! - Key resolution, tag reading and the generic value predicate
//! - A bounded fan-out pool for per-resource augmentation
//! - The `PolicyRunner` that wires a compiled policy together
//!
//! ## Usage
//!
//! ```rust,ignore
//! use cirrus_core::{PolicyRunner, CompiledPolicy, traits::{Filter, Action}};
//! ```

pub mod context;
pub mod pool;
pub mod runner;
pub mod schema;
pub mod services;
pub mod tagging;
pub mod traits;
pub mod value;
pub mod value_filter;

pub use context::RunContext;
pub use runner::{CompiledPolicy, PolicyRunner, RunOutcome};
