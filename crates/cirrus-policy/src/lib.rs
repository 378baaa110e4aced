//! # cirrus-policy
//!
//! TOML policy documents and runner settings for the Cirrus cloud policy
//! plugin.
//!
//! ## Overview
//!
//! [`PolicyLoader`] parses a document of `[[policies]]`, validates every
//! filter and action block against the schema its resource type registers,
//! and compiles the result into [`CompiledPolicy`](cirrus_core::CompiledPolicy)
//! values ready for the runner. A document is accepted or rejected as a
//! whole.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use std::path::Path;
//! use cirrus_policy::{settings, PolicyLoader};
//!
//! let settings = settings::from_file(Path::new("cirrus.toml"))?;
//! let policies = PolicyLoader::new(settings).from_file(Path::new("policies.toml"))?;
//! ```
//!
//! ## Block forms
//!
//! A filter or action may be a bare string (`"delete"`) or a table with a
//! `type`. A single-entry filter table without `type` is value shorthand.

pub mod document;
pub mod loader;
pub mod settings;

pub use document::{PolicyDocument, PolicyEntry};
pub use loader::PolicyLoader;

// ── Tests ─────────────────────────────────────────────────────────────────────
