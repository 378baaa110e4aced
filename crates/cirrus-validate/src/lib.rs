//! # cirrus-validate
//!
//! Option-block validation for the Cirrus policy loader.
//!
//! This crate provides [`validator::JsonSchemaValidator`], which implements
//! [`cirrus_core::traits::SchemaValidator`] on top of the `jsonschema`
//! crate. Every filter and action declares a schema; the loader validates
//! each block against it before anything is compiled.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use cirrus_core::traits::SchemaValidator;
//! use cirrus_validate::validator::JsonSchemaValidator;
//!
//! let validator = JsonSchemaValidator::new();
//! validator.validate(&schema, &block)?;
//! ```

pub mod validator;
