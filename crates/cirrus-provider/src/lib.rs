//! Filters, actions and the static registry that binds them to resource types.
//!
//! Each filter or action module exposes a `schema` and a `build` function.
//! The policy loader looks both up through [`registry::capabilities`],
//! validates the option block against the schema and calls the builder.

pub mod actions;
pub mod filters;
mod options;
pub mod registry;

#[cfg(test)]
mod testing;

pub use registry::{capabilities, BuildContext, Capabilities};
