//! # cirrus-sandbox
//!
//! An in-memory cloud for the Cirrus cloud policy plugin.
//!
//! [`cloud::InMemoryCloud`] implements every service collaborator over
//! plain data: tag writes and deletes change the stored records, each call
//! is recorded, and failures can be injected per operation and target. It
//! backs the test suites of the other crates and the demo binary.
//!
//! Four runnable scenarios exercise the plugin end to end:
//!
//! 1. **Owner tagging**: an event-driven `auto-tag-user` policy.
//! 2. **Network drift**: `network-location` over functions, subnets and
//!    security groups.
//! 3. **ELB hygiene**: unlogged load balancers lose their public IPs.
//! 4. **Topic exposure**: publicly writable notification topics.
//!
//! All data is fictional. No external API calls are made.

pub mod cloud;
pub mod fixtures;
pub mod scenarios;

pub use cloud::{Fixture, InMemoryCloud};
