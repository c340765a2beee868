//! Smoke-test harness for FieldDB web services.
//!
//! `Tester` drives a `fielddb_core::FieldDbClient` through a scripted sequence
//! against a live service and checks each response; `fixtures` holds the
//! sample fruit documents and the design document it creates.

pub mod fixtures;
pub mod tester;

pub use tester::Tester;
