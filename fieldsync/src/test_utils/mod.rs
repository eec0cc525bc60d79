//! Helpers shared by unit tests, integration tests and failpoint tests.
//!
//! - [`fixtures`] builds records, snapshots, documents and configs from JSON literals.
//! - [`faulty`] wraps stores so tests can make commits or warehouse writes fail.
//! - [`failpoints`] configures `fail` failpoints for the lifetime of a test.

#[cfg(feature = "failpoints")]
pub mod failpoints;
pub mod faulty;
pub mod fixtures;
