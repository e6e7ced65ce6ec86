//! Test support utilities for the SQL database workspace.
//!
//! This crate provides testing infrastructure shared across the other
//! crates' test suites:
//! - Isolated, temp-directory-backed `Database` fixtures (`context`)
//! - SQL script execution with pretty-printed output (`runner`)
//! - Row/schema builders and sample data (`fixtures`)
//! - Property-based generators for core value types (`proptest_generators`)
//! - Assertion helpers for result sets and errors (`assertions`)
//!
//! # Example
//!
//! ```
//! use testsupport::prelude::*;
//!
//! let output = run_sql_script(r#"
//!     CREATE TABLE users (id INT, name TEXT, age INT);
//!     INSERT INTO users VALUES (1, 'Alice', 30);
//!     SELECT * FROM users WHERE age > 25;
//! "#).unwrap();
//! assert!(output.contains("Alice"));
//! ```

pub mod assertions;
pub mod context;
pub mod fixtures;
pub mod proptest_generators;
pub mod runner;

/// Convenient re-exports for common testing patterns.
pub mod prelude {
    pub use crate::assertions::*;
    pub use crate::context::*;
    pub use crate::fixtures::*;
    pub use crate::runner::*;
}
