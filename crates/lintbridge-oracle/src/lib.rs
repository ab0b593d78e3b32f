//! Expected-issue oracle for annotated source fixtures.
//!
//! Fixtures mark the lines where an issue is expected with a comment placed
//! directly below them: `//`, then any text, then a run of carets under the
//! offending code, then optional free text without `<` or `>`. The free text
//! may carry the expected message as `{{message}}`.
//!
//! ```text
//! function f(a: number) {
//! //           ^^^^^^^^ {{Refactor this function}}
//!   return a;
//! }
//! ```
//!
//! [`expected_lines`] turns such a fixture into the ascending, 0-based lines
//! an analysis must report, and [`compare`] checks reported lines against
//! them.
//!
//! # Example
//!
//! ```
//! use lintbridge_oracle::{compare, expected_lines};
//!
//! let fixture = "function f(a: number) {\n//           ^^^^^^^^\n  return a;\n}\n";
//! let expected = expected_lines(fixture);
//! assert_eq!(expected, [0]);
//! assert!(compare(&expected, &[0]).is_match());
//! ```

pub mod compare;
pub mod fixture;
pub mod marker;

#[cfg(test)]
mod tests;

pub use self::compare::{Comparison, compare};
pub use self::fixture::{Fixture, FixtureError};
pub use self::marker::{ExpectedIssue, expected_issues, expected_lines, is_marker};
