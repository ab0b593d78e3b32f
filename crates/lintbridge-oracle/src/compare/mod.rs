//! Comparing expected lines with the lines an analysis reported.

use std::cmp::Ordering;
use std::fmt;

/// Difference between expected and reported lines, as multisets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Comparison {
    missing: Vec<usize>,
    unexpected: Vec<usize>,
}

impl Comparison {
    /// Expected lines nothing was reported on, ascending.
    #[must_use]
    pub fn missing(&self) -> &[usize] {
        &self.missing
    }

    /// Reported lines no marker expected, ascending.
    #[must_use]
    pub fn unexpected(&self) -> &[usize] {
        &self.unexpected
    }

    /// Returns `true` when every expectation was met exactly once.
    #[must_use]
    pub const fn is_match(&self) -> bool {
        self.missing.is_empty() && self.unexpected.is_empty()
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_match() {
            return f.write_str("all expected issues reported");
        }
        write!(
            f,
            "missing issues on lines {:?}, unexpected issues on lines {:?}",
            self.missing, self.unexpected
        )
    }
}

/// Compares `expected` with `actual`, ignoring order but not multiplicity.
///
/// ```
/// use lintbridge_oracle::compare;
///
/// let comparison = compare(&[0, 4, 4], &[4, 0, 7]);
/// assert_eq!(comparison.missing(), [4]);
/// assert_eq!(comparison.unexpected(), [7]);
/// ```
#[must_use]
pub fn compare(expected: &[usize], actual: &[usize]) -> Comparison {
    let mut wanted = expected.to_vec();
    wanted.sort_unstable();
    let mut reported = actual.to_vec();
    reported.sort_unstable();

    let mut comparison = Comparison::default();
    let mut wanted_lines = wanted.into_iter().peekable();
    let mut reported_lines = reported.into_iter().peekable();
    loop {
        match (wanted_lines.peek().copied(), reported_lines.peek().copied()) {
            (Some(want), Some(got)) => match want.cmp(&got) {
                Ordering::Equal => {
                    wanted_lines.next();
                    reported_lines.next();
                }
                Ordering::Less => {
                    comparison.missing.push(want);
                    wanted_lines.next();
                }
                Ordering::Greater => {
                    comparison.unexpected.push(got);
                    reported_lines.next();
                }
            },
            (Some(want), None) => {
                comparison.missing.push(want);
                wanted_lines.next();
            }
            (None, Some(got)) => {
                comparison.unexpected.push(got);
                reported_lines.next();
            }
            (None, None) => return comparison,
        }
    }
}
