//! Recognition of issue markers in fixture text.
//!
//! A marker is a whole line starting with `//` that contains a caret run,
//! where nothing after the last caret is `<` or `>`. Lines whose trailing text
//! holds angle brackets belong to other annotation syntaxes and are never
//! markers. The marker points at the line immediately above it.

/// Prefix every marker line starts with.
pub const COMMENT_PREFIX: &str = "//";

/// One expected issue described by a marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpectedIssue {
    line: usize,
    start_column: usize,
    end_column: usize,
    message: Option<String>,
}

impl ExpectedIssue {
    /// 0-based line the issue is expected on.
    #[must_use]
    pub const fn line(&self) -> usize {
        self.line
    }

    /// 0-based column of the first caret, in characters.
    #[must_use]
    pub const fn start_column(&self) -> usize {
        self.start_column
    }

    /// Column just past the last caret, in characters.
    #[must_use]
    pub const fn end_column(&self) -> usize {
        self.end_column
    }

    /// Message written as `{{message}}` after the carets, if any.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }
}

/// Parts of a recognised marker line.
struct Marker<'a> {
    start_column: usize,
    end_column: usize,
    trailing: &'a str,
}

fn parse_marker(line: &str) -> Option<Marker<'_>> {
    let body = line.strip_suffix('\r').unwrap_or(line);
    let rest = body.strip_prefix(COMMENT_PREFIX)?;
    let last_caret = rest.rfind('^')?;
    let (head, trailing) = rest.split_at(last_caret + 1);
    if trailing.contains(['<', '>']) {
        return None;
    }
    let run = head.len() - head.trim_end_matches('^').len();
    let prefix = body.get(..COMMENT_PREFIX.len() + head.len() - run)?;
    let start_column = prefix.chars().count();
    Some(Marker {
        start_column,
        end_column: start_column + run,
        trailing,
    })
}

fn message(trailing: &str) -> Option<String> {
    let (_, open) = trailing.split_once("{{")?;
    let (text, _) = open.split_once("}}")?;
    Some(text.trim().to_owned())
}

/// Returns `true` when `line` is an issue marker.
///
/// ```
/// use lintbridge_oracle::is_marker;
///
/// assert!(is_marker("//   ^^^^"));
/// assert!(!is_marker("//   ^^^^ <unsupported>"));
/// assert!(!is_marker("// plain comment"));
/// ```
#[must_use]
pub fn is_marker(line: &str) -> bool {
    parse_marker(line).is_some()
}

/// Lines of `text` carrying an expected issue, ascending and 0-based.
///
/// A marker on the first line has nothing above it and is ignored. The
/// result depends only on `text`.
#[must_use]
pub fn expected_lines(text: &str) -> Vec<usize> {
    expected_issues(text)
        .into_iter()
        .map(|issue| issue.line)
        .collect()
}

/// Expected issues described by the markers in `text`, in line order.
///
/// ```
/// use lintbridge_oracle::expected_issues;
///
/// let issues = expected_issues("call();\n//  ^^^^ {{Remove this call.}}\n");
/// let issue = issues.first().unwrap();
/// assert_eq!((issue.line(), issue.start_column(), issue.end_column()), (0, 4, 8));
/// assert_eq!(issue.message(), Some("Remove this call."));
/// ```
#[must_use]
pub fn expected_issues(text: &str) -> Vec<ExpectedIssue> {
    text.split('\n')
        .enumerate()
        .filter_map(|(index, line)| {
            let marker = parse_marker(line)?;
            Some(ExpectedIssue {
                line: index.checked_sub(1)?,
                start_column: marker.start_column,
                end_column: marker.end_column,
                message: message(marker.trailing),
            })
        })
        .collect()
}
