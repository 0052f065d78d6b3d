//! Ignore-pattern matching in the style of `.gitignore`.
//!
//! Patterns are compiled from text together with the directory they are
//! scoped to. Evaluation is last-match-wins, so a later `!pattern` can
//! re-include a path an earlier pattern excluded.

use std::path::Path;

use glob::{MatchOptions, Pattern};
use tracing::warn;

use crate::error::Result;
use crate::infra::read_file;

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// A compiled exclusion rule.
#[derive(Debug, Clone)]
pub struct IgnorePattern {
    pattern: String,
    source: String,
    line_num: usize,
    scope: String,
    glob: Pattern,
    negated: bool,
    dir_only: bool,
    anchored: bool,
}

impl IgnorePattern {
    /// Compiles one pattern line.
    ///
    /// Returns `None` for blank lines, comments and globs that fail to
    /// compile; the latter are reported with `warn!`.
    pub fn new(line: &str, source: &str, line_num: usize, scope: &str) -> Option<Self> {
        let trimmed = trim_trailing_spaces(line);
        if trimmed.is_empty() || trimmed.starts_with('#') {
            return None;
        }

        let (negated, body) = match trimmed.strip_prefix('!') {
            Some(rest) => (true, rest),
            None => (false, trimmed),
        };
        let body = body
            .strip_prefix("\\#")
            .map(|rest| format!("#{}", rest))
            .or_else(|| body.strip_prefix("\\!").map(|rest| format!("!{}", rest)))
            .unwrap_or_else(|| body.to_string());

        let (dir_only, body) = match body.strip_suffix('/') {
            Some(rest) => (true, rest.to_string()),
            None => (false, body),
        };
        let anchored = body.contains('/');
        let body = body.trim_start_matches('/');
        if body.is_empty() {
            return None;
        }

        let glob = match Pattern::new(&translate_escapes(body)) {
            Ok(glob) => glob,
            Err(e) => {
                warn!(source, line = line_num, pattern = trimmed, error = %e, "skipping invalid ignore pattern");
                return None;
            }
        };

        Some(IgnorePattern {
            pattern: trimmed.to_string(),
            source: source.to_string(),
            line_num,
            scope: scope.trim_matches('/').to_string(),
            glob,
            negated,
            dir_only,
            anchored,
        })
    }

    /// Returns the pattern text as written, without trailing whitespace.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Returns where the pattern came from; empty for ad-hoc patterns.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Returns the 1-based line number within the source.
    pub fn line_num(&self) -> usize {
        self.line_num
    }

    /// Returns the directory the pattern is rooted at; empty is the root.
    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// Returns true for `!` patterns.
    pub fn is_negated(&self) -> bool {
        self.negated
    }

    /// Evaluates the pattern against a root-relative path.
    ///
    /// Returns `None` if the pattern does not apply, otherwise whether
    /// the path is ignored.
    pub fn verdict(&self, candidate: &str, is_dir: bool) -> Option<bool> {
        if self.dir_only && !is_dir {
            return None;
        }

        let relative = if self.scope.is_empty() {
            candidate
        } else {
            candidate
                .strip_prefix(self.scope.as_str())
                .and_then(|rest| rest.strip_prefix('/'))?
        };

        let subject = if self.anchored {
            relative
        } else {
            relative.rsplit('/').next().unwrap_or(relative)
        };

        if self.glob.matches_with(subject, MATCH_OPTIONS) {
            Some(!self.negated)
        } else {
            None
        }
    }
}

/// Compiles every line of `text` as patterns scoped to `scope`.
pub fn compile(text: &str, source: &str, scope: &str) -> Vec<IgnorePattern> {
    text.lines()
        .enumerate()
        .filter_map(|(i, line)| IgnorePattern::new(line, source, i + 1, scope))
        .collect()
}

/// Reads and compiles an exclude file. A missing file yields no patterns.
pub fn from_file(path: &Path, scope: &str) -> Result<Vec<IgnorePattern>> {
    match read_file(path)? {
        Some(data) => Ok(compile(
            &String::from_utf8_lossy(&data),
            &path.display().to_string(),
            scope,
        )),
        None => Ok(Vec::new()),
    }
}

/// Returns true if the last pattern that applies to `candidate` ignores it.
///
/// `candidate` is relative to the root all scopes are relative to.
pub fn matches(patterns: &[IgnorePattern], candidate: &str, is_dir: bool) -> bool {
    patterns
        .iter()
        .rev()
        .find_map(|p| p.verdict(candidate, is_dir))
        .unwrap_or(false)
}

fn trim_trailing_spaces(line: &str) -> &str {
    let trimmed = line.trim_end_matches(['\r', '\n']);
    let mut end = trimmed.len();
    while end > 0 && trimmed.as_bytes()[end - 1] == b' ' {
        if end >= 2 && trimmed.as_bytes()[end - 2] == b'\\' {
            break;
        }
        end -= 1;
    }
    &trimmed[..end]
}

/// Rewrites backslash escapes into the bracket form the glob engine
/// understands, e.g. `\*` to `[*]`.
fn translate_escapes(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len());
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some(esc @ ('*' | '?' | '[' | ']')) => {
                out.push('[');
                out.push(esc);
                out.push(']');
            }
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}
