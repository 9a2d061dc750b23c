//! Glob pattern compilation
//!
//! Wildcard syntax:
//! - `*` matches any run of characters within one `/`-separated segment
//! - `**` matches any run of characters, separators included
//! - `?` matches exactly one character
//! - `[abc]`, `[a-z]`, `[!a-z]` match one character from (or outside) a set
//!
//! Everything else is literal, including regex metacharacters.

use regex::Regex;

use crate::error::{Error, Result};
use crate::locator::{DELIMITER, contains_wildcard};

/// A compiled wildcard pattern
#[derive(Debug, Clone)]
pub struct Matcher {
    pattern: String,
    regex: Regex,
}

impl Matcher {
    /// Compile a wildcard pattern into a matcher
    pub fn compile(pattern: &str) -> Result<Self> {
        validate(pattern)?;
        let body = translate(pattern);
        let regex = Regex::new(&format!("^(?s:{body})$"))
            .map_err(|e| Error::InvalidWildcard(format!("{pattern}: {e}")))?;
        Ok(Self {
            pattern: pattern.to_string(),
            regex,
        })
    }

    /// Test a candidate name against the pattern
    pub fn is_match(&self, candidate: &str) -> bool {
        self.regex.is_match(candidate)
    }

    /// The source pattern
    pub fn as_str(&self) -> &str {
        &self.pattern
    }
}

/// Longest wildcard-free leading portion of a pattern
pub fn literal_prefix(pattern: &str) -> &str {
    match pattern.find(['*', '?', '[']) {
        Some(pos) => &pattern[..pos],
        None => pattern,
    }
}

/// Reject `***` and any `**` embedded in a segment that is followed by more
/// wildcard characters.
fn validate(pattern: &str) -> Result<()> {
    if pattern.contains("***") {
        return Err(Error::InvalidWildcard(format!(
            "{pattern}: '***' is not a valid wildcard"
        )));
    }

    let mut search_from = 0;
    while let Some(offset) = pattern[search_from..].find("**") {
        let start = search_from + offset;
        let end = start + 2;
        if !is_full_segment(pattern, start, end) && contains_wildcard(&pattern[end..]) {
            return Err(Error::InvalidWildcard(format!(
                "{pattern}: '**' may only be followed by literal text within a segment"
            )));
        }
        search_from = end;
    }
    Ok(())
}

/// Whether `pattern[start..end]` spans an entire `/`-delimited segment
fn is_full_segment(pattern: &str, start: usize, end: usize) -> bool {
    let starts_segment = start == 0 || pattern[..start].ends_with(DELIMITER);
    let ends_segment = end == pattern.len() || pattern[end..].starts_with(DELIMITER);
    starts_segment && ends_segment
}

fn translate(pattern: &str) -> String {
    let chars: Vec<char> = pattern.chars().collect();
    let mut out = String::with_capacity(pattern.len() * 2);
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            '*' if chars.get(i + 1) == Some(&'*') => {
                let at_segment_start = i == 0 || chars[i - 1] == DELIMITER;
                if at_segment_start && chars.get(i + 2) == Some(&DELIMITER) {
                    // `**/` may also match zero directories
                    out.push_str("(?:.*/)?");
                    i += 3;
                } else {
                    out.push_str(".*");
                    i += 2;
                }
            }
            '*' => {
                out.push_str("[^/]*");
                i += 1;
            }
            '?' => {
                out.push('.');
                i += 1;
            }
            '[' => match translate_class(&chars, i) {
                Some((class, next)) => {
                    out.push_str(&class);
                    i = next;
                }
                None => {
                    out.push_str(r"\[");
                    i += 1;
                }
            },
            c => {
                out.push_str(&regex::escape(c.encode_utf8(&mut [0; 4])));
                i += 1;
            }
        }
    }
    out
}

/// Translate a bracket expression starting at `chars[open]`.
///
/// Returns the regex class and the index just past the closing `]`, or `None`
/// when the bracket is never closed (it is then taken literally).
fn translate_class(chars: &[char], open: usize) -> Option<(String, usize)> {
    let mut j = open + 1;
    let negated = matches!(chars.get(j), Some('!') | Some('^'));
    if negated {
        j += 1;
    }
    let members_start = j;
    // a `]` directly after the opening bracket is a member
    if chars.get(j) == Some(&']') {
        j += 1;
    }
    while chars.get(j)? != &']' {
        j += 1;
    }
    let members = &chars[members_start..j];

    let mut class = String::from("[");
    if negated {
        class.push('^');
    }
    for (k, &c) in members.iter().enumerate() {
        let is_range = c == '-' && k > 0 && k + 1 < members.len();
        if is_range {
            class.push('-');
        } else {
            if matches!(c, '\\' | ']' | '[' | '^' | '-' | '&' | '~') {
                class.push('\\');
            }
            class.push(c);
        }
    }
    class.push(']');
    Some((class, j + 1))
}
