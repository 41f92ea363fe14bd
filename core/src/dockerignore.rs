use crate::error::{GraphError, Result};
use regex::Regex;
use std::fs;
use std::path::Path;

pub const DOCKERIGNORE: &str = ".dockerignore";

struct Rule {
    regex: Regex,
    is_exception: bool,
}

/// Exclusion rules of a build context, the parsed `.dockerignore`
///
/// Follows Docker semantics: `*` and `?` stay within one path component, `**` spans any
/// number of them, `!` re-includes, and the last matching rule wins. A matching directory
/// excludes everything below it.
#[derive(Default)]
pub struct DockerIgnore {
    rules: Vec<Rule>,
}

impl DockerIgnore {
    /// Rules of `<context>/.dockerignore`, none if the file does not exist
    pub fn from_context(context: &Path) -> Result<Self> {
        match fs::read_to_string(context.join(DOCKERIGNORE)) {
            Ok(contents) => Self::parse(&contents).map_err(|reason| {
                GraphError::build_context(context, format!("Invalid {DOCKERIGNORE}: {reason}"))
            }),

            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(DockerIgnore::default()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn parse(contents: &str) -> std::result::Result<Self, String> {
        let mut rules = vec![];

        for line in contents.lines().map(str::trim) {
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let (is_exception, pattern) = match line.strip_prefix('!') {
                Some(rest) => (true, rest.trim()),
                None => (false, line),
            };

            let pattern = pattern
                .trim_start_matches("./")
                .trim_start_matches('/')
                .trim_end_matches('/');

            if pattern.is_empty() {
                continue;
            }

            let regex = Regex::new(&format!("^{}(/.*)?$", translate(pattern)))
                .map_err(|e| format!("pattern \"{line}\": {e}"))?;

            rules.push(Rule {
                regex,
                is_exception,
            });
        }

        Ok(DockerIgnore { rules })
    }

    /// Whether a path relative to the context, with `/` separators, is left out of the build
    pub fn is_excluded(&self, relative: &str) -> bool {
        self.rules
            .iter()
            .rev()
            .find(|rule| rule.regex.is_match(relative))
            .is_some_and(|rule| !rule.is_exception)
    }
}

/// Glob to regex, without anchors
fn translate(pattern: &str) -> String {
    let mut regex = String::new();
    let mut chars = pattern.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '*' if chars.peek() == Some(&'*') => {
                chars.next();

                if chars.peek() == Some(&'/') {
                    chars.next();
                    regex.push_str("(.*/)?");
                } else {
                    regex.push_str(".*");
                }
            }

            '*' => regex.push_str("[^/]*"),
            '?' => regex.push_str("[^/]"),

            '[' => {
                regex.push('[');

                if chars.peek() == Some(&'^') || chars.peek() == Some(&'!') {
                    chars.next();
                    regex.push('^');
                }

                for c in chars.by_ref() {
                    if c == ']' {
                        break;
                    }

                    if c == '\\' || c == '[' {
                        regex.push('\\');
                    }

                    regex.push(c);
                }

                regex.push(']');
            }

            '\\' => {
                if let Some(escaped) = chars.next() {
                    regex.push_str(&regex::escape(&escaped.to_string()));
                }
            }

            other => regex.push_str(&regex::escape(&other.to_string())),
        }
    }

    regex
}
