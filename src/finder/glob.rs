//! Glob patterns for include/exclude rules
//!
//! `**` matches across directories, `*` and `?` stay within one segment,
//! `{a,b}` is alternation, and a run of `/` matches one or more slashes.
//! Patterns are anchored at both ends of the relative path.

use regex::Regex;

use crate::{Error, Result};

#[derive(Debug, Clone)]
pub struct GlobMatcher {
    pattern: String,
    regex: Regex,
    /// Literal text every match must start with
    prefix: String,
}

impl GlobMatcher {
    pub fn new(pattern: &str) -> Result<Self> {
        let invalid = |reason: &str| Error::InvalidGlob {
            pattern: pattern.to_string(),
            reason: reason.to_string(),
        };

        let mut source = String::from("^");
        let mut prefix = String::new();
        let mut prefix_done = false;
        let mut depth = 0usize;
        let mut chars = pattern.chars().peekable();

        while let Some(c) = chars.next() {
            let literal = match c {
                '*' => {
                    if chars.peek() == Some(&'*') {
                        chars.next();
                        source.push_str(".*");
                    } else {
                        source.push_str("[^/]*");
                    }
                    false
                }
                '?' => {
                    source.push_str("[^/]");
                    false
                }
                '{' => {
                    depth += 1;
                    source.push_str("(?:");
                    false
                }
                '}' if depth > 0 => {
                    depth -= 1;
                    source.push(')');
                    false
                }
                ',' if depth > 0 => {
                    source.push('|');
                    false
                }
                '/' => {
                    while chars.peek() == Some(&'/') {
                        chars.next();
                    }
                    source.push_str("/+");
                    if !prefix_done {
                        prefix.push('/');
                        prefix_done = true;
                    }
                    continue;
                }
                other => {
                    source.push_str(&regex::escape(&other.to_string()));
                    true
                }
            };

            if !prefix_done {
                if literal {
                    prefix.push(c);
                } else {
                    prefix_done = true;
                }
            }
        }

        if depth > 0 {
            return Err(invalid("unclosed `{`"));
        }
        source.push('$');

        let regex = Regex::new(&source).map_err(|e| invalid(&e.to_string()))?;
        Ok(Self {
            pattern: pattern.to_string(),
            regex,
            prefix,
        })
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn is_match(&self, path: &str) -> bool {
        if !path.starts_with(&self.prefix) {
            return false;
        }
        self.regex.is_match(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn glob(pattern: &str) -> GlobMatcher {
        GlobMatcher::new(pattern).unwrap()
    }

    #[test]
    fn test_star_stays_in_segment() {
        let g = glob("src/*.php");
        assert!(g.is_match("src/A.php"));
        assert!(!g.is_match("src/sub/A.php"));
        assert!(!g.is_match("lib/A.php"));
    }

    #[test]
    fn test_double_star_crosses_directories() {
        let g = glob("tests/**/*Attribute*.php");
        assert!(g.is_match("tests/Suspects/MethodAttributeB.php"));
        assert!(g.is_match("tests/a/b/ClassAttributeA.php"));
        assert!(!g.is_match("tests/Suspects/MyClass.php"));
        assert!(glob("**.php").is_match("deep/down/x.php"));
    }

    #[test]
    fn test_alternation_and_question_mark() {
        let g = glob("src/{Model,View}/?.php");
        assert!(g.is_match("src/Model/A.php"));
        assert!(g.is_match("src/View/B.php"));
        assert!(!g.is_match("src/Controller/C.php"));
        assert!(!g.is_match("src/Model/AB.php"));
        // commas outside braces are literal
        assert!(glob("a,b.php").is_match("a,b.php"));
    }

    #[test]
    fn test_repeated_slashes() {
        let g = glob("src//lib/*.php");
        assert!(g.is_match("src/lib/a.php"));
        assert!(g.is_match("src//lib/a.php"));
    }

    #[test]
    fn test_regex_metacharacters_are_literal() {
        let g = glob("a+b (1).php");
        assert!(g.is_match("a+b (1).php"));
        assert!(!g.is_match("aab (1)xphp"));
    }

    #[test]
    fn test_unclosed_brace() {
        assert!(matches!(GlobMatcher::new("src/{a,b"), Err(Error::InvalidGlob { .. })));
    }
}
