//! Path name parsing, canonicalization, and shell-style glob matching.
//!
//! A path name is `user-identity/path/elements`; the user identity is
//! `local@domain`, optionally carrying a `+suffix`, and the root is
//! `user/` with no further elements. Paths are compared after
//! canonicalization: lower-cased domain, trimmed local part, and cleaned
//! (collapsed, no leading/trailing) slashes between elements.
//!
//! Full IDNA/PRECIS folding is out of scope here: the corpus this crate was
//! grown from carries no Unicode-normalization dependency, so
//! canonicalization is limited to ASCII case-folding of the domain and
//! whitespace/slash cleanup. Non-ASCII local parts pass through unchanged.

use std::fmt;

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum PathError {
    #[error("path name is empty")]
    Empty,
    #[error("missing '@' in user identity '{0}'")]
    MissingAt(String),
    #[error("empty local part in user identity '{0}'")]
    EmptyLocalPart(String),
    #[error("empty domain in user identity '{0}'")]
    EmptyDomain(String),
}

/// A user identity: `local@domain`, optionally carrying a `+suffix` on the
/// local part (e.g. `alice+work@example.com`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UserName {
    pub local: String,
    pub suffix: Option<String>,
    pub domain: String,
}

impl UserName {
    pub fn parse(s: &str) -> Result<Self, PathError> {
        let at = s.find('@').ok_or_else(|| PathError::MissingAt(s.to_string()))?;
        let (local_full, domain_raw) = (&s[..at], &s[at + 1..]);
        if local_full.is_empty() {
            return Err(PathError::EmptyLocalPart(s.to_string()));
        }
        if domain_raw.is_empty() {
            return Err(PathError::EmptyDomain(s.to_string()));
        }
        let (local, suffix) = match local_full.split_once('+') {
            Some((l, suf)) => (l.to_string(), Some(suf.to_string())),
            None => (local_full.to_string(), None),
        };
        Ok(UserName {
            local,
            suffix,
            domain: domain_raw.to_ascii_lowercase(),
        })
    }
}

impl fmt::Display for UserName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.suffix {
            Some(suf) => write!(f, "{}+{}@{}", self.local, suf, self.domain),
            None => write!(f, "{}@{}", self.local, self.domain),
        }
    }
}

/// A parsed, canonical path name: a user identity plus zero or more path
/// elements. `user/` (no elements) denotes the user's root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathName {
    pub user: UserName,
    pub elements: Vec<String>,
}

impl PathName {
    pub fn parse(s: &str) -> Result<Self, PathError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(PathError::Empty);
        }
        let mut parts = s.splitn(2, '/');
        let user_str = parts.next().unwrap();
        let user = UserName::parse(user_str)?;

        let rest = parts.next().unwrap_or("");
        let elements: Vec<String> = rest
            .split('/')
            .map(|e| e.trim())
            .filter(|e| !e.is_empty())
            .map(str::to_string)
            .collect();

        Ok(PathName { user, elements })
    }

    pub fn is_root(&self) -> bool {
        self.elements.is_empty()
    }

    /// The parent path, or `None` if this is already the root.
    pub fn parent(&self) -> Option<PathName> {
        if self.elements.is_empty() {
            return None;
        }
        Some(PathName {
            user: self.user.clone(),
            elements: self.elements[..self.elements.len() - 1].to_vec(),
        })
    }

    /// The final element name, or `None` at the root.
    pub fn last(&self) -> Option<&str> {
        self.elements.last().map(String::as_str)
    }

    pub fn child(&self, name: &str) -> PathName {
        let mut elements = self.elements.clone();
        elements.push(name.to_string());
        PathName {
            user: self.user.clone(),
            elements,
        }
    }

    /// Canonical string form: `local[+suffix]@domain[/el1/el2/...]`.
    pub fn canonical(&self) -> String {
        if self.elements.is_empty() {
            format!("{}/", self.user)
        } else {
            format!("{}/{}", self.user, self.elements.join("/"))
        }
    }
}

impl fmt::Display for PathName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical())
    }
}

/// Glob metacharacters recognized in a single path element: `* ? [ ]`.
/// The user-identity component is always matched literally, even if it
/// contains characters that would otherwise be metacharacters.
pub fn has_glob_metacharacters(element: &str) -> bool {
    element.contains(['*', '?', '[', ']'])
}

/// Shell-style match of a single path element against a pattern
/// (supports `*`, `?`, and `[...]` character classes; no `**`).
pub fn glob_match_element(pattern: &str, name: &str) -> bool {
    fn match_here(pat: &[char], name: &[char]) -> bool {
        match pat.first() {
            None => name.is_empty(),
            Some('*') => {
                (0..=name.len()).any(|i| match_here(&pat[1..], &name[i..]))
            }
            Some('?') => !name.is_empty() && match_here(&pat[1..], &name[1..]),
            Some('[') => {
                let Some(close) = pat.iter().position(|c| *c == ']') else {
                    return !name.is_empty() && pat[0] == name[0] && match_here(&pat[1..], &name[1..]);
                };
                if name.is_empty() {
                    return false;
                }
                let class = &pat[1..close];
                let (negate, class) = match class.first() {
                    Some('!') => (true, &class[1..]),
                    _ => (false, class),
                };
                let matched = class_matches(class, name[0]);
                if matched != negate {
                    match_here(&pat[close + 1..], &name[1..])
                } else {
                    false
                }
            }
            Some(c) => !name.is_empty() && *c == name[0] && match_here(&pat[1..], &name[1..]),
        }
    }

    fn class_matches(class: &[char], c: char) -> bool {
        let mut i = 0;
        while i < class.len() {
            if i + 2 < class.len() && class[i + 1] == '-' {
                if c >= class[i] && c <= class[i + 2] {
                    return true;
                }
                i += 3;
            } else {
                if class[i] == c {
                    return true;
                }
                i += 1;
            }
        }
        false
    }

    let pat: Vec<char> = pattern.chars().collect();
    let name: Vec<char> = name.chars().collect();
    match_here(&pat, &name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_is_idempotent_under_canonicalization() {
        let cases = ["Alice@Example.com/a/b", "bob+work@EXAMPLE.org/", "carol@x.io/one/two/three"];
        for s in cases {
            let first = PathName::parse(s).unwrap();
            let second = PathName::parse(&first.canonical()).unwrap();
            assert_eq!(first, second, "round trip failed for {s}");
        }
    }

    #[test]
    fn root_has_no_elements() {
        let p = PathName::parse("alice@example.com/").unwrap();
        assert!(p.is_root());
        assert_eq!(p.canonical(), "alice@example.com/");
    }

    #[test]
    fn rejects_missing_at() {
        assert_eq!(PathName::parse("not-a-user/path"), Err(PathError::MissingAt("not-a-user".into())));
    }

    #[test]
    fn glob_star_matches_any_run() {
        assert!(glob_match_element("*.txt", "report.txt"));
        assert!(!glob_match_element("*.txt", "report.md"));
    }

    #[test]
    fn glob_question_matches_single_char() {
        assert!(glob_match_element("file?.txt", "file1.txt"));
        assert!(!glob_match_element("file?.txt", "file12.txt"));
    }

    #[test]
    fn glob_character_class() {
        assert!(glob_match_element("file[0-9].txt", "file5.txt"));
        assert!(!glob_match_element("file[0-9].txt", "filea.txt"));
        assert!(glob_match_element("file[!0-9].txt", "filea.txt"));
    }
}
