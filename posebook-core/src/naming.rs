//! Sibling name uniqueness and batch renaming

use std::borrow::Cow;

use hashbrown::HashSet;
use regex::Regex;

use crate::error::Result;

/// Make `candidate` unique among `siblings`.
///
/// Returns `candidate` unchanged when free, otherwise the first free
/// `candidate.NNN` (counter from 1, zero padded to three digits). Past 999 the
/// counter keeps growing (`candidate.1000`); at most `siblings.len() + 1`
/// counters are tried, so the result is always free.
/// `siblings` must not include the item being renamed.
pub fn resolve_name_collision<'a, I>(candidate: &str, siblings: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let taken: HashSet<&str> = siblings.into_iter().collect();
    if !taken.contains(candidate) {
        return candidate.to_string();
    }

    let mut counter = 1u32;
    loop {
        let name = format!("{candidate}.{counter:03}");
        if !taken.contains(name.as_str()) {
            return name;
        }
        counter += 1;
    }
}

/// Search / replace applied to pose or bone names
#[derive(Debug, Clone)]
pub enum Renamer {
    Literal { search: String, replace: String },
    /// Replacement uses `$1` / `${name}` group syntax
    Regex { pattern: Regex, replace: String },
}

impl Renamer {
    /// Build a renamer; an invalid pattern fails up front so no name changes
    pub fn new(search: &str, replace: &str, use_regex: bool) -> Result<Self> {
        if use_regex {
            Ok(Renamer::Regex {
                pattern: Regex::new(search)?,
                replace: replace.to_string(),
            })
        } else {
            Ok(Renamer::Literal {
                search: search.to_string(),
                replace: replace.to_string(),
            })
        }
    }

    pub fn apply<'a>(&self, name: &'a str) -> Cow<'a, str> {
        match self {
            // Empty literal search would otherwise insert between every char
            Renamer::Literal { search, .. } if search.is_empty() => Cow::Borrowed(name),
            Renamer::Literal { search, replace } => {
                if name.contains(search.as_str()) {
                    Cow::Owned(name.replace(search.as_str(), replace))
                } else {
                    Cow::Borrowed(name)
                }
            }
            Renamer::Regex { pattern, replace } => pattern.replace_all(name, replace.as_str()),
        }
    }
}

/// One name changed by a batch rename
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenameOutcome {
    pub from: String,
    /// Name actually assigned, after collision resolution
    pub to: String,
    /// Rename result collided with a sibling and got a suffix
    pub conflicted: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_no_collision() {
        assert_eq!(resolve_name_collision("Smile", ["Pose", "Wink"]), "Smile");
    }

    #[test]
    fn test_resolve_first_free_suffix() {
        assert_eq!(resolve_name_collision("Pose", ["Pose", "Pose.001"]), "Pose.002");
        assert_eq!(resolve_name_collision("Pose", ["Pose", "Pose.002"]), "Pose.001");
    }

    #[test]
    fn test_resolve_uses_pre_collision_base() {
        // "Pose.001" collides, suffix goes on the full name
        assert_eq!(resolve_name_collision("Pose.001", ["Pose.001"]), "Pose.001.001");
    }

    #[test]
    fn test_resolve_past_three_digits() {
        let mut names: Vec<String> = (1..=999).map(|i| format!("A.{i:03}")).collect();
        names.push("A".to_string());
        let resolved = resolve_name_collision("A", names.iter().map(String::as_str));
        assert_eq!(resolved, "A.1000");
        assert!(!names.contains(&resolved));
    }

    #[test]
    fn test_literal_rename() {
        let r = Renamer::new("_L", "_R", false).unwrap();
        assert_eq!(r.apply("hand_L"), "hand_R");
        assert!(matches!(r.apply("head"), Cow::Borrowed(_)));

        let empty = Renamer::new("", "x", false).unwrap();
        assert_eq!(empty.apply("head"), "head");
    }

    #[test]
    fn test_regex_rename() {
        let r = Renamer::new(r"^(\w+)\.L$", "${1}_L", true).unwrap();
        assert_eq!(r.apply("arm.L"), "arm_L");
        assert_eq!(r.apply("arm.R"), "arm.R");
    }

    #[test]
    fn test_invalid_regex() {
        assert!(Renamer::new("(", "", true).is_err());
    }
}
