//! Semantic pose categories and name-based guessing

use serde::{Deserialize, Serialize};

/// Facial region a pose belongs to
///
/// Order matches the external tool's morph panel table, see [`PoseCategory::index`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PoseCategory {
    None,
    Eyebrow,
    Eye,
    Mouth,
    #[default]
    Other,
}

impl PoseCategory {
    pub const ALL: [PoseCategory; 5] = [
        PoseCategory::None,
        PoseCategory::Eyebrow,
        PoseCategory::Eye,
        PoseCategory::Mouth,
        PoseCategory::Other,
    ];

    /// Panel index used by the CSV morph table
    pub fn index(self) -> usize {
        self as usize
    }

    /// Inverse of [`Self::index`]; out-of-range maps to `Other`
    pub fn from_index(index: i64) -> Self {
        usize::try_from(index)
            .ok()
            .and_then(|i| Self::ALL.get(i).copied())
            .unwrap_or(PoseCategory::Other)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PoseCategory::None => "NONE",
            PoseCategory::Eyebrow => "EYEBROW",
            PoseCategory::Eye => "EYE",
            PoseCategory::Mouth => "MOUTH",
            PoseCategory::Other => "OTHER",
        }
    }

    /// Parse the upper-case identifier; unknown strings yield `None`
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == s)
    }
}

impl std::fmt::Display for PoseCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which poses a book's list shows
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CategoryFilter {
    #[default]
    All,
    Eyebrow,
    Eye,
    Mouth,
    Other,
}

impl CategoryFilter {
    pub fn matches(self, category: PoseCategory) -> bool {
        match self {
            CategoryFilter::All => true,
            CategoryFilter::Eyebrow => category == PoseCategory::Eyebrow,
            CategoryFilter::Eye => category == PoseCategory::Eye,
            CategoryFilter::Mouth => category == PoseCategory::Mouth,
            CategoryFilter::Other => category == PoseCategory::Other,
        }
    }
}

// ============================================================================
// Guessing
// ============================================================================

const EYEBROW: &[&str] = &["eyebrow", "eyebrows", "brow", "brows", "mayu"];
const EYE: &[&str] = &["eye", "eyes", "iris", "pupil", "pupils", "me", "blink", "wink"];
const MOUTH: &[&str] = &["mouth", "lips", "lip", "kuchibiru", "kuchi"];

/// Guess a category from a pose name.
///
/// The lower-cased name is split on space, `.`, `_` and `/`; the first keyword
/// set containing any token wins, in the order eyebrow, eye, mouth.
pub fn guess_category(pose_name: &str) -> PoseCategory {
    let lower = pose_name.to_lowercase();
    let tokens: Vec<&str> = lower.split([' ', '.', '_', '/']).collect();
    let hit = |set: &[&str]| tokens.iter().any(|t| set.contains(t));

    if hit(EYEBROW) {
        PoseCategory::Eyebrow
    } else if hit(EYE) {
        PoseCategory::Eye
    } else if hit(MOUTH) {
        PoseCategory::Mouth
    } else {
        PoseCategory::Other
    }
}
