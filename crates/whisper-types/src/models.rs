use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Whisper categories. Stored and transmitted in lowercase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    #[default]
    General,
    Confession,
    Advice,
    Question,
    Thought,
    Story,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::General,
        Category::Confession,
        Category::Advice,
        Category::Question,
        Category::Thought,
        Category::Story,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::General => "general",
            Self::Confession => "confession",
            Self::Advice => "advice",
            Self::Question => "question",
            Self::Thought => "thought",
            Self::Story => "story",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown category '{0}'")]
pub struct UnknownCategory(pub String);

impl FromStr for Category {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| UnknownCategory(s.to_string()))
    }
}

/// Category selector used when browsing. `All` applies no filter at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CategoryFilter {
    #[default]
    All,
    Only(Category),
}

impl CategoryFilter {
    pub fn category(&self) -> Option<Category> {
        match self {
            Self::All => None,
            Self::Only(c) => Some(*c),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Only(c) => c.as_str(),
        }
    }
}

impl From<Option<Category>> for CategoryFilter {
    fn from(value: Option<Category>) -> Self {
        value.map_or(Self::All, Self::Only)
    }
}

impl FromStr for CategoryFilter {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() || s == "all" {
            return Ok(Self::All);
        }
        s.parse().map(Self::Only)
    }
}

/// Ordering of the whisper wall.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortMode {
    /// Newest first
    #[default]
    Recent,
    /// Most liked first
    Popular,
    /// Most commented first
    Discussed,
}

impl SortMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Recent => "recent",
            Self::Popular => "popular",
            Self::Discussed => "discussed",
        }
    }
}

impl FromStr for SortMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "recent" => Ok(Self::Recent),
            "popular" => Ok(Self::Popular),
            "discussed" => Ok(Self::Discussed),
            other => Err(format!("unknown sort mode '{}'", other)),
        }
    }
}

/// A whisper as seen by a particular viewer.
///
/// `author_id` is only populated when the whisper is attributed or the
/// viewer wrote it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Whisper {
    pub id: Uuid,
    pub content: String,
    pub category: Category,
    pub is_anonymous: bool,
    pub author_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub likes_count: u32,
    pub comments_count: u32,
    #[serde(default)]
    pub user_has_liked: bool,
    #[serde(default)]
    pub is_own: bool,
}

impl Whisper {
    pub fn like_state(&self) -> LikeState {
        LikeState {
            liked: self.user_has_liked,
            likes_count: self.likes_count,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: Uuid,
    pub whisper_id: Uuid,
    pub content: String,
    pub is_anonymous: bool,
    pub author_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub likes_count: u32,
    #[serde(default)]
    pub user_has_liked: bool,
    #[serde(default)]
    pub is_own: bool,
}

impl Comment {
    pub fn like_state(&self) -> LikeState {
        LikeState {
            liked: self.user_has_liked,
            likes_count: self.likes_count,
        }
    }
}

/// What a like points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LikeTarget {
    Whisper,
    Comment,
}

/// Membership of one user in a likes relation plus the parent's counter,
/// both read inside the same transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LikeState {
    pub liked: bool,
    pub likes_count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub user_id: Uuid,
    pub email: String,
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Profile {
    /// Up to two uppercase initials from the display name, `U` when unnamed.
    pub fn initials(&self) -> String {
        let initials: String = self
            .full_name
            .as_deref()
            .unwrap_or_default()
            .split_whitespace()
            .filter_map(|part| part.chars().next())
            .flat_map(char::to_uppercase)
            .take(2)
            .collect();

        if initials.is_empty() {
            "U".to_string()
        } else {
            initials
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHistoryItem {
    pub id: Uuid,
    pub search_term: String,
    pub category: Option<Category>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_filter_parses_to_no_category() {
        let all: CategoryFilter = "all".parse().unwrap();
        assert_eq!(all, CategoryFilter::All);
        assert_eq!(all.category(), None);
        assert_eq!(CategoryFilter::from(None), all);

        let story: CategoryFilter = "story".parse().unwrap();
        assert_eq!(story.category(), Some(Category::Story));
        assert!("poems".parse::<CategoryFilter>().is_err());
    }

    #[test]
    fn category_serializes_lowercase() {
        let json = serde_json::to_string(&Category::Confession).unwrap();
        assert_eq!(json, "\"confession\"");
        for c in Category::ALL {
            assert_eq!(c.as_str().parse::<Category>().unwrap(), c);
        }
    }

    #[test]
    fn profile_initials() {
        let mut profile = Profile {
            user_id: Uuid::new_v4(),
            email: "a@b.c".into(),
            full_name: Some("ada mary lovelace".into()),
            avatar_url: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert_eq!(profile.initials(), "AM");

        profile.full_name = None;
        assert_eq!(profile.initials(), "U");
    }
}
