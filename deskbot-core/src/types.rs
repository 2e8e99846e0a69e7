//! Core domain types for deskbot
//!
//! ## Terminology
//!
//! | Term | Definition |
//! |------|------------|
//! | **Catalog** | The static device/model/number/question tree, fixed at startup |
//! | **Solution** | Authored answer for one question: text plus optional content |
//! | **Token** | Short opaque id standing in for a full path + question text |
//! | **Action** | One user-initiated menu transition, logged for statistics |
//! | **Snapshot** | Persisted per-date aggregate of the action log |
//!
//! The chat transport is not modeled here; it delivers `(user, payload)`
//! events and receives a [`Render`] instruction back.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// ============================================
// Solutions and content
// ============================================

/// Kind of content attached to a solution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    /// Text-only solution
    #[default]
    None,
    /// A JPEG under the images tree
    Image,
    /// A PDF under the files tree
    File,
}

impl ContentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::None => "none",
            ContentKind::Image => "image",
            ContentKind::File => "file",
        }
    }
}

impl std::str::FromStr for ContentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(ContentKind::None),
            "image" => Ok(ContentKind::Image),
            "file" => Ok(ContentKind::File),
            _ => Err(format!("unknown content kind: {}", s)),
        }
    }
}

/// A pre-authored answer to a known issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Solution {
    /// Reply text shown to the user
    pub text: String,
    /// Attached content, if any
    #[serde(default)]
    pub content_kind: ContentKind,
}

impl Solution {
    /// Text-only solution.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            content_kind: ContentKind::None,
        }
    }

    /// Solution with attached content.
    pub fn with_content(text: impl Into<String>, kind: ContentKind) -> Self {
        Self {
            text: text.into(),
            content_kind: kind,
        }
    }
}

// ============================================
// Action log
// ============================================

/// Menu transitions recorded in the action log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    Start,
    DeviceSelected,
    ModelSelected,
    NumberSelected,
    QuestionSelected,
    OtherSelected,
}

impl ActionType {
    /// Identifier used in database storage
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::Start => "start",
            ActionType::DeviceSelected => "device_selected",
            ActionType::ModelSelected => "model_selected",
            ActionType::NumberSelected => "number_selected",
            ActionType::QuestionSelected => "question_selected",
            ActionType::OtherSelected => "other_selected",
        }
    }
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ActionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "start" => Ok(ActionType::Start),
            "device_selected" => Ok(ActionType::DeviceSelected),
            "model_selected" => Ok(ActionType::ModelSelected),
            "number_selected" => Ok(ActionType::NumberSelected),
            "question_selected" => Ok(ActionType::QuestionSelected),
            "other_selected" => Ok(ActionType::OtherSelected),
            _ => Err(format!("unknown action type: {}", s)),
        }
    }
}

/// Stable identity for a chat user, as delivered by the transport.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserInfo {
    /// External user id (transport-assigned, stable)
    pub id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl UserInfo {
    pub fn new(id: i64) -> Self {
        Self {
            id,
            ..Default::default()
        }
    }
}

/// Materialized per-user profile row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    /// Set on first contact, never updated afterwards
    pub first_seen: DateTime<Utc>,
    /// Refreshed on every action
    pub last_seen: DateTime<Utc>,
}

/// One appended row of the action log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionRecord {
    pub id: i64,
    pub user_id: i64,
    pub action_type: ActionType,
    pub device_type: Option<String>,
    pub model: Option<String>,
    pub number: Option<String>,
    pub question: Option<String>,
    pub timestamp: DateTime<Utc>,
}

// ============================================
// Render instructions
// ============================================

/// One inline menu button: label plus the callback payload the transport
/// echoes back when pressed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuButton {
    pub label: String,
    pub callback: String,
}

impl MenuButton {
    pub fn new(label: impl Into<String>, callback: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            callback: callback.into(),
        }
    }
}

/// Instruction handed back to the chat transport.
///
/// The transport owns delivery, retries, and message editing; the core only
/// decides what to show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Render {
    /// Text message with an inline button grid
    Menu {
        text: String,
        rows: Vec<Vec<MenuButton>>,
    },
    /// Solution delivery: caption text, optional content to attach, and a
    /// back row so the user can return to the question menu
    Content {
        caption: String,
        kind: ContentKind,
        path: Option<PathBuf>,
        rows: Vec<Vec<MenuButton>>,
    },
    /// Plain notice with no buttons
    Notice { text: String },
}

impl Render {
    pub fn notice(text: impl Into<String>) -> Self {
        Render::Notice { text: text.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn action_type_round_trip() {
        for action in [
            ActionType::Start,
            ActionType::DeviceSelected,
            ActionType::ModelSelected,
            ActionType::NumberSelected,
            ActionType::QuestionSelected,
            ActionType::OtherSelected,
        ] {
            assert_eq!(ActionType::from_str(action.as_str()).unwrap(), action);
        }
        assert!(ActionType::from_str("bogus").is_err());
    }

    #[test]
    fn content_kind_default_is_none() {
        let solution = Solution::text("answer");
        assert_eq!(solution.content_kind, ContentKind::None);
        assert_eq!(ContentKind::from_str("image").unwrap(), ContentKind::Image);
    }
}
