//! Board configuration.
//!
//! Limits and defaults applied by the board services when creating and
//! editing tasks.

use crate::board::domain::{BoardDomainError, StoryPoints, TaskKind, TaskStatus, TaskTitle};
use serde::Deserialize;

/// Defaults and limits for board operations.
///
/// Every field is optional when deserialising; missing fields take their
/// [`Default`] value.
///
/// # Examples
///
/// ```
/// use taskboard::board::domain::TaskStatus;
/// use taskboard::config::BoardConfig;
///
/// let config = BoardConfig::default();
/// assert_eq!(config.default_story_status, TaskStatus::Backlog);
///
/// let strict = BoardConfig::strict();
/// assert!(strict.max_story_points < config.max_story_points);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BoardConfig {
    /// Status given to new user stories when the caller names none.
    pub default_story_status: TaskStatus,
    /// Status given to new tasks when the caller names none.
    pub default_task_status: TaskStatus,
    /// Maximum task title length in characters.
    pub max_title_length: usize,
    /// Maximum story point estimate.
    pub max_story_points: u32,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            default_story_status: TaskStatus::Backlog,
            default_task_status: TaskStatus::Todo,
            max_title_length: 255,
            max_story_points: 100,
        }
    }
}

impl BoardConfig {
    /// Creates a configuration with tighter limits.
    ///
    /// Estimates are capped at the largest common planning-poker card.
    #[must_use]
    pub const fn strict() -> Self {
        Self {
            default_story_status: TaskStatus::Backlog,
            default_task_status: TaskStatus::Todo,
            max_title_length: 120,
            max_story_points: 40,
        }
    }

    /// Parses a configuration from JSON.
    ///
    /// # Errors
    ///
    /// Returns the parse error for malformed JSON, unknown fields, or
    /// unknown status values.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Returns the status a new item of `kind` starts in.
    #[must_use]
    pub const fn default_status_for(&self, kind: TaskKind) -> TaskStatus {
        match kind {
            TaskKind::UserStory => self.default_story_status,
            TaskKind::Task { .. } => self.default_task_status,
        }
    }

    /// Checks a title against the length limit.
    ///
    /// # Errors
    ///
    /// Returns [`BoardDomainError::TaskTitleTooLong`] when the title is
    /// longer than `max_title_length`.
    pub fn check_title(&self, title: &TaskTitle) -> Result<(), BoardDomainError> {
        let length = title.char_count();
        if length > self.max_title_length {
            return Err(BoardDomainError::TaskTitleTooLong {
                length,
                max: self.max_title_length,
            });
        }
        Ok(())
    }

    /// Checks an estimate against the story point limit.
    ///
    /// # Errors
    ///
    /// Returns [`BoardDomainError::StoryPointsOutOfRange`] when the estimate
    /// exceeds `max_story_points`.
    pub fn check_story_points(
        &self,
        story_points: Option<StoryPoints>,
    ) -> Result<(), BoardDomainError> {
        if let Some(points) = story_points
            && points.value() > self.max_story_points
        {
            return Err(BoardDomainError::StoryPointsOutOfRange {
                value: points.value(),
                max: self.max_story_points,
            });
        }
        Ok(())
    }
}
