//! Todo value object and its patch.

use crate::error::NotFoundError;
use crate::keyed::{Keyed, Patch};
use crate::tag::TagId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

crate::entity_id! {
    /// Identifier of a todo, unique within its owning user.
    TodoId
}

/// A single scheduled todo.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Todo {
    /// Unique identifier (blank until assigned)
    pub id: TodoId,
    /// Short title
    pub title: String,
    /// Free-form details
    pub details: String,
    /// When the todo is scheduled to start
    pub time_start: DateTime<Utc>,
    /// Whether the todo is done
    pub completed: bool,
    /// Tag this todo is filed under (not checked against the user's tags)
    pub tag_id: TagId,
}

impl Todo {
    /// Creates an open todo without an identifier.
    #[must_use]
    pub fn new(
        title: impl Into<String>,
        details: impl Into<String>,
        time_start: DateTime<Utc>,
        tag_id: TagId,
    ) -> Self {
        Self {
            id: TodoId::blank(),
            title: title.into(),
            details: details.into(),
            time_start,
            completed: false,
            tag_id,
        }
    }

    /// Sets the identifier.
    #[must_use]
    pub fn with_id(mut self, id: TodoId) -> Self {
        self.id = id;
        self
    }

    /// Sets the completed flag.
    #[must_use]
    pub const fn with_completed(mut self, completed: bool) -> Self {
        self.completed = completed;
        self
    }

    /// Marks the todo as completed
    pub const fn complete(&mut self) {
        self.completed = true;
    }
}

impl Keyed for Todo {
    type Id = TodoId;

    fn id(&self) -> &TodoId {
        &self.id
    }

    fn set_id(&mut self, id: TodoId) {
        self.id = id;
    }

    fn not_found(id: TodoId) -> NotFoundError {
        NotFoundError::Todo(id)
    }
}

/// Partial update of a todo. `None` leaves a field untouched; `Some(false)`
/// and `Some(String::new())` are real values and are written.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TodoPatch {
    /// Todo to update
    pub id: TodoId,
    /// New title
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// New details
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    /// New start time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_start: Option<DateTime<Utc>>,
    /// New completed flag
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
    /// New tag reference
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag_id: Option<TagId>,
}

impl TodoPatch {
    /// A patch targeting `id` that changes nothing yet.
    #[must_use]
    pub fn new(id: TodoId) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }

    /// A patch that overwrites every mutable field with `todo`'s values.
    #[must_use]
    pub fn replacing(todo: Todo) -> Self {
        Self {
            id: todo.id,
            title: Some(todo.title),
            details: Some(todo.details),
            time_start: Some(todo.time_start),
            completed: Some(todo.completed),
            tag_id: Some(todo.tag_id),
        }
    }

    /// Set the title.
    #[must_use]
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Set the details.
    #[must_use]
    pub fn details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Set the start time.
    #[must_use]
    pub const fn time_start(mut self, time_start: DateTime<Utc>) -> Self {
        self.time_start = Some(time_start);
        self
    }

    /// Set the completed flag.
    #[must_use]
    pub const fn completed(mut self, completed: bool) -> Self {
        self.completed = Some(completed);
        self
    }

    /// Set the tag reference.
    #[must_use]
    pub fn tag_id(mut self, tag_id: TagId) -> Self {
        self.tag_id = Some(tag_id);
        self
    }
}

impl Patch for TodoPatch {
    type Target = Todo;

    fn target(&self) -> &TodoId {
        &self.id
    }

    fn apply(self, todo: &mut Todo) {
        if let Some(title) = self.title {
            todo.title = title;
        }
        if let Some(details) = self.details {
            todo.details = details;
        }
        if let Some(time_start) = self.time_start {
            todo.time_start = time_start;
        }
        if let Some(completed) = self.completed {
            todo.completed = completed;
        }
        if let Some(tag_id) = self.tag_id {
            todo.tag_id = tag_id;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Todo {
        Todo::new("todo1", "details", Utc::now(), TagId::from("tagId"))
            .with_id(TodoId::from("1"))
    }

    #[test]
    fn new_todo_is_open() {
        let todo = sample();
        assert!(!todo.completed);
        assert_eq!(todo.tag_id, TagId::from("tagId"));
    }

    #[test]
    fn complete_sets_flag() {
        let mut todo = sample();
        todo.complete();
        assert!(todo.completed);
    }

    #[test]
    fn explicit_false_overwrites() {
        let mut todo = sample().with_completed(true);
        TodoPatch::new(todo.id.clone()).completed(false).apply(&mut todo);
        assert!(!todo.completed);
    }

    #[test]
    fn empty_patch_changes_nothing() {
        let original = sample();
        let mut todo = original.clone();
        TodoPatch::new(todo.id.clone()).apply(&mut todo);
        assert_eq!(todo, original);
    }

    #[test]
    fn replacing_patch_overwrites_all_fields_but_id() {
        let mut todo = sample();
        let replacement = Todo::new("other", "more", Utc::now(), TagId::from("t2"))
            .with_id(todo.id.clone())
            .with_completed(true);

        TodoPatch::replacing(replacement.clone()).apply(&mut todo);
        assert_eq!(todo, replacement);
    }
}
