//! Tag value object and its patch.

use crate::error::NotFoundError;
use crate::keyed::{Keyed, Patch};
use serde::{Deserialize, Serialize};

crate::entity_id! {
    /// Identifier of a tag, unique within its owning user.
    TagId
}

/// A label a user attaches to todos.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    /// Unique identifier (blank until assigned)
    pub id: TagId,
    /// Display name
    pub name: String,
    /// Color token
    pub color: String,
}

impl Tag {
    /// Creates a tag without an identifier.
    #[must_use]
    pub fn new(name: impl Into<String>, color: impl Into<String>) -> Self {
        Self {
            id: TagId::blank(),
            name: name.into(),
            color: color.into(),
        }
    }

    /// Sets the identifier.
    #[must_use]
    pub fn with_id(mut self, id: TagId) -> Self {
        self.id = id;
        self
    }
}

impl Keyed for Tag {
    type Id = TagId;

    fn id(&self) -> &TagId {
        &self.id
    }

    fn set_id(&mut self, id: TagId) {
        self.id = id;
    }

    fn not_found(id: TagId) -> NotFoundError {
        NotFoundError::Tag(id)
    }
}

/// Partial update of a tag. `None` leaves a field untouched.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagPatch {
    /// Tag to update
    pub id: TagId,
    /// New name, if changing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// New color, if changing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl TagPatch {
    /// A patch targeting `id` that changes nothing yet.
    #[must_use]
    pub fn new(id: TagId) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }

    /// Set the name.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the color.
    #[must_use]
    pub fn color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }
}

impl Patch for TagPatch {
    type Target = Tag;

    fn target(&self) -> &TagId {
        &self.id
    }

    fn apply(self, tag: &mut Tag) {
        if let Some(name) = self.name {
            tag.name = name;
        }
        if let Some(color) = self.color {
            tag.color = color;
        }
    }
}
