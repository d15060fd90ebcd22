//! Error types for the data core.
//!
//! Three layers, each wrapping the previous one where it is surfaced:
//!
//! - [`NotFoundError`]: an update or delete targeted a key that is not in the
//!   collection. Distinguishes tags from todos so callers can match on it.
//! - [`RepositoryError`]: the storage engine refused or failed a request.
//!   Username uniqueness violations land here as [`RepositoryError::Write`].
//! - [`DocumentError`]: what a [`UserDocument`](crate::document::UserDocument)
//!   operation returns, either of the above.

use crate::keyed::EntityId;
use crate::tag::TagId;
use crate::todo::TodoId;
use crate::user::{UserId, Version};
use thiserror::Error;

/// Which embedded collection an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    /// The tags collection
    Tag,
    /// The todos collection
    Todo,
}

impl EntityKind {
    /// Lowercase name for logs and metrics labels.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Tag => "tag",
            Self::Todo => "todo",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An update or delete targeted an identifier absent from its collection.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NotFoundError {
    /// No tag with this id exists.
    #[error("No tag found with id {0}")]
    Tag(TagId),

    /// No todo with this id exists.
    #[error("No todo found with id {0}")]
    Todo(TodoId),
}

impl NotFoundError {
    /// The collection the missing key was looked up in.
    #[must_use]
    pub const fn kind(&self) -> EntityKind {
        match self {
            Self::Tag(_) => EntityKind::Tag,
            Self::Todo(_) => EntityKind::Todo,
        }
    }

    /// The identifier that was not found.
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Tag(id) => id.as_str(),
            Self::Todo(id) => id.as_str(),
        }
    }
}

/// Errors that can occur during repository operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    /// Optimistic concurrency conflict: the stored document moved on since it was loaded.
    #[error("Concurrency conflict on user {user_id}: expected version {expected}, found {actual}")]
    ConcurrencyConflict {
        /// The user document that was written concurrently.
        user_id: UserId,
        /// The version the writer loaded.
        expected: Version,
        /// The version currently stored.
        actual: Version,
    },

    /// The document to save does not exist in storage.
    #[error("User not found: {0}")]
    UserNotFound(UserId),

    /// The storage engine rejected a write (constraint violation and similar).
    #[error("Write rejected: {0}")]
    Write(String),

    /// Database connection or query error.
    #[error("Database error: {0}")]
    Database(String),

    /// Document (de)serialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type alias for repository operations.
pub type RepositoryResult<T> = std::result::Result<T, RepositoryError>;

/// Failure of a document operation on the User aggregate.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DocumentError {
    /// The targeted tag or todo does not exist. Nothing was written.
    #[error(transparent)]
    NotFound(#[from] NotFoundError),

    /// Persisting the document failed. The in-memory document is unchanged.
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl DocumentError {
    /// Returns the not-found error if this is one.
    #[must_use]
    pub const fn as_not_found(&self) -> Option<&NotFoundError> {
        match self {
            Self::NotFound(e) => Some(e),
            Self::Repository(_) => None,
        }
    }
}
