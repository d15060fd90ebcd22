//! The User aggregate root.
//!
//! A user owns two embedded keyed collections, tags and todos. Tags and todos
//! never exist outside a user and are persisted only as part of the whole
//! user document.

use crate::keyed::KeyedCollection;
use crate::tag::Tag;
use crate::todo::Todo;
use serde::{Deserialize, Serialize};

crate::entity_id! {
    /// Identifier of a user document.
    UserId
}

/// Version of a stored user document, bumped on every successful save.
///
/// A document that has never been stored is at [`Version::INITIAL`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Version(u64);

impl Version {
    /// The version of a freshly inserted document.
    pub const INITIAL: Self = Self(0);

    /// Creates a version.
    #[must_use]
    pub const fn new(version: u64) -> Self {
        Self(version)
    }

    /// The raw version number.
    #[must_use]
    pub const fn value(&self) -> u64 {
        self.0
    }

    /// The version that follows this one.
    #[must_use]
    pub const fn next(&self) -> Self {
        Self(self.0 + 1)
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A user account with its tags and todos.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Document identifier
    pub id: UserId,
    /// Login name, unique among users that have one
    pub username: Option<String>,
    /// Contact email
    pub email: Option<String>,
    /// Auth-provider token
    #[serde(default)]
    pub token: String,
    /// Tags keyed by id
    #[serde(default)]
    pub tags: KeyedCollection<Tag>,
    /// Todos keyed by id
    #[serde(default)]
    pub todos: KeyedCollection<Todo>,
    /// Stored version this snapshot was read at
    #[serde(default)]
    pub version: Version,
}

impl User {
    /// Creates a user with a username and email and no tags or todos.
    #[must_use]
    pub fn new(username: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            username: Some(username.into()),
            email: Some(email.into()),
            ..Self::default()
        }
    }

    /// Creates a user with neither username nor email (auth-provider-only accounts).
    #[must_use]
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Sets the identifier.
    #[must_use]
    pub fn with_id(mut self, id: UserId) -> Self {
        self.id = id;
        self
    }

    /// Sets the auth-provider token.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = token.into();
        self
    }
}

/// Which parts of a user document a query should return.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UserProjection {
    /// Include the tags collection
    pub tags: bool,
    /// Include the todos collection
    pub todos: bool,
}

impl UserProjection {
    /// Every field.
    pub const ALL: Self = Self {
        tags: true,
        todos: true,
    };

    /// Only the tags collection (plus identity fields).
    pub const TAGS: Self = Self {
        tags: true,
        todos: false,
    };

    /// Only the todos collection (plus identity fields).
    pub const TODOS: Self = Self {
        tags: false,
        todos: true,
    };

    /// Apply the projection to a full document.
    #[must_use]
    pub fn project(self, user: User) -> ProjectedUser {
        ProjectedUser {
            id: user.id,
            username: user.username,
            version: user.version,
            tags: self.tags.then_some(user.tags),
            todos: self.todos.then_some(user.todos),
        }
    }
}

/// A user document with only the projected collections loaded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProjectedUser {
    /// Document identifier
    pub id: UserId,
    /// Login name
    pub username: Option<String>,
    /// Stored version
    pub version: Version,
    /// Tags, if projected
    pub tags: Option<KeyedCollection<Tag>>,
    /// Todos, if projected
    pub todos: Option<KeyedCollection<Todo>>,
}
