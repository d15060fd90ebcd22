//! Persistence port for User documents.
//!
//! The storage engine is an external collaborator. This module defines what
//! the data core needs from it:
//!
//! - insert a new document, enforcing sparse username uniqueness
//! - save a whole document with an optimistic version check
//! - find by id, find one by query with a projection
//! - delete by id
//!
//! # Implementations
//!
//! - `PostgresUserRepository` (in `simpodo-postgres`): JSONB document table
//! - `InMemoryUserRepository` (in `simpodo-testing`): fast, deterministic tests

use crate::error::RepositoryResult;
use crate::tag::TagId;
use crate::todo::{Todo, TodoId};
use crate::user::{ProjectedUser, User, UserId, UserProjection, Version};
use futures::future::BoxFuture;
use std::future::Future;
use std::sync::Arc;

/// Criteria for [`UserRepository::find_one`]. Every set field must match.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UserQuery {
    /// Match this document id
    pub id: Option<UserId>,
    /// Match this username
    pub username: Option<String>,
    /// Match documents containing a tag with this id
    pub has_tag: Option<TagId>,
    /// Match documents containing a todo with this id
    pub has_todo: Option<TodoId>,
}

impl UserQuery {
    /// Query by document id.
    #[must_use]
    pub fn by_id(id: UserId) -> Self {
        Self {
            id: Some(id),
            ..Self::default()
        }
    }

    /// Query by username.
    #[must_use]
    pub fn by_username(username: impl Into<String>) -> Self {
        Self {
            username: Some(username.into()),
            ..Self::default()
        }
    }

    /// Also require a tag with this id.
    #[must_use]
    pub fn with_tag(mut self, tag_id: TagId) -> Self {
        self.has_tag = Some(tag_id);
        self
    }

    /// Also require a todo with this id.
    #[must_use]
    pub fn with_todo(mut self, todo_id: TodoId) -> Self {
        self.has_todo = Some(todo_id);
        self
    }

    /// Whether a document satisfies this query.
    ///
    /// Storage engines that cannot push the query down can filter with this.
    #[must_use]
    pub fn matches(&self, user: &User) -> bool {
        self.id.as_ref().is_none_or(|id| &user.id == id)
            && self
                .username
                .as_ref()
                .is_none_or(|name| user.username.as_ref() == Some(name))
            && self.has_tag.as_ref().is_none_or(|t| user.tags.contains(t))
            && self.has_todo.as_ref().is_none_or(|t| user.todos.contains(t))
    }
}

/// User document storage.
///
/// Every write replaces the whole document.
pub trait UserRepository: Send + Sync {
    /// Insert a new document at [`Version::INITIAL`].
    ///
    /// # Errors
    ///
    /// - `Write`: a document with this id or username already exists.
    ///   Documents without a username never conflict with each other.
    /// - `Database`/`Serialization`: storage failure
    fn insert(&self, user: &User) -> impl Future<Output = RepositoryResult<()>> + Send;

    /// Replace a stored document, provided it is still at `expected`.
    ///
    /// Returns the new stored version.
    ///
    /// # Errors
    ///
    /// - `ConcurrencyConflict`: the stored version is not `expected`
    /// - `UserNotFound`: no document with this id
    /// - `Write`: the new username collides with another document
    /// - `Database`/`Serialization`: storage failure
    fn save(
        &self,
        user: &User,
        expected: Version,
    ) -> impl Future<Output = RepositoryResult<Version>> + Send;

    /// Load a document by id.
    ///
    /// # Errors
    ///
    /// Returns `Database`/`Serialization` on storage failure. A missing
    /// document is `Ok(None)`.
    fn find_by_id(&self, id: &UserId) -> impl Future<Output = RepositoryResult<Option<User>>> + Send;

    /// Load the first document matching `query`, with only the projected collections.
    ///
    /// # Errors
    ///
    /// Returns `Database`/`Serialization` on storage failure.
    fn find_one(
        &self,
        query: &UserQuery,
        projection: UserProjection,
    ) -> impl Future<Output = RepositoryResult<Option<ProjectedUser>>> + Send;

    /// Delete a document, returning it if it existed.
    ///
    /// # Errors
    ///
    /// Returns `Database`/`Serialization` on storage failure.
    fn delete_by_id(&self, id: &UserId) -> impl Future<Output = RepositoryResult<Option<User>>> + Send;
}

/// Loads a user's todos for store hydration.
///
/// # Dyn Compatibility
///
/// Returns a boxed future so the source can be held as `Arc<dyn TodoSource>`
/// inside a store environment and captured by effects.
pub trait TodoSource: Send + Sync {
    /// All todos of `user_id` in stored order.
    ///
    /// # Errors
    ///
    /// - `UserNotFound`: no such user
    /// - any storage error of the underlying repository
    fn load_todos(&self, user_id: UserId) -> BoxFuture<'_, RepositoryResult<Vec<Todo>>>;
}

/// Serves [`TodoSource`] from any [`UserRepository`] with a todos-only projection.
#[derive(Debug)]
pub struct RepositoryTodoSource<R> {
    repository: Arc<R>,
}

impl<R> RepositoryTodoSource<R> {
    /// Wrap a shared repository.
    #[must_use]
    pub const fn new(repository: Arc<R>) -> Self {
        Self { repository }
    }
}

impl<R> Clone for RepositoryTodoSource<R> {
    fn clone(&self) -> Self {
        Self {
            repository: Arc::clone(&self.repository),
        }
    }
}

impl<R: UserRepository> TodoSource for RepositoryTodoSource<R> {
    fn load_todos(&self, user_id: UserId) -> BoxFuture<'_, RepositoryResult<Vec<Todo>>> {
        Box::pin(async move {
            let query = UserQuery::by_id(user_id.clone());
            let projected = self
                .repository
                .find_one(&query, UserProjection::TODOS)
                .await?
                .ok_or(crate::error::RepositoryError::UserNotFound(user_id))?;
            Ok(projected
                .todos
                .map(crate::keyed::KeyedCollection::into_vec)
                .unwrap_or_default())
        })
    }
}
