//! Async document operations on the User aggregate.
//!
//! A [`UserDocument`] is a loaded user plus the repository it came from. Its
//! tag and todo operations run the [`KeyedCollection`](crate::keyed::KeyedCollection)
//! contract on a working copy, then persist the whole document in one write:
//!
//! 1. a missing target fails with [`DocumentError::NotFound`] and nothing is written;
//! 2. the write carries the version the document was loaded at, so a
//!    concurrent writer is reported as `ConcurrencyConflict` instead of being
//!    silently overwritten;
//! 3. only a successful write updates the in-memory document.
//!
//! Nothing is retried. A caller that hits a conflict can [`reload`](UserDocument::reload)
//! and try again.
//!
//! # Example
//!
//! ```ignore
//! let mut doc = UserDocument::load(repo, Arc::new(UuidIdGenerator), &user_id).await?;
//! let tag = doc.add_tag(Tag::new("work", "salmon")).await?;
//! doc.update_tag(TagPatch::new(tag.id.clone()).name("deep work")).await?;
//! ```

use crate::environment::IdGenerator;
use crate::error::{DocumentError, NotFoundError, RepositoryError};
use crate::keyed::EntityId;
use crate::repository::UserRepository;
use crate::tag::{Tag, TagId, TagPatch};
use crate::todo::{Todo, TodoId, TodoPatch};
use crate::user::{User, UserId, Version};
use std::sync::Arc;

/// A user document bound to its repository.
pub struct UserDocument<R> {
    repository: Arc<R>,
    ids: Arc<dyn IdGenerator>,
    user: User,
}

impl<R: UserRepository> UserDocument<R> {
    /// Insert a new user and bind it.
    ///
    /// A blank user id is replaced with a generated one.
    ///
    /// # Errors
    ///
    /// Returns the repository's error, notably `Write` for a taken username.
    #[tracing::instrument(skip_all, fields(username = ?user.username))]
    pub async fn create(
        repository: Arc<R>,
        ids: Arc<dyn IdGenerator>,
        mut user: User,
    ) -> Result<Self, RepositoryError> {
        if user.id.is_blank() {
            user.id = UserId::from(ids.next_id());
        }
        user.version = Version::INITIAL;

        repository.insert(&user).await.inspect_err(|error| {
            tracing::error!(user_id = %user.id, %error, "Failed to insert user");
        })?;
        tracing::debug!(user_id = %user.id, "User created");

        Ok(Self {
            repository,
            ids,
            user,
        })
    }

    /// Load a stored user and bind it.
    ///
    /// # Errors
    ///
    /// Returns `UserNotFound` if no document has this id, or the repository's
    /// storage error.
    pub async fn load(
        repository: Arc<R>,
        ids: Arc<dyn IdGenerator>,
        id: &UserId,
    ) -> Result<Self, RepositoryError> {
        let user = repository
            .find_by_id(id)
            .await?
            .ok_or_else(|| RepositoryError::UserNotFound(id.clone()))?;

        Ok(Self {
            repository,
            ids,
            user,
        })
    }

    /// Current snapshot of the user.
    #[must_use]
    pub const fn user(&self) -> &User {
        &self.user
    }

    /// Unbind, returning the snapshot.
    #[must_use]
    pub fn into_user(self) -> User {
        self.user
    }

    /// Replace the snapshot with what is currently stored.
    ///
    /// # Errors
    ///
    /// Returns `UserNotFound` if the document was deleted, or a storage error.
    pub async fn reload(&mut self) -> Result<(), RepositoryError> {
        self.user = self
            .repository
            .find_by_id(&self.user.id)
            .await?
            .ok_or_else(|| RepositoryError::UserNotFound(self.user.id.clone()))?;
        Ok(())
    }

    /// Delete the account. Returns the stored document if it still existed.
    ///
    /// # Errors
    ///
    /// Returns the repository's storage error.
    pub async fn delete(self) -> Result<Option<User>, RepositoryError> {
        tracing::info!(user_id = %self.user.id, "Deleting user");
        self.repository.delete_by_id(&self.user.id).await
    }

    /// Add a tag, assigning an id if it has none.
    ///
    /// # Errors
    ///
    /// Returns a repository error if the write fails.
    #[tracing::instrument(skip(self, tag), fields(user_id = %self.user.id))]
    pub async fn add_tag(&mut self, tag: Tag) -> Result<Tag, DocumentError> {
        self.mutate("add_tag", |user, ids| Ok(user.tags.add(tag, ids).clone()))
            .await
    }

    /// Update the supplied fields of an existing tag.
    ///
    /// # Errors
    ///
    /// `NotFound(Tag)` if the tag does not exist, else a repository error.
    #[tracing::instrument(skip(self, patch), fields(user_id = %self.user.id, tag_id = %patch.id))]
    pub async fn update_tag(&mut self, patch: TagPatch) -> Result<Tag, DocumentError> {
        self.mutate("update_tag", |user, _| user.tags.update(patch).cloned())
            .await
    }

    /// Delete a tag, returning it. Todos referencing it keep their `tag_id`.
    ///
    /// # Errors
    ///
    /// `NotFound(Tag)` if the tag does not exist, else a repository error.
    #[tracing::instrument(skip(self), fields(user_id = %self.user.id))]
    pub async fn delete_tag(&mut self, id: &TagId) -> Result<Tag, DocumentError> {
        self.mutate("delete_tag", |user, _| user.tags.delete(id)).await
    }

    /// Add a todo, assigning an id if it has none.
    ///
    /// # Errors
    ///
    /// Returns a repository error if the write fails.
    #[tracing::instrument(skip(self, todo), fields(user_id = %self.user.id))]
    pub async fn add_todo(&mut self, todo: Todo) -> Result<Todo, DocumentError> {
        self.mutate("add_todo", |user, ids| Ok(user.todos.add(todo, ids).clone()))
            .await
    }

    /// Update the supplied fields of an existing todo.
    ///
    /// # Errors
    ///
    /// `NotFound(Todo)` if the todo does not exist, else a repository error.
    #[tracing::instrument(skip(self, patch), fields(user_id = %self.user.id, todo_id = %patch.id))]
    pub async fn update_todo(&mut self, patch: TodoPatch) -> Result<Todo, DocumentError> {
        self.mutate("update_todo", |user, _| user.todos.update(patch).cloned())
            .await
    }

    /// Delete a todo, returning it.
    ///
    /// # Errors
    ///
    /// `NotFound(Todo)` if the todo does not exist, else a repository error.
    #[tracing::instrument(skip(self), fields(user_id = %self.user.id))]
    pub async fn delete_todo(&mut self, id: &TodoId) -> Result<Todo, DocumentError> {
        self.mutate("delete_todo", |user, _| user.todos.delete(id)).await
    }

    async fn mutate<T, F>(&mut self, op: &'static str, f: F) -> Result<T, DocumentError>
    where
        F: FnOnce(&mut User, &dyn IdGenerator) -> Result<T, NotFoundError>,
    {
        let mut working = self.user.clone();

        let outcome = match f(&mut working, self.ids.as_ref()) {
            Ok(outcome) => outcome,
            Err(error) => {
                tracing::warn!(op, kind = %error.kind(), id = error.id(), "Target not found");
                metrics::counter!("document.operations", "op" => op, "outcome" => "not_found")
                    .increment(1);
                return Err(error.into());
            },
        };

        let version = match self.repository.save(&working, self.user.version).await {
            Ok(version) => version,
            Err(error) => {
                tracing::error!(op, %error, "Failed to save user document");
                metrics::counter!("document.operations", "op" => op, "outcome" => "write_failed")
                    .increment(1);
                return Err(error.into());
            },
        };

        working.version = version;
        self.user = working;

        tracing::debug!(op, version = %version, "User document saved");
        metrics::counter!("document.operations", "op" => op, "outcome" => "ok").increment(1);
        Ok(outcome)
    }
}

impl<R> std::fmt::Debug for UserDocument<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserDocument")
            .field("user", &self.user)
            .finish_non_exhaustive()
    }
}
