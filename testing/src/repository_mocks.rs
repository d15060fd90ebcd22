//! In-memory user repository for fast, deterministic testing.
//!
//! [`InMemoryUserRepository`] enforces the same contract as the Postgres
//! implementation: sparse username uniqueness and optimistic version checks.

use simpodo_core::error::{RepositoryError, RepositoryResult};
use simpodo_core::repository::{UserQuery, UserRepository};
use simpodo_core::user::{ProjectedUser, User, UserId, UserProjection, Version};
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Debug, Default)]
struct Documents {
    by_id: HashMap<UserId, User>,
    order: Vec<UserId>,
}

impl Documents {
    fn username_taken(&self, username: Option<&String>, except: &UserId) -> bool {
        username.is_some_and(|name| {
            self.by_id
                .values()
                .any(|u| &u.id != except && u.username.as_ref() == Some(name))
        })
    }

    fn in_order(&self) -> impl Iterator<Item = &User> {
        self.order.iter().filter_map(|id| self.by_id.get(id))
    }
}

/// In-memory user repository.
///
/// Clones share the same documents.
///
/// # Example
///
/// ```
/// use simpodo_testing::InMemoryUserRepository;
/// use simpodo_core::repository::UserRepository;
/// use simpodo_core::user::{User, UserId};
///
/// # tokio_test::block_on(async {
/// let repo = InMemoryUserRepository::new();
/// let user = User::new("username", "email").with_id(UserId::from("u1"));
///
/// repo.insert(&user).await.unwrap();
/// assert!(repo.find_by_id(&user.id).await.unwrap().is_some());
/// # });
/// ```
#[derive(Clone, Debug, Default)]
pub struct InMemoryUserRepository {
    documents: Arc<RwLock<Documents>>,
}

impl InMemoryUserRepository {
    /// Create a new empty repository
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored documents
    #[must_use]
    pub fn len(&self) -> usize {
        self.read().map_or(0, |docs| docs.by_id.len())
    }

    /// Check if the repository is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove every document (for test isolation)
    pub fn clear(&self) {
        if let Ok(mut docs) = self.write() {
            docs.by_id.clear();
            docs.order.clear();
        }
    }

    fn read(&self) -> RepositoryResult<RwLockReadGuard<'_, Documents>> {
        self.documents
            .read()
            .map_err(|_| RepositoryError::Database("document lock poisoned".to_string()))
    }

    fn write(&self) -> RepositoryResult<RwLockWriteGuard<'_, Documents>> {
        self.documents
            .write()
            .map_err(|_| RepositoryError::Database("document lock poisoned".to_string()))
    }
}

impl UserRepository for InMemoryUserRepository {
    fn insert(&self, user: &User) -> impl Future<Output = RepositoryResult<()>> + Send {
        let result = self.write().and_then(|mut docs| {
            if docs.by_id.contains_key(&user.id) {
                return Err(RepositoryError::Write(format!(
                    "duplicate key: user {} already exists",
                    user.id
                )));
            }
            if docs.username_taken(user.username.as_ref(), &user.id) {
                return Err(RepositoryError::Write(format!(
                    "duplicate key: username {:?} is taken",
                    user.username
                )));
            }

            let mut stored = user.clone();
            stored.version = Version::INITIAL;
            docs.order.push(stored.id.clone());
            docs.by_id.insert(stored.id.clone(), stored);
            Ok(())
        });
        async move { result }
    }

    fn save(
        &self,
        user: &User,
        expected: Version,
    ) -> impl Future<Output = RepositoryResult<Version>> + Send {
        let result = self.write().and_then(|mut docs| {
            let actual = docs
                .by_id
                .get(&user.id)
                .map(|stored| stored.version)
                .ok_or_else(|| RepositoryError::UserNotFound(user.id.clone()))?;

            if actual != expected {
                return Err(RepositoryError::ConcurrencyConflict {
                    user_id: user.id.clone(),
                    expected,
                    actual,
                });
            }
            if docs.username_taken(user.username.as_ref(), &user.id) {
                return Err(RepositoryError::Write(format!(
                    "duplicate key: username {:?} is taken",
                    user.username
                )));
            }

            let mut stored = user.clone();
            stored.version = expected.next();
            let version = stored.version;
            docs.by_id.insert(stored.id.clone(), stored);
            Ok(version)
        });
        async move { result }
    }

    fn find_by_id(&self, id: &UserId) -> impl Future<Output = RepositoryResult<Option<User>>> + Send {
        let result = self.read().map(|docs| docs.by_id.get(id).cloned());
        async move { result }
    }

    fn find_one(
        &self,
        query: &UserQuery,
        projection: UserProjection,
    ) -> impl Future<Output = RepositoryResult<Option<ProjectedUser>>> + Send {
        let result = self.read().map(|docs| {
            docs.in_order()
                .find(|user| query.matches(user))
                .cloned()
                .map(|user| projection.project(user))
        });
        async move { result }
    }

    fn delete_by_id(&self, id: &UserId) -> impl Future<Output = RepositoryResult<Option<User>>> + Send {
        let result = self.write().map(|mut docs| {
            docs.order.retain(|stored| stored != id);
            docs.by_id.remove(id)
        });
        async move { result }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use simpodo_core::tag::{Tag, TagId};

    fn user(id: &str, username: Option<&str>) -> User {
        User {
            id: UserId::from(id),
            username: username.map(str::to_string),
            ..User::default()
        }
    }

    #[tokio::test]
    async fn insert_then_find() {
        let repo = InMemoryUserRepository::new();
        repo.insert(&user("u1", Some("a"))).await.unwrap();

        let found = repo.find_by_id(&UserId::from("u1")).await.unwrap().unwrap();
        assert_eq!(found.version, Version::INITIAL);
        assert_eq!(repo.len(), 1);
    }

    #[tokio::test]
    async fn duplicate_username_is_a_write_error() {
        let repo = InMemoryUserRepository::new();
        repo.insert(&user("u1", Some("same"))).await.unwrap();

        let err = repo.insert(&user("u2", Some("same"))).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Write(_)));
    }

    #[tokio::test]
    async fn users_without_username_never_conflict() {
        let repo = InMemoryUserRepository::new();
        repo.insert(&user("u1", None)).await.unwrap();
        repo.insert(&user("u2", None)).await.unwrap();
        assert_eq!(repo.len(), 2);
    }

    #[tokio::test]
    async fn save_bumps_version_and_rejects_stale_writes() {
        let repo = InMemoryUserRepository::new();
        let u = user("u1", Some("a"));
        repo.insert(&u).await.unwrap();

        assert_eq!(repo.save(&u, Version::INITIAL).await.unwrap(), Version::new(1));

        let err = repo.save(&u, Version::INITIAL).await.unwrap_err();
        assert_eq!(
            err,
            RepositoryError::ConcurrencyConflict {
                user_id: u.id.clone(),
                expected: Version::INITIAL,
                actual: Version::new(1),
            }
        );
    }

    #[tokio::test]
    async fn save_missing_user_is_not_found() {
        let repo = InMemoryUserRepository::new();
        let err = repo.save(&user("ghost", None), Version::INITIAL).await.unwrap_err();
        assert_eq!(err, RepositoryError::UserNotFound(UserId::from("ghost")));
    }

    #[tokio::test]
    async fn find_one_projects_and_filters() {
        let repo = InMemoryUserRepository::new();
        let mut u = user("u1", Some("a"));
        u.tags.insert(Tag::new("t", "red").with_id(TagId::from("t1")));
        repo.insert(&u).await.unwrap();
        repo.insert(&user("u2", Some("b"))).await.unwrap();

        let query = UserQuery::default().with_tag(TagId::from("t1"));
        let found = repo.find_one(&query, UserProjection::TAGS).await.unwrap().unwrap();

        assert_eq!(found.id, UserId::from("u1"));
        assert!(found.tags.unwrap().contains(&TagId::from("t1")));
        assert!(found.todos.is_none());
    }

    #[tokio::test]
    async fn delete_returns_document() {
        let repo = InMemoryUserRepository::new();
        repo.insert(&user("u1", None)).await.unwrap();

        assert!(repo.delete_by_id(&UserId::from("u1")).await.unwrap().is_some());
        assert!(repo.delete_by_id(&UserId::from("u1")).await.unwrap().is_none());
        assert!(repo.is_empty());
    }
}
