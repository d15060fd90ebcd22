//! # simPodo Testing
//!
//! Testing utilities and helpers for simPodo.
//!
//! This crate provides:
//! - Mock implementations of Environment traits
//! - An in-memory [`UserRepository`](simpodo_core::repository::UserRepository)
//! - Fixture builders for tags, todos and users
//! - Assertion helpers for reducers
//!
//! ## Example
//!
//! ```ignore
//! use simpodo_testing::{InMemoryUserRepository, SequentialIdGenerator};
//! use simpodo_core::document::UserDocument;
//!
//! #[tokio::test]
//! async fn adds_a_tag() {
//!     let repo = Arc::new(InMemoryUserRepository::new());
//!     let ids = Arc::new(SequentialIdGenerator::new());
//!     let mut doc = UserDocument::create(repo, ids, fixtures::user()).await.unwrap();
//!
//!     let tag = doc.add_tag(Tag::new("tag1", "salmon")).await.unwrap();
//!     assert!(doc.user().tags.contains(&tag.id));
//! }
//! ```

use chrono::{DateTime, Utc};
use simpodo_core::environment::{Clock, DisplayPreference, IdGenerator};


/// In-memory repository for fast, deterministic tests
pub mod repository_mocks;

/// Mock implementations for testing.
pub mod mocks {
    use super::{Clock, DateTime, DisplayPreference, IdGenerator, Utc};
    use std::sync::atomic::{AtomicU64, Ordering};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use simpodo_testing::mocks::FixedClock;
    /// use simpodo_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// let time1 = clock.now();
    /// let time2 = clock.now();
    /// assert_eq!(time1, time2); // Always the same!
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Create a default fixed clock for tests (2022-02-15 00:00:00 UTC)
    ///
    /// # Panics
    ///
    /// This function will panic if the hardcoded timestamp fails to parse,
    /// which should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2022-02-15T00:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }

    /// Predictable ids: `"1"`, `"2"`, ... or `"{prefix}1"`, `"{prefix}2"`, ...
    ///
    /// ```
    /// use simpodo_testing::mocks::SequentialIdGenerator;
    /// use simpodo_core::environment::IdGenerator;
    ///
    /// let ids = SequentialIdGenerator::with_prefix("todo-");
    /// assert_eq!(ids.next_id(), "todo-1");
    /// assert_eq!(ids.next_id(), "todo-2");
    /// ```
    #[derive(Debug, Default)]
    pub struct SequentialIdGenerator {
        prefix: String,
        next: AtomicU64,
    }

    impl SequentialIdGenerator {
        /// Ids without a prefix, starting at `"1"`
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Ids with a prefix, starting at `"{prefix}1"`
        #[must_use]
        pub fn with_prefix(prefix: impl Into<String>) -> Self {
            Self {
                prefix: prefix.into(),
                next: AtomicU64::new(0),
            }
        }

        /// How many ids have been handed out
        #[must_use]
        pub fn issued(&self) -> u64 {
            self.next.load(Ordering::SeqCst)
        }
    }

    impl IdGenerator for SequentialIdGenerator {
        fn next_id(&self) -> String {
            let n = self.next.fetch_add(1, Ordering::SeqCst) + 1;
            format!("{}{n}", self.prefix)
        }
    }

    /// Display preference with a fixed answer
    #[derive(Debug, Clone, Copy, Default)]
    pub struct FixedDisplayPreference(pub bool);

    impl DisplayPreference for FixedDisplayPreference {
        fn prefers_dark(&self) -> bool {
            self.0
        }
    }
}

/// Fixture builders mirroring the shapes used across the test suites.
pub mod fixtures {
    use chrono::{DateTime, TimeZone, Utc};
    use simpodo_core::tag::{Tag, TagId};
    use simpodo_core::todo::{Todo, TodoId};
    use simpodo_core::user::User;

    /// Midnight UTC on the given day.
    ///
    /// # Panics
    ///
    /// Panics on an invalid calendar date.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn date(year: i32, month: u32, day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(year, month, day, 0, 0, 0)
            .single()
            .expect("fixture dates are valid")
    }

    /// An open todo with id, title and tag, starting at `time_start`.
    #[must_use]
    pub fn todo(id: &str, title: &str, tag_id: &str, time_start: DateTime<Utc>) -> Todo {
        Todo::new(title, "details", time_start, TagId::from(tag_id)).with_id(TodoId::from(id))
    }

    /// Open todos `"1"..="n"` titled `todo1..todoN` under `tagId`.
    #[must_use]
    pub fn todos(n: usize, time_start: DateTime<Utc>) -> Vec<Todo> {
        (1..=n)
            .map(|i| todo(&i.to_string(), &format!("todo{i}"), "tagId", time_start))
            .collect()
    }

    /// A tag with an id.
    #[must_use]
    pub fn tag(id: &str, name: &str, color: &str) -> Tag {
        Tag::new(name, color).with_id(TagId::from(id))
    }

    /// A fresh user called `username` with email `email`.
    #[must_use]
    pub fn user() -> User {
        User::new("username", "email")
    }
}

// Re-export commonly used items
pub use mocks::{test_clock, FixedClock, FixedDisplayPreference, SequentialIdGenerator};
pub use reducer_test::{assertions, ReducerTest};
pub use repository_mocks::InMemoryUserRepository;
