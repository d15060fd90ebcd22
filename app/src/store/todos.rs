//! Todos slice of the client store.
//!
//! Mutations go through [`apply`], which returns the typed [`NotFoundError`]
//! to the caller. [`TodosReducer`] wraps it for the [`Store`](simpodo_runtime::Store),
//! recording the last failure in state and turning `HydrateRequested` into
//! a load from the injected [`TodoSource`].

use simpodo_core::environment::IdGenerator;
use simpodo_core::error::NotFoundError;
use simpodo_core::keyed::KeyedCollection;
use simpodo_core::repository::TodoSource;
use simpodo_core::todo::{Todo, TodoId, TodoPatch};
use simpodo_core::user::UserId;
use simpodo_core::{effect::Effect, reducer::Reducer, smallvec, SmallVec};
use std::sync::Arc;

/// State of the todos slice
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TodosState {
    /// Todos in insertion order
    pub todos: KeyedCollection<Todo>,
    /// Failure of the most recent mutation, cleared by the next success
    pub last_error: Option<NotFoundError>,
    /// Reason the most recent hydration failed
    pub hydration_error: Option<String>,
}

impl TodosState {
    /// Empty state
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// State holding `todos`
    #[must_use]
    pub fn with_todos(todos: impl IntoIterator<Item = Todo>) -> Self {
        Self {
            todos: todos.into_iter().collect(),
            ..Self::default()
        }
    }
}

/// Actions of the todos slice
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TodosAction {
    /// Insert a todo, assigning an id if it has none
    TodoAdded(Todo),
    /// Remove a todo
    TodoDeleted(TodoId),
    /// Replace every todo
    TodosReplaced(KeyedCollection<Todo>),
    /// Apply the supplied fields to an existing todo
    TodoUpdated(TodoPatch),
    /// Mark a todo as done
    TodoCompleted(TodoId),
    /// Load the persisted todos of a user
    HydrateRequested(UserId),
    /// Loading the persisted todos failed
    HydrationFailed(String),
}

/// Environment for [`TodosReducer`]
#[derive(Clone)]
pub struct TodosEnvironment {
    /// Source of ids for todos added without one
    pub ids: Arc<dyn IdGenerator>,
    /// Where hydration loads todos from
    pub source: Option<Arc<dyn TodoSource>>,
}

impl TodosEnvironment {
    /// Environment without a hydration source
    #[must_use]
    pub fn new(ids: Arc<dyn IdGenerator>) -> Self {
        Self { ids, source: None }
    }

    /// Set the hydration source
    #[must_use]
    pub fn with_source(mut self, source: Arc<dyn TodoSource>) -> Self {
        self.source = Some(source);
        self
    }
}

/// Apply a mutation to `state`.
///
/// Hydration actions are not mutations and leave `state` untouched.
///
/// # Errors
///
/// `NotFoundError::Todo` when a delete, update or completion targets an
/// absent id. The mapping is unchanged in that case.
pub fn apply(
    state: &mut TodosState,
    action: TodosAction,
    ids: &dyn IdGenerator,
) -> Result<(), NotFoundError> {
    match action {
        TodosAction::TodoAdded(todo) => {
            state.todos.add(todo, ids);
        },
        TodosAction::TodoDeleted(id) => {
            state.todos.delete(&id)?;
        },
        TodosAction::TodosReplaced(todos) => state.todos.replace_all(todos),
        TodosAction::TodoUpdated(patch) => {
            state.todos.update(patch)?;
        },
        TodosAction::TodoCompleted(id) => {
            state.todos.update(TodoPatch::new(id).completed(true))?;
        },
        TodosAction::HydrateRequested(_) | TodosAction::HydrationFailed(_) => {},
    }
    Ok(())
}

/// Reducer for the todos slice
#[derive(Clone, Copy, Debug, Default)]
pub struct TodosReducer;

impl TodosReducer {
    /// Creates a new `TodosReducer`
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

fn hydrate(source: &Arc<dyn TodoSource>, user_id: UserId) -> Effect<TodosAction> {
    let source = Arc::clone(source);
    Effect::future(async move {
        match source.load_todos(user_id.clone()).await {
            Ok(todos) => {
                tracing::debug!(%user_id, count = todos.len(), "Hydrated todos");
                Some(TodosAction::TodosReplaced(todos.into_iter().collect()))
            },
            Err(error) => {
                tracing::error!(%user_id, %error, "Failed to hydrate todos");
                Some(TodosAction::HydrationFailed(error.to_string()))
            },
        }
    })
}

impl Reducer for TodosReducer {
    type State = TodosState;
    type Action = TodosAction;
    type Environment = TodosEnvironment;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            TodosAction::HydrateRequested(user_id) => {
                let Some(source) = &env.source else {
                    tracing::warn!(%user_id, "Hydration requested without a todo source");
                    state.hydration_error = Some("no todo source configured".to_string());
                    return SmallVec::new();
                };
                state.hydration_error = None;
                smallvec![hydrate(source, user_id)]
            },
            TodosAction::HydrationFailed(reason) => {
                state.hydration_error = Some(reason);
                SmallVec::new()
            },
            mutation => {
                match apply(state, mutation, env.ids.as_ref()) {
                    Ok(()) => state.last_error = None,
                    Err(error) => {
                        tracing::warn!(%error, "Todo mutation rejected");
                        state.last_error = Some(error);
                    },
                }
                SmallVec::new()
            },
        }
    }
}

/// Derived views over [`TodosState`]
pub mod selectors {
    use super::TodosState;
    use chrono::{DateTime, Utc};
    use simpodo_core::tag::TagId;
    use simpodo_core::todo::{Todo, TodoId};

    /// Closed interval `[start, end]`
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct TimeRange {
        /// First instant included
        pub start: DateTime<Utc>,
        /// Last instant included
        pub end: DateTime<Utc>,
    }

    impl TimeRange {
        /// Range from `start` to `end`, both included
        #[must_use]
        pub const fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
            Self { start, end }
        }

        /// Whether `instant` lies within the range
        #[must_use]
        pub fn contains(&self, instant: DateTime<Utc>) -> bool {
            self.start <= instant && instant <= self.end
        }
    }

    /// Number of todos
    #[must_use]
    pub fn select_total(state: &TodosState) -> usize {
        state.todos.len()
    }

    /// Number of completed todos
    #[must_use]
    pub fn select_completed_total(state: &TodosState) -> usize {
        state.todos.iter().filter(|todo| todo.completed).count()
    }

    /// The todo with `id`, if any
    #[must_use]
    pub fn select_todo_by_id<'a>(state: &'a TodosState, id: &TodoId) -> Option<&'a Todo> {
        state.todos.get(id)
    }

    /// Todos filed under `tag_id`, in order
    #[must_use]
    pub fn filter_by_tag_id<'a>(state: &'a TodosState, tag_id: &TagId) -> Vec<&'a Todo> {
        state.todos.iter().filter(|todo| &todo.tag_id == tag_id).collect()
    }

    /// Todos starting within `range`, in order
    #[must_use]
    pub fn filter_by_time_range(state: &TodosState, range: TimeRange) -> Vec<&Todo> {
        state
            .todos
            .iter()
            .filter(|todo| range.contains(todo.time_start))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::selectors::*;
    use super::*;
    use simpodo_core::document::UserDocument;
    use simpodo_core::repository::RepositoryTodoSource;
    use simpodo_core::tag::TagId;
    use simpodo_testing::{assertions, fixtures, InMemoryUserRepository, ReducerTest, SequentialIdGenerator};

    fn env() -> TodosEnvironment {
        TodosEnvironment::new(Arc::new(SequentialIdGenerator::with_prefix("gen-")))
    }

    fn four_todos() -> TodosState {
        TodosState::with_todos(fixtures::todos(4, fixtures::date(2022, 2, 15)))
    }

    fn ids(todos: &[&Todo]) -> Vec<String> {
        todos.iter().map(|t| t.id.to_string()).collect()
    }

    #[test]
    fn add_todo() {
        let todo = fixtures::todo("todoId", "todo1", "tagId", fixtures::date(2022, 2, 15));
        let expected = todo.clone();

        ReducerTest::new(TodosReducer::new())
            .with_env(env())
            .given_state(TodosState::new())
            .when_action(TodosAction::TodoAdded(todo))
            .then_state(move |state| {
                assert_eq!(select_total(state), 1);
                assert_eq!(state.todos.get(&TodoId::from("todoId")), Some(&expected));
                assert!(state.last_error.is_none());
            })
            .then_effects(assertions::assert_no_effects)
            .run();
    }

    #[test]
    fn add_todo_without_id_gets_one() {
        let todo = Todo::new("todo1", "details", fixtures::date(2022, 2, 15), TagId::from("tagId"));

        ReducerTest::new(TodosReducer::new())
            .with_env(env())
            .given_state(TodosState::new())
            .when_action(TodosAction::TodoAdded(todo))
            .then_state(|state| {
                assert!(state.todos.contains(&TodoId::from("gen-1")));
            })
            .run();
    }

    #[test]
    fn delete_todo() {
        let state = TodosState::with_todos([fixtures::todo(
            "todoId",
            "todo1",
            "tagId",
            fixtures::date(2022, 2, 15),
        )]);

        ReducerTest::new(TodosReducer::new())
            .with_env(env())
            .given_state(state)
            .when_action(TodosAction::TodoDeleted(TodoId::from("todoId")))
            .then_state(|state| {
                assert!(state.todos.is_empty());
            })
            .run();
    }

    #[test]
    fn replace_todos() {
        let replacement: KeyedCollection<Todo> = fixtures::todos(2, fixtures::date(2022, 3, 1))
            .into_iter()
            .collect();
        let expected = replacement.clone();

        ReducerTest::new(TodosReducer::new())
            .with_env(env())
            .given_state(four_todos())
            .when_action(TodosAction::TodosReplaced(replacement))
            .then_state(move |state| {
                assert_eq!(state.todos, expected);
            })
            .run();
    }

    #[test]
    fn complete_todo() {
        ReducerTest::new(TodosReducer::new())
            .with_env(env())
            .given_state(four_todos())
            .when_action(TodosAction::TodoCompleted(TodoId::from("3")))
            .when_action(TodosAction::TodoCompleted(TodoId::from("3")))
            .then_state(|state| {
                let done: Vec<bool> = state.todos.iter().map(|t| t.completed).collect();
                assert_eq!(done, [false, false, true, false]);
                assert!(state.last_error.is_none());
            })
            .run();
    }

    #[test]
    fn update_missing_todo_records_not_found() {
        ReducerTest::new(TodosReducer::new())
            .with_env(env())
            .given_state(four_todos())
            .when_action(TodosAction::TodoUpdated(
                TodoPatch::new(TodoId::from("idontexitsbishhh")).title("updated"),
            ))
            .then_state(|state| {
                assert_eq!(
                    state.last_error,
                    Some(NotFoundError::Todo(TodoId::from("idontexitsbishhh")))
                );
                assert_eq!(state.todos, four_todos().todos);
            })
            .run();
    }

    #[test]
    fn apply_surfaces_not_found() {
        let mut state = four_todos();
        let ids = SequentialIdGenerator::new();

        let err = apply(&mut state, TodosAction::TodoCompleted(TodoId::from("9")), &ids).unwrap_err();
        assert_eq!(err, NotFoundError::Todo(TodoId::from("9")));

        let err = apply(&mut state, TodosAction::TodoDeleted(TodoId::from("9")), &ids).unwrap_err();
        assert_eq!(err.id(), "9");
        assert_eq!(state, four_todos());
    }

    #[test]
    fn next_success_clears_last_error() {
        ReducerTest::new(TodosReducer::new())
            .with_env(env())
            .given_state(four_todos())
            .when_action(TodosAction::TodoDeleted(TodoId::from("nope")))
            .when_action(TodosAction::TodoDeleted(TodoId::from("1")))
            .then_state(|state| {
                assert!(state.last_error.is_none());
                assert_eq!(select_total(state), 3);
            })
            .run();
    }

    #[test]
    fn update_only_touches_supplied_fields() {
        let original = four_todos();
        let before = original.todos.get(&TodoId::from("2")).cloned().unwrap();

        ReducerTest::new(TodosReducer::new())
            .with_env(env())
            .given_state(original)
            .when_action(TodosAction::TodoUpdated(
                TodoPatch::new(TodoId::from("2")).title("updatedTodo").completed(true),
            ))
            .then_state(move |state| {
                let after = state.todos.get(&TodoId::from("2")).unwrap();
                assert_eq!(after.title, "updatedTodo");
                assert!(after.completed);
                assert_eq!(after.details, before.details);
                assert_eq!(after.time_start, before.time_start);
                assert_eq!(after.tag_id, before.tag_id);
            })
            .run();
    }

    #[test]
    fn completed_total_counts_done_todos() {
        let date = fixtures::date(2022, 2, 15);
        let state = TodosState::with_todos(
            [false, false, true, true, false]
                .into_iter()
                .enumerate()
                .map(|(i, done)| {
                    fixtures::todo(&(i + 1).to_string(), "todo", "tagId", date).with_completed(done)
                }),
        );

        assert_eq!(select_completed_total(&state), 2);
        assert_eq!(select_total(&state), 5);
    }

    #[test]
    fn select_by_id() {
        let state = four_todos();

        assert_eq!(
            select_todo_by_id(&state, &TodoId::from("2")).map(|t| t.title.as_str()),
            Some("todo2")
        );
        assert!(select_todo_by_id(&state, &TodoId::from("notAvailable")).is_none());
    }

    #[test]
    fn filter_by_tag() {
        let date = fixtures::date(2022, 2, 15);
        let state = TodosState::with_todos([
            fixtures::todo("1", "todo1", "selecThis", date),
            fixtures::todo("2", "todo2", "other", date),
            fixtures::todo("3", "todo3", "selecThis", date),
            fixtures::todo("4", "todo4", "other", date),
        ]);

        let selected = filter_by_tag_id(&state, &TagId::from("selecThis"));
        assert_eq!(ids(&selected), ["1", "3"]);
    }

    #[test]
    fn filter_by_time() {
        let state = TodosState::with_todos([
            fixtures::todo("1", "todo1", "tagId", fixtures::date(2022, 2, 15)),
            fixtures::todo("2", "todo2", "tagId", fixtures::date(2022, 1, 15)),
            fixtures::todo("3", "todo3", "tagId", fixtures::date(2022, 2, 15)),
            fixtures::todo("4", "todo4", "tagId", fixtures::date(2022, 3, 15)),
        ]);
        let range = TimeRange::new(fixtures::date(2022, 2, 1), fixtures::date(2022, 3, 1));

        assert_eq!(ids(&filter_by_time_range(&state, range)), ["1", "3"]);
    }

    #[test]
    fn time_range_includes_both_ends() {
        let start = fixtures::date(2022, 2, 1);
        let end = fixtures::date(2022, 3, 1);
        let range = TimeRange::new(start, end);

        assert!(range.contains(start));
        assert!(range.contains(end));
        assert!(!range.contains(fixtures::date(2022, 3, 2)));
    }

    #[test]
    fn hydration_without_source_fails_immediately() {
        ReducerTest::new(TodosReducer::new())
            .with_env(env())
            .given_state(four_todos())
            .when_action(TodosAction::HydrateRequested(UserId::from("u1")))
            .then_state(|state| {
                assert!(state.hydration_error.is_some());
                assert_eq!(select_total(state), 4);
            })
            .then_effects(assertions::assert_no_effects)
            .run();
    }

    #[tokio::test]
    async fn hydration_loads_persisted_todos() {
        let repo = Arc::new(InMemoryUserRepository::new());
        let mut doc = UserDocument::create(
            Arc::clone(&repo),
            Arc::new(SequentialIdGenerator::with_prefix("id-")),
            fixtures::user(),
        )
        .await
        .unwrap();
        doc.add_todo(Todo::new("persisted", "details", fixtures::date(2022, 2, 15), TagId::from("t")))
            .await
            .unwrap();

        let env = env().with_source(Arc::new(RepositoryTodoSource::new(repo)));
        let mut state = four_todos();
        let effects = TodosReducer::new().reduce(
            &mut state,
            TodosAction::HydrateRequested(doc.user().id.clone()),
            &env,
        );
        assertions::assert_has_future_effect(&effects);

        let Some(Effect::Future(load)) = effects.into_iter().next() else {
            panic!("expected a future effect");
        };
        let Some(TodosAction::TodosReplaced(todos)) = load.await else {
            panic!("expected the persisted todos");
        };
        assert_eq!(todos.len(), 1);
        assert!(todos.contains(&TodoId::from("id-2")));

        TodosReducer::new().reduce(&mut state, TodosAction::TodosReplaced(todos), &env);
        assert_eq!(select_total(&state), 1);
    }

    #[tokio::test]
    async fn hydration_of_unknown_user_feeds_back_failure() {
        let repo = Arc::new(InMemoryUserRepository::new());
        let env = env().with_source(Arc::new(RepositoryTodoSource::new(repo)));
        let mut state = TodosState::new();

        let effects = TodosReducer::new().reduce(
            &mut state,
            TodosAction::HydrateRequested(UserId::from("ghost")),
            &env,
        );
        let Some(Effect::Future(load)) = effects.into_iter().next() else {
            panic!("expected a future effect");
        };

        let Some(TodosAction::HydrationFailed(reason)) = load.await else {
            panic!("expected a failure");
        };
        assert!(reason.contains("ghost"));
    }
}
