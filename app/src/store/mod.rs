//! Client store: the todos and theme slices scoped into one root reducer.
//!
//! ```ignore
//! let store = Store::new(
//!     AppState::new(&preference),
//!     AppReducer::new(),
//!     AppEnvironment::new(todos_env),
//! );
//! store.send(AppAction::Theme(ThemeAction::ThemeToggled)).await?;
//! ```

pub mod theme;
pub mod todos;

use simpodo_core::composition::{combine_reducers, scope_reducer, CombinedReducer, ScopedReducer};
use simpodo_core::environment::DisplayPreference;
use simpodo_core::{effect::Effect, reducer::Reducer, SmallVec};
use theme::{ThemeAction, ThemeReducer, ThemeState};
use todos::{TodosAction, TodosEnvironment, TodosReducer, TodosState};

/// Root state
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AppState {
    /// Todos slice
    pub todos: TodosState,
    /// Theme slice
    pub theme: ThemeState,
}

impl AppState {
    /// Empty todos, theme from the host preference
    #[must_use]
    pub fn new(preference: &dyn DisplayPreference) -> Self {
        Self {
            todos: TodosState::new(),
            theme: ThemeState::from_preference(preference),
        }
    }
}

/// Root action
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AppAction {
    /// Todos slice action
    Todos(TodosAction),
    /// Theme slice action
    Theme(ThemeAction),
}

/// Root environment
#[derive(Clone)]
pub struct AppEnvironment {
    /// Environment of the todos slice
    pub todos: TodosEnvironment,
}

impl AppEnvironment {
    /// Creates the root environment
    #[must_use]
    pub const fn new(todos: TodosEnvironment) -> Self {
        Self { todos }
    }
}

fn todos_state(state: &mut AppState) -> &mut TodosState {
    &mut state.todos
}

fn todos_action(action: AppAction) -> Option<TodosAction> {
    match action {
        AppAction::Todos(action) => Some(action),
        AppAction::Theme(_) => None,
    }
}

fn todos_env(env: &AppEnvironment) -> &TodosEnvironment {
    &env.todos
}

fn theme_state(state: &mut AppState) -> &mut ThemeState {
    &mut state.theme
}

fn theme_action(action: AppAction) -> Option<ThemeAction> {
    match action {
        AppAction::Theme(action) => Some(action),
        AppAction::Todos(_) => None,
    }
}

fn theme_env(_env: &AppEnvironment) -> &() {
    &()
}

fn todos_scope() -> ScopedReducer<AppState, AppAction, AppEnvironment, TodosReducer> {
    scope_reducer(TodosReducer::new(), todos_state, todos_action, AppAction::Todos, todos_env)
}

fn theme_scope() -> ScopedReducer<AppState, AppAction, AppEnvironment, ThemeReducer> {
    scope_reducer(ThemeReducer, theme_state, theme_action, AppAction::Theme, theme_env)
}

/// Root reducer
pub struct AppReducer {
    inner: CombinedReducer<AppState, AppAction, AppEnvironment>,
}

impl AppReducer {
    /// Scopes both slice reducers into the root
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: combine_reducers(vec![
                Box::new(todos_scope()),
                Box::new(theme_scope()),
            ]),
        }
    }
}

impl Default for AppReducer {
    fn default() -> Self {
        Self::new()
    }
}

impl Reducer for AppReducer {
    type State = AppState;
    type Action = AppAction;
    type Environment = AppEnvironment;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        self.inner.reduce(state, action, env)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;
    use simpodo_core::document::UserDocument;
    use simpodo_core::repository::RepositoryTodoSource;
    use simpodo_core::tag::TagId;
    use simpodo_core::todo::{Todo, TodoId};
    use simpodo_runtime::Store;
    use simpodo_testing::{fixtures, FixedDisplayPreference, InMemoryUserRepository, ReducerTest, SequentialIdGenerator};
    use std::sync::Arc;
    use std::time::Duration;
    use todos::selectors;

    fn env() -> AppEnvironment {
        AppEnvironment::new(TodosEnvironment::new(Arc::new(SequentialIdGenerator::new())))
    }

    #[test]
    fn actions_reach_only_their_slice() {
        let todo = fixtures::todo("1", "todo1", "tagId", fixtures::date(2022, 2, 15));

        ReducerTest::new(AppReducer::new())
            .with_env(env())
            .given_state(AppState::new(&FixedDisplayPreference(false)))
            .when_action(AppAction::Todos(TodosAction::TodoAdded(todo)))
            .when_action(AppAction::Theme(ThemeAction::ThemeToggled))
            .then_state(|state| {
                assert_eq!(selectors::select_total(&state.todos), 1);
                assert!(theme::select_is_dark(&state.theme));
            })
            .run();
    }

    #[test]
    fn initial_state_reads_display_preference() {
        assert!(AppState::new(&FixedDisplayPreference(true)).theme.dark);
        assert!(AppState::new(&FixedDisplayPreference(true)).todos.todos.is_empty());
    }

    #[tokio::test]
    async fn store_hydrates_from_repository() {
        let repo = Arc::new(InMemoryUserRepository::new());
        let mut doc = UserDocument::create(
            Arc::clone(&repo),
            Arc::new(SequentialIdGenerator::with_prefix("id-")),
            fixtures::user(),
        )
        .await
        .unwrap();
        for title in ["first", "second"] {
            doc.add_todo(Todo::new(title, "details", fixtures::date(2022, 2, 15), TagId::from("t")))
                .await
                .unwrap();
        }

        let todos_env = TodosEnvironment::new(Arc::new(SequentialIdGenerator::new()))
            .with_source(Arc::new(RepositoryTodoSource::new(repo)));
        let store = Store::new(
            AppState::new(&FixedDisplayPreference(false)),
            AppReducer::new(),
            AppEnvironment::new(todos_env),
        );

        let outcome = store
            .send_and_wait_for(
                AppAction::Todos(TodosAction::HydrateRequested(doc.user().id.clone())),
                |a| matches!(a, AppAction::Todos(TodosAction::TodosReplaced(_) | TodosAction::HydrationFailed(_))),
                Duration::from_secs(5),
            )
            .await
            .unwrap();
        let AppAction::Todos(TodosAction::TodosReplaced(loaded)) = outcome else {
            panic!("expected the persisted todos");
        };
        assert_eq!(loaded.len(), 2);

        // Feedback actions are broadcast before they are reduced
        tokio::time::timeout(Duration::from_secs(5), async {
            while store.state(|s| selectors::select_total(&s.todos)).await != 2 {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();

        let titles = store
            .state(|s| s.todos.todos.iter().map(|t| t.title.clone()).collect::<Vec<_>>())
            .await;
        assert_eq!(titles, ["first", "second"]);
        assert!(store.state(|s| s.todos.hydration_error.is_none()).await);
    }

    #[tokio::test]
    async fn store_records_not_found_from_slice() {
        let store = Store::new(
            AppState::new(&FixedDisplayPreference(false)),
            AppReducer::new(),
            env(),
        );

        store
            .send(AppAction::Todos(TodosAction::TodoCompleted(TodoId::from("missing"))))
            .await
            .unwrap();

        let error = store.state(|s| s.todos.last_error.clone()).await.unwrap();
        assert_eq!(error.id(), "missing");
    }
}
