//! Reducer composition utilities
//!
//! This module provides utilities for composing reducers in various ways:
//! - **`combine_reducers`**: Run multiple reducers on the same state/action
//! - **`scope_reducer`**: Embed a feature reducer into a parent state, action
//!   and environment
//!
//! A feature slice (todos, theme) owns its own state, action and environment
//! types. The root reducer is built by scoping every slice into the root types
//! and combining the results.
//!
//! # Example
//!
//! ```
//! use simpodo_core::composition::{combine_reducers, scope_reducer};
//! use simpodo_core::effect::Effect;
//! use simpodo_core::reducer::Reducer;
//! use simpodo_core::SmallVec;
//!
//! #[derive(Clone, Default)]
//! struct CounterState { count: i32 }
//!
//! #[derive(Clone)]
//! enum CounterAction { Increment }
//!
//! struct CounterReducer;
//!
//! impl Reducer for CounterReducer {
//!     type State = CounterState;
//!     type Action = CounterAction;
//!     type Environment = ();
//!
//!     fn reduce(&self, state: &mut CounterState, action: CounterAction, _env: &()) -> SmallVec<[Effect<CounterAction>; 4]> {
//!         match action {
//!             CounterAction::Increment => state.count += 1,
//!         }
//!         SmallVec::new()
//!     }
//! }
//!
//! #[derive(Clone, Default)]
//! struct AppState { counter: CounterState }
//!
//! #[derive(Clone)]
//! enum AppAction { Counter(CounterAction) }
//!
//! let scoped = scope_reducer(
//!     CounterReducer,
//!     |app: &mut AppState| &mut app.counter,
//!     |action: AppAction| match action { AppAction::Counter(a) => Some(a) },
//!     AppAction::Counter,
//!     |_env: &()| &(),
//! );
//! let app = combine_reducers(vec![Box::new(scoped)]);
//!
//! let mut state = AppState::default();
//! let _ = app.reduce(&mut state, AppAction::Counter(CounterAction::Increment), &());
//! assert_eq!(state.counter.count, 1);
//! ```

use crate::effect::Effect;
use crate::reducer::Reducer;
use smallvec::SmallVec;

/// Combines multiple reducers that operate on the same state and action types.
///
/// Each reducer is run in sequence, and all effects are collected and concatenated.
#[must_use]
pub fn combine_reducers<S, A, E>(
    reducers: Vec<Box<dyn Reducer<State = S, Action = A, Environment = E> + Send + Sync>>,
) -> CombinedReducer<S, A, E>
where
    S: 'static,
    A: Clone + 'static,
    E: 'static,
{
    CombinedReducer { reducers }
}

/// A combined reducer that runs multiple reducers in sequence.
///
/// Created by [`combine_reducers`].
pub struct CombinedReducer<S, A, E>
where
    S: 'static,
    A: Clone + 'static,
    E: 'static,
{
    reducers: Vec<Box<dyn Reducer<State = S, Action = A, Environment = E> + Send + Sync>>,
}

impl<S, A, E> Reducer for CombinedReducer<S, A, E>
where
    S: 'static,
    A: Clone + 'static,
    E: 'static,
{
    type State = S;
    type Action = A;
    type Environment = E;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        let mut all_effects = SmallVec::new();

        for reducer in &self.reducers {
            let effects = reducer.reduce(state, action.clone(), env);
            all_effects.extend(effects);
        }

        all_effects
    }
}

/// Embeds a child reducer into a parent state, action and environment.
///
/// - `state`: borrows the child state out of the parent state
/// - `extract`: picks the child action out of a parent action (`None` skips the child)
/// - `embed`: lifts child actions produced by effects back into the parent action
/// - `environment`: borrows the child environment out of the parent environment
pub fn scope_reducer<S, A, E, R>(
    reducer: R,
    state: fn(&mut S) -> &mut R::State,
    extract: fn(A) -> Option<R::Action>,
    embed: fn(R::Action) -> A,
    environment: fn(&E) -> &R::Environment,
) -> ScopedReducer<S, A, E, R>
where
    R: Reducer,
{
    ScopedReducer {
        reducer,
        state,
        extract,
        embed,
        environment,
    }
}

/// A scoped reducer that operates on a slice of a parent state.
///
/// Created by [`scope_reducer`].
pub struct ScopedReducer<S, A, E, R>
where
    R: Reducer,
{
    reducer: R,
    state: fn(&mut S) -> &mut R::State,
    extract: fn(A) -> Option<R::Action>,
    embed: fn(R::Action) -> A,
    environment: fn(&E) -> &R::Environment,
}

impl<S, A, E, R> Reducer for ScopedReducer<S, A, E, R>
where
    R: Reducer,
    R::Action: Send + 'static,
    A: Send + 'static,
{
    type State = S;
    type Action = A;
    type Environment = E;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        let Some(child_action) = (self.extract)(action) else {
            return SmallVec::new();
        };

        self.reducer
            .reduce((self.state)(state), child_action, (self.environment)(env))
            .into_iter()
            .map(|effect| effect.map(self.embed))
            .collect()
    }
}
