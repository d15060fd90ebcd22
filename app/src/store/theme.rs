//! Theme slice: light or dark presentation.

use simpodo_core::environment::DisplayPreference;
use simpodo_core::{effect::Effect, reducer::Reducer, SmallVec};

/// State of the theme slice
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ThemeState {
    /// Dark color scheme active
    pub dark: bool,
}

impl ThemeState {
    /// Initial theme following the host preference
    #[must_use]
    pub fn from_preference(preference: &dyn DisplayPreference) -> Self {
        Self {
            dark: preference.prefers_dark(),
        }
    }
}

/// Actions of the theme slice
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ThemeAction {
    /// Switch between light and dark
    ThemeToggled,
}

/// Reducer for the theme slice
#[derive(Clone, Copy, Debug, Default)]
pub struct ThemeReducer;

impl Reducer for ThemeReducer {
    type State = ThemeState;
    type Action = ThemeAction;
    type Environment = ();

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        _env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            ThemeAction::ThemeToggled => {
                state.dark = !state.dark;
                tracing::debug!(dark = state.dark, "Theme toggled");
            },
        }
        SmallVec::new()
    }
}

/// Whether the dark scheme is active
#[must_use]
pub const fn select_is_dark(state: &ThemeState) -> bool {
    state.dark
}
