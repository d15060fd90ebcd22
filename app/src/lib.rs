//! simPodo client application.
//!
//! - [`store`]: the client store slices (todos, theme) and the root
//!   [`AppReducer`](store::AppReducer) scoped from them
//! - [`config`]: environment configuration
//!
//! # Quick Start
//!
//! ```no_run
//! use simpodo::store::{AppAction, AppEnvironment, AppReducer, AppState};
//! use simpodo::store::todos::{TodosAction, TodosEnvironment};
//! use simpodo::Config;
//! use simpodo_core::environment::UuidIdGenerator;
//! use simpodo_core::todo::Todo;
//! use simpodo_core::tag::TagId;
//! use simpodo_runtime::Store;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::from_env()?;
//! let env = AppEnvironment::new(TodosEnvironment::new(Arc::new(UuidIdGenerator)));
//! let store = Store::new(AppState::new(&config), AppReducer::new(), env);
//!
//! let todo = Todo::new("Buy milk", "", chrono::Utc::now(), TagId::from("errands"));
//! store.send(AppAction::Todos(TodosAction::TodoAdded(todo))).await?;
//!
//! let total = store.state(|s| s.todos.todos.len()).await;
//! println!("Total todos: {total}");
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod store;

pub use config::{Config, ConfigError};
pub use store::{AppAction, AppEnvironment, AppReducer, AppState};
