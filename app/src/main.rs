//! simPodo demo.
//!
//! Creates a user document with a tag and a few todos, then hydrates a
//! client store from it. Uses Postgres when `DATABASE_URL` is set and an
//! in-memory repository otherwise.

use simpodo::store::theme::{self, ThemeAction};
use simpodo::store::todos::{selectors, TodosAction, TodosEnvironment};
use simpodo::{AppAction, AppEnvironment, AppReducer, AppState, Config};
use simpodo_core::document::UserDocument;
use simpodo_core::environment::{Clock, IdGenerator, SystemClock, UuidIdGenerator};
use simpodo_core::repository::{RepositoryTodoSource, UserRepository};
use simpodo_core::tag::Tag;
use simpodo_core::todo::{Todo, TodoId, TodoPatch};
use simpodo_core::user::User;
use simpodo_postgres::PostgresUserRepository;
use simpodo_runtime::Store;
use simpodo_testing::InMemoryUserRepository;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_filter.as_str().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Some(database) = &config.database {
        tracing::info!("Using PostgreSQL user repository");
        let repo = PostgresUserRepository::connect(database).await?;
        repo.migrate().await?;
        run(Arc::new(repo), &config).await
    } else {
        tracing::info!("DATABASE_URL not set, using in-memory user repository");
        run(Arc::new(InMemoryUserRepository::new()), &config).await
    }
}

async fn run<R>(repo: Arc<R>, config: &Config) -> anyhow::Result<()>
where
    R: UserRepository + 'static,
{
    let ids: Arc<dyn IdGenerator> = Arc::new(UuidIdGenerator);
    let now = SystemClock.now();

    let mut doc = UserDocument::create(Arc::clone(&repo), Arc::clone(&ids), User::anonymous()).await?;
    let user_id = doc.user().id.clone();
    tracing::info!(%user_id, "Created user");

    let tag = doc.add_tag(Tag::new("work", "salmon")).await?;
    let mut first = None;
    for (day, title) in ["Write report", "Review notes", "Plan sprint"].into_iter().enumerate() {
        let start = now + chrono::Duration::days(i64::try_from(day)?);
        let todo = doc.add_todo(Todo::new(title, "", start, tag.id.clone())).await?;
        first.get_or_insert(todo.id);
    }
    if let Some(id) = first {
        doc.update_todo(TodoPatch::new(id).completed(true)).await?;
    }

    if let Err(error) = doc.delete_todo(&TodoId::from("missing")).await {
        tracing::info!(%error, "Deleting an unknown todo is rejected");
    }

    let env = AppEnvironment::new(
        TodosEnvironment::new(ids).with_source(Arc::new(RepositoryTodoSource::new(repo))),
    );
    let store = Store::new(AppState::new(config), AppReducer::new(), env);

    // The handle completes once the loaded todos have been reduced
    let mut hydration = store
        .send(AppAction::Todos(TodosAction::HydrateRequested(user_id)))
        .await?;
    hydration.wait_with_timeout(Duration::from_secs(5)).await?;
    if let Some(reason) = store.state(|s| s.todos.hydration_error.clone()).await {
        anyhow::bail!("hydration failed: {reason}");
    }

    store.send(AppAction::Theme(ThemeAction::ThemeToggled)).await?;
    store.shutdown(Duration::from_secs(5)).await?;

    let (total, completed, dark) = store
        .state(|s| {
            (
                selectors::select_total(&s.todos),
                selectors::select_completed_total(&s.todos),
                theme::select_is_dark(&s.theme),
            )
        })
        .await;
    tracing::info!(total, completed, dark, "Store hydrated");

    Ok(())
}
