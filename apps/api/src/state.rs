use std::sync::Arc;

use sqlx::PgPool;

use crate::gen_client::{ImageGenerator, TextGenerator};
use crate::habits::store::HabitStore;
use crate::profile::store::ProfileStore;
use crate::storage::AvatarStorage;

/// Shared application state injected into all route handlers via Axum extractors.
///
/// External collaborators (stores, generation models, object storage) are
/// carried as trait objects built once in `main` — no ambient singletons.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub habits: Arc<dyn HabitStore>,
    pub profiles: Arc<dyn ProfileStore>,
    pub text_gen: Arc<dyn TextGenerator>,
    pub image_gen: Arc<dyn ImageGenerator>,
    pub storage: Arc<dyn AvatarStorage>,
}
