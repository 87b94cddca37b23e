use std::sync::Arc;

use sqlx::{Pool, Sqlite};

use crate::chat::ChatService;
use crate::config::Config;

#[derive(Clone)]
pub struct AppState {
    pub db: Pool<Sqlite>,
    pub service: ChatService,
    pub config: Arc<Config>,
}
