//! Shared application state wired into every route

use archihub_core_model::{EditorHandle, Model, spawn_editor};
use archihub_core_types::{Handle, handle};
use archihub_systems_apply::{ApplyEngine, OperationStore, spawn_sweeper};
use std::time::Instant;

use crate::config::ServerConfig;
use crate::rate_limit::RateLimiter;

pub struct AppState {
    pub editor: EditorHandle,
    pub engine: Handle<ApplyEngine>,
    pub store: Handle<OperationStore>,
    pub limiter: RateLimiter,
    pub config: ServerConfig,
    pub started_at: Instant,
}

impl AppState {
    /// Boot the editor actor, operation store and engine for one server
    pub fn bootstrap(config: ServerConfig) -> Handle<Self> {
        let editor = spawn_editor(Model::new("archihub"));
        let store = OperationStore::new(config.op_ttl);
        spawn_sweeper(store.clone());
        let engine = ApplyEngine::new(editor.clone(), store.clone(), config.fast);
        handle(Self {
            editor,
            engine,
            store,
            limiter: RateLimiter::new(config.rate_limit_per_min),
            config,
            started_at: Instant::now(),
        })
    }
}
