//! API Handlers
//!
//! HTTP request handlers for each storage server endpoint. Adapters block
//! on disk and network I/O, so every call runs on the blocking pool.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Path, Query, State},
    Json,
};

use super::error::{ApiError, ApiResult};
use crate::adapter::{Adapter, AdapterFactory};
use crate::config::Config;
use crate::error::Result;
use crate::models::{
    validate_key, ClearResponse, CounterRequest, CounterResponse, DeleteResponse, GetResponse,
    HasResponse, HealthResponse, KeysQuery, KeysResponse, SetRequest, SetResponse,
};

/// Application state shared across all handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    pub adapter: Arc<dyn Adapter>,
    /// Backend name reported by /health
    pub adapter_kind: &'static str,
}

impl AppState {
    pub fn new(adapter: Arc<dyn Adapter>, adapter_kind: &'static str) -> Self {
        Self {
            adapter,
            adapter_kind,
        }
    }

    /// Builds the configured adapter through the default factory.
    pub fn from_config(config: &Config) -> Result<Self> {
        let adapter = AdapterFactory::default().new_instance(&config.adapter)?;
        Ok(Self::new(adapter, config.adapter.kind()))
    }

    /// Runs `op` against the adapter on the blocking pool.
    async fn run<T, F>(&self, op: F) -> ApiResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&dyn Adapter) -> Result<T> + Send + 'static,
    {
        let adapter = Arc::clone(&self.adapter);
        let result = tokio::task::spawn_blocking(move || op(adapter.as_ref())).await?;
        Ok(result?)
    }
}

fn check_key(key: &str) -> ApiResult<()> {
    match validate_key(key) {
        Some(msg) => Err(ApiError::InvalidRequest(msg)),
        None => Ok(()),
    }
}

/// Handler for PUT /set
pub async fn set_handler(
    State(state): State<AppState>,
    Json(req): Json<SetRequest>,
) -> ApiResult<Json<SetResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(ApiError::InvalidRequest(error_msg));
    }

    let SetRequest { key, value, ttl } = req;
    let lookup = key.clone();
    let stored = state
        .run(move |adapter| adapter.set(&lookup, &value, ttl.map(Duration::from_secs)))
        .await?;

    // A zero TTL removes the key and still reports success
    let kept = stored && ttl != Some(0);
    Ok(Json(SetResponse::new(key, kept)))
}

/// Handler for GET /get/:key
pub async fn get_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> ApiResult<Json<GetResponse>> {
    check_key(&key)?;

    let lookup = key.clone();
    match state.run(move |adapter| adapter.get(&lookup)).await? {
        Some(value) => Ok(Json(GetResponse::new(key, value))),
        None => Err(ApiError::NotFound(key)),
    }
}

/// Handler for GET /has/:key
pub async fn has_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> ApiResult<Json<HasResponse>> {
    check_key(&key)?;

    let lookup = key.clone();
    let exists = state.run(move |adapter| adapter.has(&lookup)).await?;
    Ok(Json(HasResponse { key, exists }))
}

/// Handler for DELETE /del/:key
pub async fn delete_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> ApiResult<Json<DeleteResponse>> {
    check_key(&key)?;

    let lookup = key.clone();
    if state.run(move |adapter| adapter.delete(&lookup)).await? {
        Ok(Json(DeleteResponse::new(key)))
    } else {
        Err(ApiError::NotFound(key))
    }
}

/// Handler for POST /incr/:key
pub async fn increment_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
    body: Option<Json<CounterRequest>>,
) -> ApiResult<Json<CounterResponse>> {
    let by = body.map(|Json(req)| req.step()).unwrap_or(1);
    counter(state, key, by).await
}

/// Handler for POST /decr/:key
pub async fn decrement_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
    body: Option<Json<CounterRequest>>,
) -> ApiResult<Json<CounterResponse>> {
    let by = body.map(|Json(req)| req.step()).unwrap_or(1);
    let by = by
        .checked_neg()
        .ok_or_else(|| ApiError::InvalidRequest("Step out of range".to_string()))?;
    counter(state, key, by).await
}

async fn counter(state: AppState, key: String, by: i64) -> ApiResult<Json<CounterResponse>> {
    check_key(&key)?;

    let lookup = key.clone();
    match state.run(move |adapter| adapter.increment(&lookup, by)).await? {
        Some(value) => Ok(Json(CounterResponse { key, value })),
        None => Err(ApiError::NotFound(format!("{} (missing or not an integer)", key))),
    }
}

/// Handler for GET /keys
pub async fn keys_handler(
    State(state): State<AppState>,
    Query(query): Query<KeysQuery>,
) -> ApiResult<Json<KeysResponse>> {
    let prefix = query.prefix.unwrap_or_default();
    let keys = state.run(move |adapter| adapter.keys(&prefix)).await?;
    Ok(Json(KeysResponse::new(keys)))
}

/// Handler for POST /clear
pub async fn clear_handler(State(state): State<AppState>) -> ApiResult<Json<ClearResponse>> {
    let cleared = state.run(|adapter| adapter.clear()).await?;
    Ok(Json(ClearResponse { cleared }))
}

/// Handler for GET /health
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse::healthy(state.adapter_kind))
}
