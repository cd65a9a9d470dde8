//! Shared types for the API layer.

use std::sync::Arc;

use crate::api::error::ApiError;
use crate::core_state::CustodyState;
use crate::error::CustodyError;

// ═══════════════════════════════════════════════════════════
// API context: shared state for the router
// ═══════════════════════════════════════════════════════════

#[derive(Clone)]
pub struct ApiContext {
    pub state: Arc<CustodyState>,
}

impl ApiContext {
    pub fn new(state: Arc<CustodyState>) -> Self {
        Self { state }
    }

    /// Run a ledger operation on the blocking pool.
    ///
    /// Ledger writes take per-medication mutexes and wait on SQLite locks,
    /// neither of which may park an async worker.
    pub async fn run<T, F>(&self, f: F) -> Result<T, ApiError>
    where
        F: FnOnce(&CustodyState) -> Result<T, CustodyError> + Send + 'static,
        T: Send + 'static,
    {
        let state = Arc::clone(&self.state);
        tokio::task::spawn_blocking(move || f(&state))
            .await
            .map_err(|e| ApiError::Internal(format!("blocking task failed: {e}")))?
            .map_err(ApiError::from)
    }
}
