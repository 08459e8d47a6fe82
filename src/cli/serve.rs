//! `mnemograph serve`: builds the shared application state and runs the
//! HTTP API server until shutdown (§4.12, §5, §6).

use crate::api;
use crate::config::Settings;
use crate::Result;

/// Builds the application state and serves it until the process receives
/// a shutdown signal.
///
/// # Errors
///
/// Returns an error if the dependencies (storage, embedder, LLM client)
/// cannot be constructed, or if binding the listener fails.
pub async fn run(settings: Settings) -> Result<()> {
    let state = api::AppState::build(settings)?;
    api::serve(state).await
}
