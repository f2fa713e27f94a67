//! Synchronous request/response services.
//!
//! Direct commands (for instance "start visual servoing") are plain calls
//! that block the step until the remote side answers with a numeric status
//! code.  The step interprets the code; the service only transports it.

use async_trait::async_trait;
use scout_types::ScoutError;

/// A remote command that answers with a status code.
///
/// # Contract
///
/// * `Ok(code)` – the call completed; `code` is whatever the server replied.
/// * `Err(ScoutError::ServiceUnavailable { .. })` – the call itself could not
///   complete (server down, connection dropped, …).
#[async_trait]
pub trait StatusService: Send + Sync {
    /// Name used in logs, e.g. `"visual_servoing/do_visual_servoing"`.
    fn name(&self) -> &str;

    /// Issue the request and wait for the reply.
    async fn call(&self) -> Result<i32, ScoutError>;
}
