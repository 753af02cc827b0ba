//! Reconnect protocols
//!
//! An idle timeout is the provider's stream duration limit and is recovered
//! without telling the client. Any other stream failure is recovered in the
//! open: the client sees `reconnecting` and then `recovered`, or a terminal
//! `RECOVERY_FAILED` carrying the text captured so far. Both paths claim the
//! session's recovery slot first, so at most one runs per session.

use super::context::SessionId;
use super::manager::TranscriptionManager;
use super::registry::RecoveryGuard;
use crate::provider::ProviderError;
use crate::transport::{ClientMessage, CloseCode, SessionStatus};
use anyhow::Result;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// How often a failed stream re-checks a recovery that is still finishing
const CLAIM_RETRY: Duration = Duration::from_millis(10);

enum Recovery {
    Recovered,
    /// The client stopped before the failure; its transcript was delivered
    Finalized,
    /// The client disconnected while we waited
    Abandoned,
}

impl TranscriptionManager {
    /// Replace a stream that hit the provider's duration limit
    ///
    /// The session has no context while the replacement opens, so audio
    /// and stop requests arriving in that window are dropped. A client that
    /// stops then must stop again once the new stream is live.
    pub(super) async fn silent_recovery(&self, id: &SessionId, generation: u64) {
        let registry = &self.inner().registry;
        let Some(_guard) = self.claim_recovery(id, generation).await else {
            debug!("Idle timeout from superseded stream of session {} ignored", id);
            return;
        };

        let Some(context) = registry.remove_generation(id, generation) else {
            return;
        };
        let carried = context.transcript().await;
        if let Err(e) = context.stream().close().await {
            warn!("Failed to close timed-out stream for {}: {}", id, e);
        }

        if context.stop_requested() {
            info!("Session {} timed out while stopping, finalizing", id);
            self.deliver_transcript(id, &carried).await;
            return;
        }

        info!("Provider stream limit reached for session {}, reconnecting", id);
        if let Err(e) = self.start_with(id, carried.clone()).await {
            error!("Silent reconnect failed for session {}: {:#}", id, e);
            self.fail_recovery(id, &carried).await;
            return;
        }

        // The client may have left while the new stream was opening
        if !self.inner().clients.is_open(id) {
            info!("Session {} disconnected during reconnect, releasing stream", id);
            self.detach(id).await;
        }
    }

    /// Replace a stream that failed, keeping the client informed
    pub(super) async fn full_recovery(&self, id: &SessionId, generation: u64, cause: ProviderError) {
        let Some(_guard) = self.claim_recovery(id, generation).await else {
            debug!("Error from superseded stream of session {} ignored: {}", id, cause);
            return;
        };

        warn!("Provider stream for session {} failed: {}. Recovering", id, cause);

        let mut carried = String::new();
        match self.reconnect(id, generation, &mut carried).await {
            Ok(Recovery::Recovered) => {
                info!("Session {} recovered", id);
                self.notify(id, &ClientMessage::status(SessionStatus::Recovered))
                    .await;
            }
            Ok(Recovery::Finalized) => {}
            Ok(Recovery::Abandoned) => {
                info!("Session {} disconnected during recovery", id);
            }
            Err(e) => {
                error!("Recovery failed for session {}: {:#}", id, e);
                self.fail_recovery(id, &carried).await;
            }
        }
    }

    /// Claim the recovery slot on behalf of a live stream generation
    ///
    /// A recovery that has already installed this generation may still hold
    /// the slot while it reports back; wait for it instead of dropping the
    /// failure. Returns `None` once the generation is no longer current.
    async fn claim_recovery(&self, id: &SessionId, generation: u64) -> Option<RecoveryGuard<'_>> {
        let registry = &self.inner().registry;
        loop {
            registry.current(id, generation)?;

            if let Some(guard) = registry.begin_recovery(id) {
                return Some(guard);
            }

            debug!("Session {} is finishing another recovery, waiting", id);
            tokio::time::sleep(CLAIM_RETRY).await;
        }
    }

    async fn reconnect(
        &self,
        id: &SessionId,
        generation: u64,
        carried: &mut String,
    ) -> Result<Recovery> {
        let Some(context) = self.inner().registry.remove_generation(id, generation) else {
            return Ok(Recovery::Abandoned);
        };
        *carried = context.transcript().await;
        if let Err(e) = context.stream().close().await {
            warn!("Failed to close failed stream for {}: {}", id, e);
        }

        if context.stop_requested() {
            self.deliver_transcript(id, carried).await;
            return Ok(Recovery::Finalized);
        }

        self.notify(id, &ClientMessage::status(SessionStatus::Reconnecting))
            .await;

        tokio::time::sleep(self.inner().recovery_backoff).await;

        if !self.inner().clients.is_open(id) {
            return Ok(Recovery::Abandoned);
        }

        self.start_with(id, carried.clone()).await?;

        // The client may have left while the new stream was opening
        if !self.inner().clients.is_open(id) {
            self.detach(id).await;
            return Ok(Recovery::Abandoned);
        }

        Ok(Recovery::Recovered)
    }

    /// Hand the captured text to the client and end the connection
    async fn fail_recovery(&self, id: &SessionId, carried: &str) {
        self.detach(id).await;
        self.notify(id, &ClientMessage::recovery_failed(carried)).await;
        self.close_client(id, CloseCode::ServerError).await;
    }
}
