use super::context::{SessionContext, SessionId};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Concurrent store of live session contexts and in-flight recoveries
///
/// Every operation locks a single shard for the duration of one map call;
/// nothing here is held across an `.await`.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    /// Active sessions (session_id → context)
    sessions: DashMap<SessionId, Arc<SessionContext>>,

    /// Sessions mid-recovery (session_id → guard token)
    recovering: DashMap<SessionId, u64>,

    next_token: AtomicU64,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &SessionId) -> Option<Arc<SessionContext>> {
        self.sessions.get(id).map(|entry| Arc::clone(entry.value()))
    }

    /// The context for `id`, only if it still belongs to `generation`
    pub fn current(&self, id: &SessionId, generation: u64) -> Option<Arc<SessionContext>> {
        self.get(id)
            .filter(|context| context.generation() == generation)
    }

    pub fn contains(&self, id: &SessionId) -> bool {
        self.sessions.contains_key(id)
    }

    /// Register `context` unless `id` already has one; on conflict the
    /// rejected context is handed back
    pub fn insert_if_absent(
        &self,
        id: SessionId,
        context: Arc<SessionContext>,
    ) -> Result<(), Arc<SessionContext>> {
        match self.sessions.entry(id) {
            Entry::Occupied(_) => Err(context),
            Entry::Vacant(slot) => {
                slot.insert(context);
                Ok(())
            }
        }
    }

    pub fn remove(&self, id: &SessionId) -> Option<Arc<SessionContext>> {
        self.sessions.remove(id).map(|(_, context)| context)
    }

    /// Remove the context for `id` only if it belongs to `generation`
    pub fn remove_generation(
        &self,
        id: &SessionId,
        generation: u64,
    ) -> Option<Arc<SessionContext>> {
        self.sessions
            .remove_if(id, |_, context| context.generation() == generation)
            .map(|(_, context)| context)
    }

    /// Atomically claim the recovery slot for `id`
    ///
    /// Returns `None` if a recovery is already in flight. The slot is
    /// released when the returned guard drops.
    pub fn begin_recovery(&self, id: &SessionId) -> Option<RecoveryGuard<'_>> {
        let token = self.next_token.fetch_add(1, Ordering::SeqCst);
        match self.recovering.entry(id.clone()) {
            Entry::Occupied(_) => None,
            Entry::Vacant(slot) => {
                slot.insert(token);
                Some(RecoveryGuard {
                    registry: self,
                    id: id.clone(),
                    token,
                })
            }
        }
    }

    /// Drop any recovery claim for `id`, whoever holds it
    pub fn release_recovery(&self, id: &SessionId) {
        self.recovering.remove(id);
    }

    pub fn is_recovering(&self, id: &SessionId) -> bool {
        self.recovering.contains_key(id)
    }

    pub fn active_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn recovering_count(&self) -> usize {
        self.recovering.len()
    }
}

/// Holds a session's recovery slot until dropped
#[derive(Debug)]
pub struct RecoveryGuard<'a> {
    registry: &'a SessionRegistry,
    id: SessionId,
    token: u64,
}

impl Drop for RecoveryGuard<'_> {
    fn drop(&mut self) {
        // Only our own claim; an abnormal close may already have released it
        self.registry
            .recovering
            .remove_if(&self.id, |_, token| *token == self.token);
    }
}
