use std::sync::Mutex;
use tokio::sync::{Mutex as AsyncMutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::models::CollectionKind;

/// Lifecycle of one collection: `Empty -> Indexing -> Ready`.
/// `Ready -> Indexing` happens only under a reset permit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionState {
    Empty,
    Indexing,
    Ready { count: usize },
}

/// Concurrency gate for one collection.
///
/// Retrieval and indexing share the gate; reset holds it exclusively.
/// Indexing additionally takes the writer lock so only one writer runs.
pub struct CollectionGate {
    kind: CollectionKind,
    gate: RwLock<()>,
    writer: AsyncMutex<()>,
    state: Mutex<CollectionState>,
}

impl CollectionGate {
    fn new(kind: CollectionKind) -> Self {
        Self {
            kind,
            gate: RwLock::new(()),
            writer: AsyncMutex::new(()),
            state: Mutex::new(CollectionState::Empty),
        }
    }

    pub fn kind(&self) -> CollectionKind {
        self.kind
    }

    pub fn state(&self) -> CollectionState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn set_state(&self, next: CollectionState) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        tracing::debug!(collection = %self.kind, from = ?*state, to = ?next, "Collection state change");
        *state = next;
    }

    /// Shared access for retrieval.
    pub async fn read(&self) -> RwLockReadGuard<'_, ()> {
        self.gate.read().await
    }

    pub async fn index_permit(&self) -> IndexPermit<'_> {
        let shared = self.gate.read().await;
        let writer = self.writer.lock().await;
        IndexPermit {
            gate: self,
            _shared: shared,
            _writer: writer,
        }
    }

    pub async fn reset_permit(&self) -> ResetPermit<'_> {
        let exclusive = self.gate.write().await;
        ResetPermit {
            gate: self,
            _exclusive: exclusive,
        }
    }
}

/// Single-writer access for populating an empty collection.
pub struct IndexPermit<'a> {
    gate: &'a CollectionGate,
    _shared: RwLockReadGuard<'a, ()>,
    _writer: MutexGuard<'a, ()>,
}

impl IndexPermit<'_> {
    pub fn state(&self) -> CollectionState {
        self.gate.state()
    }

    /// Moves to `Indexing`. Returns `false` when the collection is already
    /// `Ready`: a ready collection can only be rebuilt through a reset.
    pub fn begin(&self) -> bool {
        if matches!(self.gate.state(), CollectionState::Ready { .. }) {
            return false;
        }
        self.gate.set_state(CollectionState::Indexing);
        true
    }

    /// Records a collection found already populated in the store.
    pub fn adopt(&self, count: usize) {
        self.gate.set_state(settled(count));
    }

    pub fn finish(&self, count: usize) {
        self.gate.set_state(settled(count));
    }

    pub fn fail(&self) {
        self.gate.set_state(CollectionState::Empty);
    }
}

/// Exclusive access: no retrieval or indexing runs while it is held.
pub struct ResetPermit<'a> {
    gate: &'a CollectionGate,
    _exclusive: RwLockWriteGuard<'a, ()>,
}

impl ResetPermit<'_> {
    pub fn state(&self) -> CollectionState {
        self.gate.state()
    }

    pub fn begin(&self) {
        self.gate.set_state(CollectionState::Indexing);
    }

    pub fn finish(&self, count: usize) {
        self.gate.set_state(settled(count));
    }

    pub fn fail(&self) {
        self.gate.set_state(CollectionState::Empty);
    }

    /// Keeps the state the collection had before `begin`.
    pub fn restore(&self, previous: CollectionState) {
        self.gate.set_state(previous);
    }
}

fn settled(count: usize) -> CollectionState {
    if count == 0 {
        CollectionState::Empty
    } else {
        CollectionState::Ready { count }
    }
}

/// Gates for the `cases` and `guidelines` collections.
pub struct CollectionRegistry {
    cases: CollectionGate,
    guidelines: CollectionGate,
}

impl Default for CollectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CollectionRegistry {
    pub fn new() -> Self {
        Self {
            cases: CollectionGate::new(CollectionKind::Cases),
            guidelines: CollectionGate::new(CollectionKind::Guidelines),
        }
    }

    pub fn gate(&self, kind: CollectionKind) -> &CollectionGate {
        match kind {
            CollectionKind::Cases => &self.cases,
            CollectionKind::Guidelines => &self.guidelines,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_empty_indexing_ready() {
        let registry = CollectionRegistry::new();
        let gate = registry.gate(CollectionKind::Cases);
        assert_eq!(gate.state(), CollectionState::Empty);

        let permit = gate.index_permit().await;
        assert!(permit.begin());
        assert_eq!(gate.state(), CollectionState::Indexing);
        permit.finish(12);
        assert_eq!(gate.state(), CollectionState::Ready { count: 12 });
        assert!(!permit.begin());
    }

    #[tokio::test]
    async fn test_zero_documents_stays_empty() {
        let registry = CollectionRegistry::new();
        let permit = registry.gate(CollectionKind::Guidelines).index_permit().await;
        permit.begin();
        permit.finish(0);
        assert_eq!(permit.state(), CollectionState::Empty);
    }

    #[tokio::test]
    async fn test_reset_rebuilds_ready_collection() {
        let registry = CollectionRegistry::new();
        let gate = registry.gate(CollectionKind::Cases);
        gate.index_permit().await.finish(3);

        let reset = gate.reset_permit().await;
        reset.begin();
        assert_eq!(gate.state(), CollectionState::Indexing);
        reset.finish(4);
        assert_eq!(gate.state(), CollectionState::Ready { count: 4 });
    }

    #[tokio::test]
    async fn test_reset_restore_keeps_previous_state() {
        let registry = CollectionRegistry::new();
        let gate = registry.gate(CollectionKind::Guidelines);
        gate.index_permit().await.finish(7);

        let reset = gate.reset_permit().await;
        let previous = reset.state();
        assert_eq!(previous, CollectionState::Ready { count: 7 });
        reset.begin();
        assert_eq!(reset.state(), CollectionState::Indexing);
        reset.restore(previous);
        assert_eq!(gate.state(), CollectionState::Ready { count: 7 });
    }

    #[tokio::test]
    async fn test_reset_excludes_readers() {
        let registry = Arc::new(CollectionRegistry::new());
        let reset = registry.gate(CollectionKind::Cases).reset_permit().await;

        let reader = {
            let registry = Arc::clone(&registry);
            tokio::spawn(async move {
                let _guard = registry.gate(CollectionKind::Cases).read().await;
            })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!reader.is_finished());

        drop(reset);
        tokio::time::timeout(Duration::from_secs(1), reader)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_readers_proceed_during_indexing() {
        let registry = CollectionRegistry::new();
        let gate = registry.gate(CollectionKind::Guidelines);
        let _permit = gate.index_permit().await;
        let read = tokio::time::timeout(Duration::from_millis(200), gate.read()).await;
        assert!(read.is_ok());
    }
}
