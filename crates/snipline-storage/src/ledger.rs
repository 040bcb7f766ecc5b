//! History ledger.
//!
//! A single task owns the newest-first list of [`HistoryRecord`]s. Callers
//! talk to it through a cloneable [`HistoryLedger`] handle; commands are
//! applied in the order received and each change is written through to the
//! key-value store before the caller gets its reply. If the write fails the
//! in-memory list is left as it was.
//!
//! The task also follows the store's change feed, so a history limit written
//! through any path is applied to the list.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, info, warn};

use snipline_core::error::SniplineError;
use snipline_core::types::{HistoryRecord, RecordId};

use crate::kv::{keys, KeyValueStore, KeyValueStoreExt, StoreChange};

const COMMAND_CHANNEL_CAPACITY: usize = 128;

/// Edit applied to one record inside the ledger task.
pub type Mutator = Box<dyn FnOnce(&mut HistoryRecord) + Send>;

enum LedgerCommand {
    Append {
        record: HistoryRecord,
        reply: oneshot::Sender<Result<(), SniplineError>>,
    },
    Update {
        id: RecordId,
        mutator: Mutator,
        reply: oneshot::Sender<Result<Option<HistoryRecord>, SniplineError>>,
    },
    Truncate {
        limit: usize,
        reply: oneshot::Sender<Result<usize, SniplineError>>,
    },
    Get {
        id: RecordId,
        reply: oneshot::Sender<Option<HistoryRecord>>,
    },
    List {
        reply: oneshot::Sender<Vec<HistoryRecord>>,
    },
    Limit {
        reply: oneshot::Sender<usize>,
    },
}

/// Handle to the ledger task.
#[derive(Clone)]
pub struct HistoryLedger {
    tx: mpsc::Sender<LedgerCommand>,
}

impl HistoryLedger {
    /// Load the persisted history and start the owning task.
    ///
    /// A stored list longer than `limit` is cut down and written back.
    /// Must be called from within a tokio runtime.
    pub fn spawn(store: Arc<dyn KeyValueStore>, limit: usize) -> Result<Self, SniplineError> {
        let mut records: Vec<HistoryRecord> =
            store.get_json(keys::HISTORY)?.unwrap_or_default();

        if records.len() > limit {
            records.truncate(limit);
            store.set_json(keys::HISTORY, &records)?;
        }
        info!(records = records.len(), limit, "History ledger started");

        let changes = store.subscribe();
        let (tx, rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let actor = LedgerActor {
            store,
            records,
            limit,
            rx,
        };
        tokio::spawn(actor.run(changes));

        Ok(Self { tx })
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> LedgerCommand,
    ) -> Result<T, SniplineError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(make(reply))
            .await
            .map_err(|_| SniplineError::ShuttingDown)?;
        rx.await.map_err(|_| SniplineError::ShuttingDown)
    }

    /// Insert `record` at the front, dropping the oldest records beyond the cap.
    pub async fn append(&self, record: HistoryRecord) -> Result<(), SniplineError> {
        self.request(|reply| LedgerCommand::Append { record, reply })
            .await?
    }

    /// Apply `mutator` to the record with `id` and persist.
    ///
    /// Returns the updated record, or `Ok(None)` if no record has that id,
    /// in which case nothing is written.
    pub async fn update_record<F>(
        &self,
        id: RecordId,
        mutator: F,
    ) -> Result<Option<HistoryRecord>, SniplineError>
    where
        F: FnOnce(&mut HistoryRecord) + Send + 'static,
    {
        let mutator: Mutator = Box::new(mutator);
        self.request(|reply| LedgerCommand::Update { id, mutator, reply })
            .await?
    }

    /// Set a new cap and drop the oldest records beyond it.
    ///
    /// Returns how many records were dropped.
    pub async fn truncate(&self, limit: usize) -> Result<usize, SniplineError> {
        self.request(|reply| LedgerCommand::Truncate { limit, reply })
            .await?
    }

    pub async fn get(&self, id: RecordId) -> Result<Option<HistoryRecord>, SniplineError> {
        self.request(|reply| LedgerCommand::Get { id, reply }).await
    }

    /// Snapshot of all records, newest first.
    pub async fn list(&self) -> Result<Vec<HistoryRecord>, SniplineError> {
        self.request(|reply| LedgerCommand::List { reply }).await
    }

    pub async fn limit(&self) -> Result<usize, SniplineError> {
        self.request(|reply| LedgerCommand::Limit { reply }).await
    }
}

impl std::fmt::Debug for HistoryLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HistoryLedger").finish()
    }
}

struct LedgerActor {
    store: Arc<dyn KeyValueStore>,
    records: Vec<HistoryRecord>,
    limit: usize,
    rx: mpsc::Receiver<LedgerCommand>,
}

impl LedgerActor {
    async fn run(mut self, mut changes: broadcast::Receiver<StoreChange>) {
        let mut watching = true;
        loop {
            tokio::select! {
                command = self.rx.recv() => match command {
                    Some(command) => self.handle(command),
                    None => break,
                },
                change = changes.recv(), if watching => match change {
                    Ok(change) if change.key == keys::HISTORY_LIMIT => self.reload_limit(),
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!(skipped, "Store change feed lagged; rechecking history limit");
                        self.reload_limit();
                    }
                    Err(broadcast::error::RecvError::Closed) => watching = false,
                },
            }
        }
        debug!("History ledger stopped");
    }

    /// Adopt the stored history limit if it differs from the current cap.
    fn reload_limit(&mut self) {
        match self.store.get_json::<usize>(keys::HISTORY_LIMIT) {
            Ok(Some(limit)) if limit != self.limit => {
                if let Err(e) = self.truncate(limit) {
                    warn!(limit, error = %e, "Stored history limit not applied");
                }
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "Unreadable history limit; keeping current cap"),
        }
    }

    fn handle(&mut self, command: LedgerCommand) {
        // A dropped reply receiver means the caller went away; the change
        // still stands.
        match command {
            LedgerCommand::Append { record, reply } => {
                let _ = reply.send(self.append(record));
            }
            LedgerCommand::Update { id, mutator, reply } => {
                let _ = reply.send(self.update(id, mutator));
            }
            LedgerCommand::Truncate { limit, reply } => {
                let _ = reply.send(self.truncate(limit));
            }
            LedgerCommand::Get { id, reply } => {
                let _ = reply.send(self.records.iter().find(|r| r.id == id).cloned());
            }
            LedgerCommand::List { reply } => {
                let _ = reply.send(self.records.clone());
            }
            LedgerCommand::Limit { reply } => {
                let _ = reply.send(self.limit);
            }
        }
    }

    /// Persist `next` and adopt it only if the write succeeded.
    fn commit(&mut self, next: Vec<HistoryRecord>) -> Result<(), SniplineError> {
        if let Err(e) = self.store.set_json(keys::HISTORY, &next) {
            warn!(error = %e, "History write failed; keeping previous state");
            return Err(e);
        }
        self.records = next;
        Ok(())
    }

    fn append(&mut self, record: HistoryRecord) -> Result<(), SniplineError> {
        let id = record.id;
        let mut next = Vec::with_capacity(self.records.len() + 1);
        next.push(record);
        next.extend(self.records.iter().cloned());
        let dropped = next.len().saturating_sub(self.limit);
        next.truncate(self.limit);
        self.commit(next)?;
        debug!(record_id = %id, dropped, "History record appended");
        Ok(())
    }

    fn update(
        &mut self,
        id: RecordId,
        mutator: Mutator,
    ) -> Result<Option<HistoryRecord>, SniplineError> {
        let Some(index) = self.records.iter().position(|r| r.id == id) else {
            debug!(record_id = %id, "History record not found; update skipped");
            return Ok(None);
        };

        let mut next = self.records.clone();
        let record = &mut next[index];
        mutator(record);
        // Capture-time fields are fixed.
        let original = &self.records[index];
        record.id = original.id;
        record.text.clone_from(&original.text);
        record.timestamp = original.timestamp;
        record.source_url.clone_from(&original.source_url);
        let updated = record.clone();

        self.commit(next)?;
        Ok(Some(updated))
    }

    fn truncate(&mut self, limit: usize) -> Result<usize, SniplineError> {
        let dropped = self.records.len().saturating_sub(limit);
        if dropped > 0 {
            let mut next = self.records.clone();
            next.truncate(limit);
            self.commit(next)?;
        }
        self.limit = limit;
        info!(limit, dropped, "History limit applied");
        Ok(dropped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::MemoryStore;
    use snipline_core::types::{ExecutionStatus, PromptExecution};
    use tokio::sync::broadcast;

    fn record(text: &str) -> HistoryRecord {
        HistoryRecord::new(text, None)
    }

    fn persisted(store: &dyn KeyValueStore) -> Vec<HistoryRecord> {
        store.get_json(keys::HISTORY).unwrap().unwrap_or_default()
    }

    /// Store whose writes can be switched off.
    struct FlakyStore {
        inner: MemoryStore,
        fail: std::sync::atomic::AtomicBool,
    }

    impl KeyValueStore for FlakyStore {
        fn get(&self, key: &str) -> Result<Option<String>, SniplineError> {
            self.inner.get(key)
        }

        fn set(&self, key: &str, value: &str) -> Result<(), SniplineError> {
            if self.fail.load(std::sync::atomic::Ordering::SeqCst) {
                return Err(SniplineError::Storage("disk full".to_string()));
            }
            self.inner.set(key, value)
        }

        fn subscribe(&self) -> broadcast::Receiver<crate::kv::StoreChange> {
            self.inner.subscribe()
        }
    }

    #[tokio::test]
    async fn test_append_is_newest_first_and_capped() {
        let store = Arc::new(MemoryStore::new());
        let ledger = HistoryLedger::spawn(store.clone(), 10).unwrap();

        let records: Vec<HistoryRecord> = (1..=12).map(|i| record(&format!("r{i}"))).collect();
        for r in &records {
            ledger.append(r.clone()).await.unwrap();
        }

        let texts: Vec<String> = ledger.list().await.unwrap().into_iter().map(|r| r.text).collect();
        let expected: Vec<String> = (3..=12).rev().map(|i| format!("r{i}")).collect();
        assert_eq!(texts, expected);

        let stored: Vec<String> = persisted(store.as_ref()).into_iter().map(|r| r.text).collect();
        assert_eq!(stored, expected);
    }

    #[tokio::test]
    async fn test_append_never_exceeds_limit() {
        for limit in [0usize, 1, 3] {
            let ledger = HistoryLedger::spawn(Arc::new(MemoryStore::new()), limit).unwrap();
            for i in 0..5 {
                ledger.append(record(&i.to_string())).await.unwrap();
                assert!(ledger.list().await.unwrap().len() <= limit);
            }
        }
    }

    #[tokio::test]
    async fn test_update_record_applies_mutator_and_persists() {
        let store = Arc::new(MemoryStore::new());
        let ledger = HistoryLedger::spawn(store.clone(), 10).unwrap();
        let r = record("hello");
        let id = r.id;
        ledger.append(r).await.unwrap();

        let updated = ledger
            .update_record(id, |rec| {
                rec.prompt_results
                    .insert("P".to_string(), PromptExecution::processing("P"));
            })
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.prompt_status("P"), ExecutionStatus::Processing);

        let stored = persisted(store.as_ref());
        assert_eq!(stored[0].prompt_status("P"), ExecutionStatus::Processing);
    }

    #[tokio::test]
    async fn test_update_missing_record_is_noop() {
        let store = Arc::new(MemoryStore::new());
        let ledger = HistoryLedger::spawn(store.clone(), 10).unwrap();
        let mut rx = store.subscribe();

        let result = ledger
            .update_record(RecordId::new(), |rec| rec.text = "changed".to_string())
            .await
            .unwrap();
        assert!(result.is_none());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_update_cannot_change_capture_fields() {
        let ledger = HistoryLedger::spawn(Arc::new(MemoryStore::new()), 10).unwrap();
        let r = record("original");
        let id = r.id;
        ledger.append(r).await.unwrap();

        let updated = ledger
            .update_record(id, |rec| rec.text = "tampered".to_string())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.text, "original");
    }

    #[tokio::test]
    async fn test_truncate_drops_oldest_and_sets_cap() {
        let ledger = HistoryLedger::spawn(Arc::new(MemoryStore::new()), 10).unwrap();
        for i in 1..=5 {
            ledger.append(record(&format!("r{i}"))).await.unwrap();
        }

        assert_eq!(ledger.truncate(2).await.unwrap(), 3);
        let texts: Vec<String> = ledger.list().await.unwrap().into_iter().map(|r| r.text).collect();
        assert_eq!(texts, vec!["r5", "r4"]);
        assert_eq!(ledger.limit().await.unwrap(), 2);

        ledger.append(record("r6")).await.unwrap();
        assert_eq!(ledger.list().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_stored_limit_change_truncates() {
        let store = Arc::new(MemoryStore::new());
        let ledger = HistoryLedger::spawn(store.clone(), 10).unwrap();
        for i in 1..=5 {
            ledger.append(record(&format!("r{i}"))).await.unwrap();
        }

        store.set_json(keys::HISTORY_LIMIT, &2usize).unwrap();

        let mut limit = 10;
        for _ in 0..50 {
            limit = ledger.limit().await.unwrap();
            if limit == 2 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert_eq!(limit, 2);
        let texts: Vec<String> = ledger.list().await.unwrap().into_iter().map(|r| r.text).collect();
        assert_eq!(texts, vec!["r5", "r4"]);
        assert_eq!(persisted(store.as_ref()).len(), 2);
    }

    #[tokio::test]
    async fn test_spawn_loads_and_trims_persisted_history() {
        let store = Arc::new(MemoryStore::new());
        let existing: Vec<HistoryRecord> = (0..4).map(|i| record(&i.to_string())).collect();
        store.set_json(keys::HISTORY, &existing).unwrap();

        let ledger = HistoryLedger::spawn(store.clone(), 2).unwrap();
        let list = ledger.list().await.unwrap();
        assert_eq!(list, existing[..2].to_vec());
        assert_eq!(persisted(store.as_ref()).len(), 2);
    }

    #[tokio::test]
    async fn test_failed_write_leaves_state_unchanged() {
        let store = Arc::new(FlakyStore {
            inner: MemoryStore::new(),
            fail: std::sync::atomic::AtomicBool::new(false),
        });
        let ledger = HistoryLedger::spawn(store.clone(), 10).unwrap();
        let r = record("kept");
        let id = r.id;
        ledger.append(r).await.unwrap();

        store.fail.store(true, std::sync::atomic::Ordering::SeqCst);
        assert!(ledger.append(record("lost")).await.is_err());
        assert!(ledger
            .update_record(id, |rec| {
                rec.prompt_results
                    .insert("P".to_string(), PromptExecution::processing("P"));
            })
            .await
            .is_err());

        let list = ledger.list().await.unwrap();
        assert_eq!(list.len(), 1);
        assert!(list[0].prompt_results.is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_updates_to_disjoint_fields_are_kept() {
        let ledger = HistoryLedger::spawn(Arc::new(MemoryStore::new()), 10).unwrap();
        let r = record("shared");
        let id = r.id;
        ledger.append(r).await.unwrap();

        let mut handles = Vec::new();
        for i in 0..20 {
            let ledger = ledger.clone();
            handles.push(tokio::spawn(async move {
                let name = format!("P{i}");
                ledger
                    .update_record(id, move |rec| {
                        rec.prompt_results
                            .insert(name.clone(), PromptExecution::processing(name));
                    })
                    .await
                    .unwrap();
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        let rec = ledger.get(id).await.unwrap().unwrap();
        assert_eq!(rec.prompt_results.len(), 20);
    }
}
