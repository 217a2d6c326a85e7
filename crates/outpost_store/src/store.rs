//! Store facade and recovery.

use crate::config::StoreConfig;
use crate::dir::StoreDir;
use crate::error::{StoreError, StoreResult};
use crate::journal::{self, Journal};
use crate::snapshot;
use crate::state::StoreState;
use crate::stats::{RecoveryReport, StoreStats};
use crate::transaction::Transaction;
use crate::types::{
    ActionId, ActionKind, DatasetName, QueuedAction, Record, SequenceNumber, TransactionId,
};
use outpost_storage::{FileBackend, InMemoryBackend, StorageBackend};
use parking_lot::{Mutex, RwLock};
use std::path::Path;
use tracing::{debug, info, warn};

/// The durable local store.
///
/// Owns the reference datasets and the offline action queue. Every change
/// goes through a journaled [`Transaction`]: either all of it survives a
/// crash or none of it does.
///
/// # Opening
///
/// ```rust,no_run
/// use outpost_store::{DatasetName, LocalStore, Record};
/// use serde_json::json;
/// use std::path::Path;
///
/// let store = LocalStore::open(Path::new("outpost-data"))?;
/// let products = DatasetName::new("products")?;
/// store.replace_all(&products, vec![Record::new("p1", json!({"name": "Tea"}))])?;
/// let id = store.enqueue("sale", json!({"product": "p1", "qty": 2}))?;
/// assert_eq!(store.read_queue()[0].id, id);
/// # Ok::<(), outpost_store::StoreError>(())
/// ```
///
/// # Concurrency
///
/// Readers never block each other. Writers are serialized; a transaction
/// closure must not start another transaction on the same store.
pub struct LocalStore {
    config: StoreConfig,
    dir: Option<StoreDir>,
    writer: Mutex<Writer>,
    state: RwLock<StoreState>,
    recovery: RecoveryReport,
}

struct Writer {
    journal: Journal,
    snapshot: Box<dyn StorageBackend>,
    last_txid: TransactionId,
    checkpoints: u64,
}

impl LocalStore {
    /// Opens (or creates) a store in directory `path` with default settings.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Locked`] if another handle has the directory open
    /// - [`StoreError::Corrupted`] / [`StoreError::ChecksumMismatch`] if
    ///   recovery finds damaged data
    pub fn open(path: &Path) -> StoreResult<Self> {
        Self::open_with_config(path, StoreConfig::default())
    }

    /// Opens a store in directory `path`.
    ///
    /// # Errors
    ///
    /// See [`LocalStore::open`]; additionally fails if `error_if_exists` is
    /// set and the directory already holds data.
    pub fn open_with_config(path: &Path, config: StoreConfig) -> StoreResult<Self> {
        let dir = StoreDir::open(path, config.create_if_missing)?;
        if config.error_if_exists && !dir.is_new() {
            return Err(StoreError::invalid_directory(format!(
                "a store already exists at {}",
                path.display()
            )));
        }

        let journal = FileBackend::open(&dir.journal_path())?;
        let snapshot = FileBackend::open(&dir.snapshot_path())?;
        let mut store = Self::open_with_backends(Box::new(journal), Box::new(snapshot), config)?;
        info!(
            path = %path.display(),
            sequence = %store.committed_sequence(),
            replayed = store.recovery.replayed,
            "opened local store"
        );
        store.dir = Some(dir);
        Ok(store)
    }

    /// Opens a store over caller-supplied backends, without a directory or lock.
    ///
    /// # Errors
    ///
    /// Fails if recovery finds damaged data or a backend errors.
    pub fn open_with_backends(
        journal: Box<dyn StorageBackend>,
        snapshot: Box<dyn StorageBackend>,
        config: StoreConfig,
    ) -> StoreResult<Self> {
        let mut journal = Journal::new(journal, config.sync_on_commit);
        let (state, last_txid, recovery) = recover(&mut journal, &*snapshot)?;

        Ok(Self {
            config,
            dir: None,
            writer: Mutex::new(Writer {
                journal,
                snapshot,
                last_txid,
                checkpoints: 0,
            }),
            state: RwLock::new(state),
            recovery,
        })
    }

    /// Opens an empty, non-durable store.
    ///
    /// # Errors
    ///
    /// Never fails in practice; the signature matches the other constructors.
    pub fn open_in_memory() -> StoreResult<Self> {
        Self::open_with_backends(
            Box::new(InMemoryBackend::new()),
            Box::new(InMemoryBackend::new()),
            StoreConfig::default(),
        )
    }

    /// Runs `f` as one atomic transaction.
    ///
    /// If `f` returns `Ok` its changes are journaled and applied; if it
    /// returns `Err`, or the journal write fails, nothing changes.
    ///
    /// # Errors
    ///
    /// Returns the closure's error or the journal error.
    pub fn transaction<F, T>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&mut Transaction<'_>) -> StoreResult<T>,
    {
        let mut writer = self.writer.lock();

        let (value, mutations, sequence) = {
            let state = self.state.read();
            let mut txn = Transaction::new(&state);
            let value = f(&mut txn)?;
            (value, txn.into_mutations(), state.sequence.next())
        };
        if mutations.is_empty() {
            return Ok(value);
        }

        let txid = TransactionId::new(writer.last_txid.as_u64() + 1);
        let encoded = journal::encode_transaction(txid, sequence, &mutations)?;
        writer.journal.commit(&encoded)?;
        writer.last_txid = txid;

        let changes = mutations.len();
        {
            let mut state = self.state.write();
            for mutation in mutations {
                state.apply(mutation);
            }
            state.sequence = sequence;
        }
        debug!(%txid, %sequence, changes, bytes = encoded.len(), "committed transaction");

        self.maybe_checkpoint(&mut writer);
        Ok(value)
    }

    /// Atomically replaces dataset `name` with exactly `records`.
    ///
    /// # Errors
    ///
    /// Fails on duplicate record IDs or a journal error; the previous
    /// contents then remain.
    pub fn replace_all(&self, name: &DatasetName, records: Vec<Record>) -> StoreResult<()> {
        self.transaction(|txn| txn.replace_dataset(name.clone(), records))
    }

    /// Atomically replaces several datasets in one transaction.
    ///
    /// # Errors
    ///
    /// See [`LocalStore::replace_all`]; on error no dataset changes.
    pub fn replace_datasets<I>(&self, datasets: I) -> StoreResult<()>
    where
        I: IntoIterator<Item = (DatasetName, Vec<Record>)>,
    {
        self.transaction(|txn| {
            for (name, records) in datasets {
                txn.replace_dataset(name, records)?;
            }
            Ok(())
        })
    }

    /// Returns every record of `name`, ordered by record ID. An unknown
    /// dataset reads as empty.
    #[must_use]
    pub fn read_all(&self, name: &DatasetName) -> Vec<Record> {
        self.state
            .read()
            .datasets
            .get(name)
            .map(|records| records.values().cloned().collect())
            .unwrap_or_default()
    }

    /// True if `name` has been written at least once.
    #[must_use]
    pub fn has_dataset(&self, name: &DatasetName) -> bool {
        self.state.read().datasets.contains_key(name)
    }

    /// Names of all stored datasets.
    #[must_use]
    pub fn dataset_names(&self) -> Vec<DatasetName> {
        self.state.read().datasets.keys().cloned().collect()
    }

    /// Appends `action` to the queue.
    ///
    /// # Errors
    ///
    /// Fails if an action with the same ID is queued, or on a journal error.
    pub fn append_action(&self, action: QueuedAction) -> StoreResult<()> {
        self.transaction(|txn| txn.append_action(action))
    }

    /// Records a new action and returns its ID.
    ///
    /// Works the same online or offline; the action waits in the queue until
    /// a sync cycle gets it confirmed.
    ///
    /// # Errors
    ///
    /// Fails if `kind` is blank or on a journal error.
    pub fn enqueue(
        &self,
        kind: impl Into<String>,
        payload: serde_json::Value,
    ) -> StoreResult<ActionId> {
        let action = QueuedAction::new(ActionKind::new(kind)?, payload);
        let id = action.id;
        self.append_action(action)?;
        debug!(action = %id, "queued action");
        Ok(id)
    }

    /// Returns the queue in insertion order.
    #[must_use]
    pub fn read_queue(&self) -> Vec<QueuedAction> {
        self.state.read().queue.clone()
    }

    /// Number of queued actions.
    #[must_use]
    pub fn queue_len(&self) -> usize {
        self.state.read().queue.len()
    }

    /// Removes the listed actions in one transaction and returns how many
    /// were queued. Unknown IDs are ignored.
    ///
    /// # Errors
    ///
    /// Fails on a journal error; the queue is then unchanged.
    pub fn remove_by_ids<'i, I>(&self, ids: I) -> StoreResult<usize>
    where
        I: IntoIterator<Item = &'i ActionId>,
    {
        self.transaction(|txn| Ok(txn.remove_actions(ids)))
    }

    /// Writes a snapshot of the current state and empties the journal.
    ///
    /// # Errors
    ///
    /// Fails if the snapshot cannot be written; the journal is then kept.
    pub fn checkpoint(&self) -> StoreResult<()> {
        let mut writer = self.writer.lock();
        self.checkpoint_locked(&mut writer)
    }

    /// Sequence number of the last commit.
    #[must_use]
    pub fn committed_sequence(&self) -> SequenceNumber {
        self.state.read().sequence
    }

    /// What recovery found at open.
    #[must_use]
    pub fn recovery_report(&self) -> RecoveryReport {
        self.recovery
    }

    /// Current statistics.
    ///
    /// # Errors
    ///
    /// Fails if the journal size cannot be read.
    pub fn stats(&self) -> StoreResult<StoreStats> {
        let writer = self.writer.lock();
        let journal_bytes = writer.journal.size()?;
        let state = self.state.read();
        Ok(StoreStats {
            datasets: state
                .datasets
                .iter()
                .map(|(name, records)| (name.clone(), records.len()))
                .collect(),
            queued_actions: state.queue.len(),
            oldest_action_at: state.queue.iter().map(|a| a.created_at).min(),
            journal_bytes,
            committed_sequence: state.sequence,
            checkpoints: writer.checkpoints,
        })
    }

    /// The store directory, if opened from one.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.dir.as_ref().map(StoreDir::path)
    }

    /// The configuration the store was opened with.
    #[must_use]
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    fn maybe_checkpoint(&self, writer: &mut Writer) {
        let limit = self.config.max_journal_size;
        if limit == 0 {
            return;
        }
        match writer.journal.size() {
            Ok(size) if size > limit => {
                if let Err(err) = self.checkpoint_locked(writer) {
                    warn!(error = %err, journal_bytes = size, "automatic checkpoint failed");
                }
            }
            Ok(_) => {}
            Err(err) => warn!(error = %err, "could not read journal size"),
        }
    }

    fn checkpoint_locked(&self, writer: &mut Writer) -> StoreResult<()> {
        let (encoded, sequence) = {
            let state = self.state.read();
            (snapshot::encode(&state, writer.last_txid)?, state.sequence)
        };
        writer.snapshot.replace(&encoded)?;
        // Commits up to `sequence` now live in the snapshot; replay would skip
        // them even if this truncate never happened.
        writer.journal.truncate(0)?;
        writer.checkpoints += 1;
        info!(%sequence, bytes = encoded.len(), "checkpoint written");
        Ok(())
    }
}

fn recover(
    journal: &mut Journal,
    snapshot: &dyn StorageBackend,
) -> StoreResult<(StoreState, TransactionId, RecoveryReport)> {
    let mut report = RecoveryReport::default();
    let (mut state, mut last_txid) = match snapshot::decode(&snapshot.read_all()?)? {
        Some(image) => {
            report.snapshot_sequence = Some(image.state.sequence);
            (image.state, image.last_txid)
        }
        None => (StoreState::default(), TransactionId::new(0)),
    };

    let bytes = journal.read_all()?;
    let scan = journal::scan(&bytes)?;
    let discarded_bytes = scan.discarded_bytes();
    let committed_len = scan.committed_len;
    let torn = scan.torn_tail;
    if let Some(max) = scan.max_txid() {
        last_txid = last_txid.max(max);
    }
    report.discarded = scan.uncommitted.len();

    for txn in scan.committed {
        if txn.sequence <= state.sequence {
            report.skipped += 1;
            continue;
        }
        for mutation in txn.mutations {
            state.apply(mutation);
        }
        state.sequence = txn.sequence;
        report.replayed += 1;
    }

    if discarded_bytes > 0 {
        warn!(
            bytes = discarded_bytes,
            torn,
            uncommitted = report.discarded,
            "discarding incomplete journal tail"
        );
        journal.truncate(committed_len)?;
        report.truncated_bytes = discarded_bytes;
    }

    Ok((state, last_txid, report))
}

impl std::fmt::Debug for LocalStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("LocalStore")
            .field("path", &self.path())
            .field("datasets", &state.datasets.len())
            .field("queued_actions", &state.queue.len())
            .field("sequence", &state.sequence)
            .finish_non_exhaustive()
    }
}
