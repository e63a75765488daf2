//! Three-tier event store with automatic compaction.
//!
//! - HOT: ring of the most recent sequence numbers, O(1) append and lookup
//! - WARM: indexed in-memory events beyond the hot window
//! - COLD: zlib-compressed snapshots, O(log k) lookup via binary search
//!
//! One lock serializes all access. Appends validate the per-workflow hash
//! chain before any state changes; a bad batch leaves the store untouched.
//! Compacting warm to cold evicts the compacted events from memory (events
//! still inside the hot window are kept), so `max_warm_events` is a real
//! memory bound.

use crate::error::{TemporalError, TemporalResult};
use crate::event::{EventKind, WorkflowEvent, GENESIS_HASH};
use chrono::{DateTime, Utc};
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::io::{Read, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

/// Controls when and how compaction occurs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompactionPolicy {
    pub snapshot_interval_events: u64,
    pub snapshot_interval_seconds: u64,
    pub max_hot_events: usize,
    pub max_warm_events: usize,
    pub compression_level: u32,
}

impl Default for CompactionPolicy {
    fn default() -> Self {
        Self {
            snapshot_interval_events: 1000,
            snapshot_interval_seconds: 60,
            max_hot_events: 1000,
            max_warm_events: 100_000,
            compression_level: 6,
        }
    }
}

impl CompactionPolicy {
    pub fn should_snapshot(&self, events_since: u64, seconds_since: u64) -> bool {
        events_since >= self.snapshot_interval_events
            || seconds_since >= self.snapshot_interval_seconds
    }

    pub fn should_compact_warm(&self, warm_count: usize) -> bool {
        warm_count >= self.max_warm_events
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotRecord {
    event: WorkflowEvent,
    sequence_number: u64,
}

/// Compressed, self-describing batch of historical events for one workflow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub snapshot_id: String,
    pub max_sequence_number: u64,
    pub timestamp: DateTime<Utc>,
    pub workflow_id: String,
    #[serde(with = "serde_bytes_hex")]
    pub compressed_data: Vec<u8>,
    pub event_count: usize,
}

mod serde_bytes_hex {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(de)?;
        hex::decode(&s).map_err(serde::de::Error::custom)
    }
}

impl Snapshot {
    /// Compress `(event, sequence)` pairs into a snapshot
    pub fn create(
        events: &[(WorkflowEvent, u64)],
        workflow_id: &str,
        compression_level: u32,
    ) -> TemporalResult<Snapshot> {
        if events.is_empty() {
            return Ok(Snapshot {
                snapshot_id: Uuid::new_v4().to_string(),
                max_sequence_number: 0,
                timestamp: Utc::now(),
                workflow_id: workflow_id.to_string(),
                compressed_data: Vec::new(),
                event_count: 0,
            });
        }

        let mut records: Vec<SnapshotRecord> = events
            .iter()
            .map(|(event, seq)| SnapshotRecord {
                event: event.clone(),
                sequence_number: *seq,
            })
            .collect();
        records.sort_by_key(|r| r.sequence_number);
        let max_sequence_number = records.last().map(|r| r.sequence_number).unwrap_or(0);

        let json = serde_json::to_vec(&records)?;
        let mut encoder =
            ZlibEncoder::new(Vec::new(), Compression::new(compression_level.min(9)));
        encoder
            .write_all(&json)
            .map_err(|e| TemporalError::Compression(e.to_string()))?;
        let compressed_data = encoder
            .finish()
            .map_err(|e| TemporalError::Compression(e.to_string()))?;

        Ok(Snapshot {
            snapshot_id: Uuid::new_v4().to_string(),
            max_sequence_number,
            timestamp: Utc::now(),
            workflow_id: workflow_id.to_string(),
            compressed_data,
            event_count: records.len(),
        })
    }

    /// Restore the `(event, sequence)` pairs, ordered by sequence
    pub fn decompress(&self) -> TemporalResult<Vec<(WorkflowEvent, u64)>> {
        if self.compressed_data.is_empty() {
            return Ok(Vec::new());
        }
        let mut decoder = ZlibDecoder::new(self.compressed_data.as_slice());
        let mut json = Vec::new();
        decoder
            .read_to_end(&mut json)
            .map_err(|e| TemporalError::Compression(e.to_string()))?;
        let records: Vec<SnapshotRecord> = serde_json::from_slice(&json)?;
        Ok(records
            .into_iter()
            .map(|r| (r.event, r.sequence_number))
            .collect())
    }
}

/// Outcome of an append
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppendResult {
    pub event_ids: Vec<String>,
    pub sequence_numbers: Vec<u64>,
}

/// Time-window query parameters
#[derive(Debug, Clone, Default)]
pub struct RangeQuery {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub workflow_id: Option<String>,
    pub kinds: Option<Vec<EventKind>>,
    pub limit: usize,
    pub offset: usize,
}

impl RangeQuery {
    pub fn all() -> Self {
        Self {
            limit: 1000,
            ..Default::default()
        }
    }
}

/// Paginated query outcome
#[derive(Debug, Clone)]
pub struct RangeResult {
    pub events: Vec<WorkflowEvent>,
    pub total_count: usize,
    pub has_more: bool,
}

/// Per-tier population counts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierStats {
    pub hot: usize,
    pub warm: usize,
    pub cold_snapshots: usize,
}

struct StoreInner {
    // Dense by sequence - 1; None once evicted to cold
    events: Vec<Option<WorkflowEvent>>,
    by_id: HashMap<String, u64>,
    by_workflow: HashMap<String, Vec<u64>>,
    hot: VecDeque<u64>,
    // Kept ordered by max_sequence_number for binary search
    snapshots: Vec<Snapshot>,
    sequence: u64,
    tail_hash: HashMap<String, String>,
    last_snapshot_time: DateTime<Utc>,
    events_since_snapshot: u64,
}

impl StoreInner {
    fn in_memory(&self, sequence: u64) -> Option<&WorkflowEvent> {
        if sequence == 0 || sequence > self.events.len() as u64 {
            return None;
        }
        self.events[(sequence - 1) as usize].as_ref()
    }

    fn warm_count(&self) -> usize {
        let in_memory = self.events.iter().filter(|e| e.is_some()).count();
        in_memory.saturating_sub(self.hot.len())
    }
}

/// Tiered append-only event store
pub struct TieredEventStore {
    policy: CompactionPolicy,
    cold_storage_path: Option<PathBuf>,
    inner: Arc<Mutex<StoreInner>>,
}

impl Default for TieredEventStore {
    fn default() -> Self {
        Self::new(CompactionPolicy::default(), None)
    }
}

impl TieredEventStore {
    pub fn new(policy: CompactionPolicy, cold_storage_path: Option<PathBuf>) -> Self {
        Self {
            policy,
            cold_storage_path,
            inner: Arc::new(Mutex::new(StoreInner {
                events: Vec::new(),
                by_id: HashMap::new(),
                by_workflow: HashMap::new(),
                hot: VecDeque::new(),
                snapshots: Vec::new(),
                sequence: 0,
                tail_hash: HashMap::new(),
                last_snapshot_time: Utc::now(),
                events_since_snapshot: 0,
            })),
        }
    }

    pub fn policy(&self) -> &CompactionPolicy {
        &self.policy
    }

    pub fn append(&self, event: WorkflowEvent) -> TemporalResult<AppendResult> {
        self.append_batch(vec![event])
    }

    /// Append events atomically: sequence numbers are assigned in order and
    /// the per-workflow hash chain is validated for the whole batch before
    /// any state changes.
    pub fn append_batch(&self, events: Vec<WorkflowEvent>) -> TemporalResult<AppendResult> {
        if events.is_empty() {
            return Ok(AppendResult::default());
        }
        let mut inner = self.inner.lock();

        // Validation pass over a shadow of the tail hashes
        let mut shadow_tails: HashMap<String, String> = HashMap::new();
        for event in &events {
            let tail = shadow_tails
                .get(&event.workflow_id)
                .or_else(|| inner.tail_hash.get(&event.workflow_id))
                .cloned()
                .unwrap_or_else(|| GENESIS_HASH.to_string());
            if event.previous_hash != tail {
                return Err(TemporalError::BrokenLink {
                    event_id: event.event_id.clone(),
                    expected: tail,
                    actual: event.previous_hash.clone(),
                });
            }
            if event.compute_hash() != event.event_hash {
                return Err(TemporalError::HashMismatch(event.event_id.clone()));
            }
            shadow_tails.insert(event.workflow_id.clone(), event.event_hash.clone());
        }

        // Commit pass
        let mut result = AppendResult::default();
        for event in events {
            inner.sequence += 1;
            let seq = inner.sequence;

            inner.by_id.insert(event.event_id.clone(), seq);
            inner
                .by_workflow
                .entry(event.workflow_id.clone())
                .or_default()
                .push(seq);
            inner
                .tail_hash
                .insert(event.workflow_id.clone(), event.event_hash.clone());

            result.event_ids.push(event.event_id.clone());
            result.sequence_numbers.push(seq);

            inner.events.push(Some(event));
            inner.hot.push_back(seq);
            if inner.hot.len() > self.policy.max_hot_events {
                inner.hot.pop_front();
            }
            inner.events_since_snapshot += 1;
        }

        self.maybe_compact(&mut inner);
        Ok(result)
    }

    pub fn get_by_id(&self, event_id: &str) -> Option<WorkflowEvent> {
        let inner = self.inner.lock();
        let seq = *inner.by_id.get(event_id)?;
        if let Some(event) = inner.in_memory(seq) {
            return Some(event.clone());
        }
        self.lookup_in_cold(&inner, seq)
    }

    pub fn get_by_sequence(&self, sequence: u64) -> Option<WorkflowEvent> {
        let inner = self.inner.lock();
        if sequence == 0 || sequence > inner.sequence {
            return None;
        }
        if let Some(event) = inner.in_memory(sequence) {
            return Some(event.clone());
        }
        self.lookup_in_cold(&inner, sequence)
    }

    /// Time-window + kind filter + pagination, complete across warm and cold
    pub fn query_range(&self, query: &RangeQuery) -> TemporalResult<RangeResult> {
        let inner = self.inner.lock();
        let mut candidates: Vec<(u64, WorkflowEvent)> = Vec::new();
        let mut seen: std::collections::HashSet<u64> = std::collections::HashSet::new();

        let memory_seqs: Vec<u64> = match &query.workflow_id {
            Some(wf) => inner.by_workflow.get(wf).cloned().unwrap_or_default(),
            None => (1..=inner.sequence).collect(),
        };
        for seq in memory_seqs {
            if let Some(event) = inner.in_memory(seq) {
                seen.insert(seq);
                candidates.push((seq, event.clone()));
            }
        }

        for snapshot in &inner.snapshots {
            if let Some(wf) = &query.workflow_id {
                if snapshot.workflow_id != *wf {
                    continue;
                }
            }
            for (event, seq) in snapshot.decompress()? {
                if seen.insert(seq) {
                    candidates.push((seq, event));
                }
            }
        }

        candidates.sort_by_key(|(seq, _)| *seq);
        let filtered: Vec<WorkflowEvent> = candidates
            .into_iter()
            .map(|(_, e)| e)
            .filter(|e| {
                if let Some(start) = query.start {
                    if e.timestamp < start {
                        return false;
                    }
                }
                if let Some(end) = query.end {
                    if e.timestamp > end {
                        return false;
                    }
                }
                if let Some(kinds) = &query.kinds {
                    if !kinds.contains(&e.kind) {
                        return false;
                    }
                }
                true
            })
            .collect();

        let total_count = filtered.len();
        let limit = if query.limit == 0 { 1000 } else { query.limit };
        let events: Vec<WorkflowEvent> = filtered
            .into_iter()
            .skip(query.offset)
            .take(limit)
            .collect();
        let has_more = query.offset + limit < total_count;

        Ok(RangeResult {
            events,
            total_count,
            has_more,
        })
    }

    /// Lazy, pull-based replay in sequence order
    pub fn replay(
        &self,
        from_sequence: u64,
        to_sequence: Option<u64>,
        workflow_id: Option<&str>,
    ) -> ReplayIter {
        let inner = self.inner.lock();
        let upper = to_sequence.unwrap_or(inner.sequence);
        let mut seqs: Vec<u64> = match workflow_id {
            Some(wf) => inner
                .by_workflow
                .get(wf)
                .map(|s| {
                    s.iter()
                        .copied()
                        .filter(|seq| *seq > from_sequence && *seq <= upper)
                        .collect()
                })
                .unwrap_or_default(),
            None => (from_sequence + 1..=upper).collect(),
        };
        seqs.sort_unstable();
        let snapshots = inner.snapshots.clone();
        drop(inner);

        ReplayIter {
            store: Arc::clone(&self.inner),
            cold: ColdLookup { snapshots },
            seqs,
            position: 0,
        }
    }

    /// Causal ancestors of an event, oldest first, following `caused_by[0]`
    pub fn get_causal_chain(&self, event_id: &str, max_depth: usize) -> Vec<WorkflowEvent> {
        let mut chain = VecDeque::new();
        let mut current = Some(event_id.to_string());
        let mut depth = 0;

        while let Some(id) = current {
            if depth >= max_depth {
                break;
            }
            let Some(event) = self.get_by_id(&id) else {
                break;
            };
            current = event.caused_by.first().cloned();
            chain.push_front(event);
            depth += 1;
        }
        chain.into()
    }

    pub fn latest_sequence(&self) -> u64 {
        self.inner.lock().sequence
    }

    /// Event count, including the cold tier
    pub fn count(&self, workflow_id: Option<&str>) -> usize {
        let inner = self.inner.lock();
        match workflow_id {
            Some(wf) => inner.by_workflow.get(wf).map(|s| s.len()).unwrap_or(0),
            None => inner.by_id.len(),
        }
    }

    /// Walk every persisted link for one workflow across all tiers
    pub fn verify_chain_integrity(&self, workflow_id: &str) -> TemporalResult<(bool, String)> {
        let events: Vec<WorkflowEvent> = {
            let inner = self.inner.lock();
            let mut collected: Vec<(u64, WorkflowEvent)> = Vec::new();
            let mut seen: std::collections::HashSet<u64> = std::collections::HashSet::new();
            for seq in inner.by_workflow.get(workflow_id).cloned().unwrap_or_default() {
                if let Some(event) = inner.in_memory(seq) {
                    seen.insert(seq);
                    collected.push((seq, event.clone()));
                }
            }
            for snapshot in &inner.snapshots {
                if snapshot.workflow_id != workflow_id {
                    continue;
                }
                for (event, seq) in snapshot.decompress()? {
                    if seen.insert(seq) {
                        collected.push((seq, event));
                    }
                }
            }
            collected.sort_by_key(|(seq, _)| *seq);
            collected.into_iter().map(|(_, e)| e).collect()
        };

        let mut expected_previous = GENESIS_HASH.to_string();
        for event in &events {
            if event.previous_hash != expected_previous {
                return Ok((
                    false,
                    format!(
                        "Hash chain broken at event {}: expected previous_hash {}, got {}",
                        event.event_id, expected_previous, event.previous_hash
                    ),
                ));
            }
            if event.compute_hash() != event.event_hash {
                return Ok((false, format!("Hash mismatch at event {}", event.event_id)));
            }
            expected_previous = event.event_hash.clone();
        }
        Ok((true, String::new()))
    }

    /// Manually materialize a cold-tier snapshot of in-memory events
    pub fn create_snapshot(&self, workflow_id: Option<&str>) -> TemporalResult<Snapshot> {
        let mut inner = self.inner.lock();
        let pairs: Vec<(WorkflowEvent, u64)> = match workflow_id {
            Some(wf) => inner
                .by_workflow
                .get(wf)
                .cloned()
                .unwrap_or_default()
                .into_iter()
                .filter_map(|seq| inner.in_memory(seq).map(|e| (e.clone(), seq)))
                .collect(),
            None => inner
                .events
                .iter()
                .enumerate()
                .filter_map(|(idx, e)| e.as_ref().map(|e| (e.clone(), idx as u64 + 1)))
                .collect(),
        };

        let owner = workflow_id
            .map(str::to_string)
            .or_else(|| pairs.first().map(|(e, _)| e.workflow_id.clone()))
            .unwrap_or_default();
        let snapshot = Snapshot::create(&pairs, &owner, self.policy.compression_level)?;
        self.persist_snapshot(&snapshot);
        insert_sorted(&mut inner.snapshots, snapshot.clone());
        Ok(snapshot)
    }

    /// Repopulate in-memory indices from a snapshot, advancing the global
    /// sequence counter
    pub fn restore_from_snapshot(&self, snapshot: &Snapshot) -> TemporalResult<()> {
        let mut inner = self.inner.lock();
        for (event, seq) in snapshot.decompress()? {
            let idx = (seq - 1) as usize;
            if inner.events.len() <= idx {
                inner.events.resize(idx + 1, None);
            }
            inner.by_id.insert(event.event_id.clone(), seq);
            let workflow_seqs = inner.by_workflow.entry(event.workflow_id.clone()).or_default();
            if !workflow_seqs.contains(&seq) {
                workflow_seqs.push(seq);
            }
            inner
                .tail_hash
                .entry(event.workflow_id.clone())
                .or_insert_with(|| event.event_hash.clone());
            inner.events[idx] = Some(event);
            inner.hot.push_back(seq);
            if inner.hot.len() > self.policy.max_hot_events {
                inner.hot.pop_front();
            }
            inner.sequence = inner.sequence.max(seq);
        }
        // Restored events may extend a workflow's chain; recompute its tail
        for seqs in inner.by_workflow.clone().values_mut() {
            seqs.sort_unstable();
            if let Some(last) = seqs.last() {
                if let Some(event) = inner.in_memory(*last) {
                    let (workflow, hash) =
                        (event.workflow_id.clone(), event.event_hash.clone());
                    inner.tail_hash.insert(workflow, hash);
                }
            }
        }
        Ok(())
    }

    pub fn list_snapshots(&self) -> Vec<Snapshot> {
        self.inner.lock().snapshots.clone()
    }

    pub fn tier_stats(&self) -> TierStats {
        let inner = self.inner.lock();
        TierStats {
            hot: inner.hot.len(),
            warm: inner.warm_count(),
            cold_snapshots: inner.snapshots.len(),
        }
    }

    fn maybe_compact(&self, inner: &mut StoreInner) {
        let seconds_since = (Utc::now() - inner.last_snapshot_time)
            .num_seconds()
            .max(0) as u64;
        if self
            .policy
            .should_snapshot(inner.events_since_snapshot, seconds_since)
        {
            inner.last_snapshot_time = Utc::now();
            inner.events_since_snapshot = 0;
            if let Err(e) = self.snapshot_in_memory(inner) {
                warn!(error = %e, "periodic snapshot failed; will retry on next trigger");
            }
        }
        if self.policy.should_compact_warm(inner.warm_count()) {
            if let Err(e) = self.compact_warm_to_cold(inner) {
                warn!(error = %e, "warm-to-cold compaction failed; will retry on next trigger");
            }
        }
    }

    /// Per-workflow snapshot of everything still in memory (no eviction)
    fn snapshot_in_memory(&self, inner: &mut StoreInner) -> TemporalResult<()> {
        let mut by_workflow: HashMap<String, Vec<(WorkflowEvent, u64)>> = HashMap::new();
        for (idx, slot) in inner.events.iter().enumerate() {
            if let Some(event) = slot {
                by_workflow
                    .entry(event.workflow_id.clone())
                    .or_default()
                    .push((event.clone(), idx as u64 + 1));
            }
        }
        for (workflow_id, pairs) in by_workflow {
            let snapshot =
                Snapshot::create(&pairs, &workflow_id, self.policy.compression_level)?;
            self.persist_snapshot(&snapshot);
            insert_sorted(&mut inner.snapshots, snapshot);
        }
        debug!(snapshots = inner.snapshots.len(), "periodic snapshot complete");
        Ok(())
    }

    /// Snapshot warm events per workflow, then evict them from memory.
    /// Events inside the hot window stay resident.
    fn compact_warm_to_cold(&self, inner: &mut StoreInner) -> TemporalResult<()> {
        let hot: std::collections::HashSet<u64> = inner.hot.iter().copied().collect();
        let mut by_workflow: HashMap<String, Vec<(WorkflowEvent, u64)>> = HashMap::new();
        for (idx, slot) in inner.events.iter().enumerate() {
            let seq = idx as u64 + 1;
            if hot.contains(&seq) {
                continue;
            }
            if let Some(event) = slot {
                by_workflow
                    .entry(event.workflow_id.clone())
                    .or_default()
                    .push((event.clone(), seq));
            }
        }
        if by_workflow.is_empty() {
            return Ok(());
        }

        let mut evicted = 0usize;
        for (workflow_id, pairs) in by_workflow {
            let snapshot =
                Snapshot::create(&pairs, &workflow_id, self.policy.compression_level)?;
            self.persist_snapshot(&snapshot);
            insert_sorted(&mut inner.snapshots, snapshot);
            for (_, seq) in pairs {
                inner.events[(seq - 1) as usize] = None;
                evicted += 1;
            }
        }
        debug!(evicted, "compacted warm tier to cold");
        Ok(())
    }

    /// One file per snapshot, written via temp file + atomic rename so a
    /// half-written snapshot is never observable. Failures are reported but
    /// never roll back in-memory state.
    fn persist_snapshot(&self, snapshot: &Snapshot) {
        let Some(dir) = &self.cold_storage_path else {
            return;
        };
        let result = (|| -> std::io::Result<()> {
            std::fs::create_dir_all(dir)?;
            let tmp = dir.join(format!(".{}.tmp", snapshot.snapshot_id));
            std::fs::write(&tmp, &snapshot.compressed_data)?;
            std::fs::rename(&tmp, dir.join(format!("{}.snapshot", snapshot.snapshot_id)))?;
            Ok(())
        })();
        if let Err(e) = result {
            warn!(snapshot_id = %snapshot.snapshot_id, error = %e, "snapshot write failed");
        }
    }

    fn lookup_in_cold(&self, inner: &StoreInner, sequence: u64) -> Option<WorkflowEvent> {
        // Snapshots are ordered by max_sequence_number; the first snapshot
        // whose max covers the target is the only place it can live, but
        // neighbours are checked to tolerate overlapping manual snapshots.
        let idx = inner
            .snapshots
            .partition_point(|s| s.max_sequence_number < sequence);
        let lo = idx.saturating_sub(1);
        let hi = (idx + 2).min(inner.snapshots.len());
        for snapshot in &inner.snapshots[lo..hi] {
            if let Ok(records) = snapshot.decompress() {
                if let Ok(found) =
                    records.binary_search_by_key(&sequence, |(_, seq)| *seq)
                {
                    return Some(records[found].0.clone());
                }
            }
        }
        // Fall back to a full scan for unordered overlap cases
        for snapshot in &inner.snapshots {
            if snapshot.max_sequence_number < sequence {
                continue;
            }
            if let Ok(records) = snapshot.decompress() {
                if let Ok(found) =
                    records.binary_search_by_key(&sequence, |(_, seq)| *seq)
                {
                    return Some(records[found].0.clone());
                }
            }
        }
        None
    }
}

fn insert_sorted(snapshots: &mut Vec<Snapshot>, snapshot: Snapshot) {
    let idx = snapshots
        .partition_point(|s| s.max_sequence_number <= snapshot.max_sequence_number);
    snapshots.insert(idx, snapshot);
}

struct ColdLookup {
    snapshots: Vec<Snapshot>,
}

impl ColdLookup {
    fn get(&self, sequence: u64) -> Option<WorkflowEvent> {
        for snapshot in &self.snapshots {
            if snapshot.max_sequence_number < sequence {
                continue;
            }
            if let Ok(records) = snapshot.decompress() {
                if let Ok(found) = records.binary_search_by_key(&sequence, |(_, seq)| *seq) {
                    return Some(records[found].0.clone());
                }
            }
        }
        None
    }
}

/// Pull-based iterator over a replay window; events are fetched lazily on
/// each `next` call.
pub struct ReplayIter {
    store: Arc<Mutex<StoreInner>>,
    cold: ColdLookup,
    seqs: Vec<u64>,
    position: usize,
}

impl Iterator for ReplayIter {
    type Item = WorkflowEvent;

    fn next(&mut self) -> Option<WorkflowEvent> {
        while self.position < self.seqs.len() {
            let seq = self.seqs[self.position];
            self.position += 1;
            let from_memory = {
                let inner = self.store.lock();
                inner.in_memory(seq).cloned()
            };
            if let Some(event) = from_memory.or_else(|| self.cold.get(seq)) {
                return Some(event);
            }
            // Sequence gaps (e.g. replay over all workflows with sparse
            // restore) are skipped rather than treated as exhaustion
        }
        None
    }
}
