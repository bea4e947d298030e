//! # In-Memory Blob Store
//!
//! Blob store kept in process memory. Reads are served as a chunked stream.
//! An optional visibility lag makes fresh writes invisible for a while (the
//! previous version, if any, is served instead), which reproduces the
//! eventual-consistency window retrieval has to tolerate.

use async_trait::async_trait;
use futures::StreamExt;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

use super::{BlobReader, BlobStore, CollaboratorError, CollaboratorResult, WriteAck};

const COLLABORATOR: &str = "blob_store";
const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

#[derive(Debug, Clone)]
struct Version {
    content: Vec<u8>,
    generation: u64,
}

#[derive(Debug, Clone)]
struct StoredObject {
    current: Version,
    visible_at: Instant,
    previous: Option<Version>,
}

impl StoredObject {
    fn readable(&self, now: Instant) -> Option<&Version> {
        if self.visible_at <= now {
            Some(&self.current)
        } else {
            self.previous.as_ref()
        }
    }
}

#[derive(Debug)]
pub struct InMemoryBlobStore {
    objects: RwLock<HashMap<(String, String), StoredObject>>,
    chunk_size: usize,
    visibility_lag: Duration,
    next_generation: AtomicU64,
    write_count: AtomicU64,
    read_failures: AtomicUsize,
    write_failures: AtomicUsize,
    stream_failures: AtomicUsize,
}

impl InMemoryBlobStore {
    pub fn new() -> Self {
        Self {
            objects: RwLock::new(HashMap::new()),
            chunk_size: DEFAULT_CHUNK_SIZE,
            visibility_lag: Duration::ZERO,
            next_generation: AtomicU64::new(1),
            write_count: AtomicU64::new(0),
            read_failures: AtomicUsize::new(0),
            write_failures: AtomicUsize::new(0),
            stream_failures: AtomicUsize::new(0),
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Writes become readable only after `lag` has elapsed
    pub fn with_visibility_lag(mut self, lag: Duration) -> Self {
        self.visibility_lag = lag;
        self
    }

    /// Fail the next `count` read_stream calls before any data is returned
    pub fn fail_next_reads(&self, count: usize) {
        self.read_failures.store(count, Ordering::SeqCst);
    }

    /// Fail the next `count` writes
    pub fn fail_next_writes(&self, count: usize) {
        self.write_failures.store(count, Ordering::SeqCst);
    }

    /// Break the next `count` read streams after their first chunk
    pub fn fail_next_streams(&self, count: usize) {
        self.stream_failures.store(count, Ordering::SeqCst);
    }

    /// Latest written content, ignoring the visibility lag
    pub fn contents(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        self.objects
            .read()
            .get(&(bucket.to_string(), key.to_string()))
            .map(|object| object.current.content.clone())
    }

    pub fn keys(&self, bucket: &str) -> Vec<String> {
        let mut keys: Vec<String> = self
            .objects
            .read()
            .keys()
            .filter(|(b, _)| b == bucket)
            .map(|(_, key)| key.clone())
            .collect();
        keys.sort();
        keys
    }

    pub fn write_count(&self) -> u64 {
        self.write_count.load(Ordering::SeqCst)
    }

    fn take(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl Default for InMemoryBlobStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn write(&self, bucket: &str, key: &str, content: Vec<u8>) -> CollaboratorResult<WriteAck> {
        if Self::take(&self.write_failures) {
            return Err(CollaboratorError::unavailable(
                COLLABORATOR,
                format!("injected write failure for {bucket}/{key}"),
            ));
        }

        let generation = self.next_generation.fetch_add(1, Ordering::SeqCst);
        let size = content.len();
        let now = Instant::now();

        let mut objects = self.objects.write();
        let slot = (bucket.to_string(), key.to_string());
        let previous = objects.get(&slot).and_then(|object| object.readable(now).cloned());
        objects.insert(
            slot,
            StoredObject {
                current: Version {
                    content,
                    generation,
                },
                visible_at: now + self.visibility_lag,
                previous,
            },
        );
        self.write_count.fetch_add(1, Ordering::SeqCst);

        debug!(bucket = %bucket, key = %key, generation, size, "Blob written");
        Ok(WriteAck {
            bucket: bucket.to_string(),
            key: key.to_string(),
            generation,
            size,
        })
    }

    async fn read_stream(&self, bucket: &str, key: &str) -> CollaboratorResult<BlobReader> {
        if Self::take(&self.read_failures) {
            return Err(CollaboratorError::unavailable(
                COLLABORATOR,
                format!("injected read failure for {bucket}/{key}"),
            ));
        }

        let version = {
            let objects = self.objects.read();
            objects
                .get(&(bucket.to_string(), key.to_string()))
                .and_then(|object| object.readable(Instant::now()).cloned())
        }
        .ok_or_else(|| CollaboratorError::not_found(COLLABORATOR, format!("{bucket}/{key}")))?;

        let mut chunks: Vec<CollaboratorResult<Vec<u8>>> = version
            .content
            .chunks(self.chunk_size)
            .map(|chunk| Ok(chunk.to_vec()))
            .collect();
        if Self::take(&self.stream_failures) {
            chunks.truncate(1);
            chunks.push(Err(CollaboratorError::unavailable(
                COLLABORATOR,
                "stream interrupted",
            )));
        }

        Ok(BlobReader::new(
            version.generation,
            futures::stream::iter(chunks).boxed(),
        ))
    }
}
