//! In-memory collaborators
//!
//! Process-local stand-ins for object storage, the fan-out transport and the
//! work queue. The queue models the visibility window explicitly: a polled
//! message stays hidden until it is deleted or `expire_visibility` makes it
//! deliverable again, at which point its old delivery token stops working.
//! Each collaborator can be told to fail its next N calls.

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::Notify;
use uuid::Uuid;

use super::{ObjectStore, Publisher, WorkQueue};
use crate::error::{QueueError, StorageError, TransportError};
use crate::models::{QueueMessage, StorageObjectRef};

/// Consume one injected failure, if any are left
fn take_failure(counter: &AtomicU32) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub data: Bytes,
    pub content_type: String,
}

#[derive(Default)]
pub struct MemoryObjectStore {
    objects: Mutex<HashMap<StorageObjectRef, StoredObject>>,
    get_failures: AtomicU32,
    put_failures: AtomicU32,
    puts: AtomicU64,
    latency: Mutex<Option<Duration>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, object: StorageObjectRef, data: impl Into<Bytes>, content_type: &str) {
        self.objects.lock().insert(
            object,
            StoredObject {
                data: data.into(),
                content_type: content_type.to_string(),
            },
        );
    }

    pub fn remove(&self, object: &StorageObjectRef) -> Option<StoredObject> {
        self.objects.lock().remove(object)
    }

    pub fn object(&self, object: &StorageObjectRef) -> Option<StoredObject> {
        self.objects.lock().get(object).cloned()
    }

    /// Keys currently stored in `bucket`, sorted
    pub fn keys(&self, bucket: &str) -> Vec<String> {
        let mut keys: Vec<String> = self
            .objects
            .lock()
            .keys()
            .filter(|object| object.bucket == bucket)
            .map(|object| object.key.clone())
            .collect();
        keys.sort();
        keys
    }

    /// Successful writes since creation
    pub fn put_count(&self) -> u64 {
        self.puts.load(Ordering::SeqCst)
    }

    pub fn fail_next_gets(&self, n: u32) {
        self.get_failures.store(n, Ordering::SeqCst);
    }

    pub fn fail_next_puts(&self, n: u32) {
        self.put_failures.store(n, Ordering::SeqCst);
    }

    /// Delay every call by `latency`
    pub fn set_latency(&self, latency: Option<Duration>) {
        *self.latency.lock() = latency;
    }

    async fn simulate_latency(&self) {
        let latency = *self.latency.lock();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn get(&self, object: &StorageObjectRef) -> Result<Bytes, StorageError> {
        self.simulate_latency().await;

        if take_failure(&self.get_failures) {
            return Err(StorageError::Transient("injected get failure".to_string()));
        }

        self.objects
            .lock()
            .get(object)
            .map(|stored| stored.data.clone())
            .ok_or_else(|| StorageError::NotFound(object.to_string()))
    }

    async fn put(
        &self,
        object: &StorageObjectRef,
        data: Bytes,
        content_type: &str,
    ) -> Result<(), StorageError> {
        self.simulate_latency().await;

        if take_failure(&self.put_failures) {
            return Err(StorageError::Transient("injected put failure".to_string()));
        }

        self.insert(object.clone(), data, content_type);
        self.puts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedMessage {
    pub topic: String,
    pub subject: String,
    pub payload: String,
}

#[derive(Default)]
pub struct MemoryPublisher {
    published: Mutex<Vec<PublishedMessage>>,
    failures: AtomicU32,
}

impl MemoryPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn published(&self) -> Vec<PublishedMessage> {
        self.published.lock().clone()
    }

    pub fn fail_next(&self, n: u32) {
        self.failures.store(n, Ordering::SeqCst);
    }
}

#[async_trait]
impl Publisher for MemoryPublisher {
    async fn publish(
        &self,
        topic: &str,
        subject: &str,
        payload: &str,
    ) -> Result<(), TransportError> {
        if take_failure(&self.failures) {
            return Err(TransportError("injected publish failure".to_string()));
        }

        self.published.lock().push(PublishedMessage {
            topic: topic.to_string(),
            subject: subject.to_string(),
            payload: payload.to_string(),
        });
        Ok(())
    }
}

struct QueueEntry {
    message_id: String,
    body: String,
    /// Set while the message is in flight
    delivery_token: Option<String>,
    receive_count: u32,
}

#[derive(Default)]
pub struct MemoryWorkQueue {
    entries: Mutex<Vec<QueueEntry>>,
    arrivals: Notify,
    poll_failures: AtomicU32,
    delete_failures: AtomicU32,
}

impl MemoryWorkQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue a body, returning its message id
    pub fn send(&self, body: impl Into<String>) -> String {
        let message_id = Uuid::new_v4().to_string();
        self.entries.lock().push(QueueEntry {
            message_id: message_id.clone(),
            body: body.into(),
            delivery_token: None,
            receive_count: 0,
        });
        self.arrivals.notify_waiters();
        message_id
    }

    /// End the visibility window of every in-flight message
    pub fn expire_visibility(&self) {
        let mut released = false;
        for entry in self.entries.lock().iter_mut() {
            if entry.delivery_token.take().is_some() {
                released = true;
            }
        }
        if released {
            self.arrivals.notify_waiters();
        }
    }

    /// Messages not yet deleted
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn in_flight(&self) -> usize {
        self.entries
            .lock()
            .iter()
            .filter(|entry| entry.delivery_token.is_some())
            .count()
    }

    pub fn fail_next_polls(&self, n: u32) {
        self.poll_failures.store(n, Ordering::SeqCst);
    }

    pub fn fail_next_deletes(&self, n: u32) {
        self.delete_failures.store(n, Ordering::SeqCst);
    }

    fn take_visible(&self, max_items: u32) -> Vec<QueueMessage> {
        let mut entries = self.entries.lock();
        entries
            .iter_mut()
            .filter(|entry| entry.delivery_token.is_none())
            .take(max_items as usize)
            .map(|entry| {
                let token = Uuid::new_v4().to_string();
                entry.delivery_token = Some(token.clone());
                entry.receive_count += 1;
                QueueMessage {
                    message_id: entry.message_id.clone(),
                    body: entry.body.clone(),
                    delivery_token: token,
                    receive_count: entry.receive_count,
                }
            })
            .collect()
    }
}

#[async_trait]
impl WorkQueue for MemoryWorkQueue {
    async fn poll(&self, max_items: u32, wait: Duration) -> Result<Vec<QueueMessage>, QueueError> {
        if take_failure(&self.poll_failures) {
            return Err(QueueError::Unavailable("injected poll failure".to_string()));
        }

        // Register interest before checking so a concurrent send is not missed
        let arrival = self.arrivals.notified();
        let messages = self.take_visible(max_items);
        if !messages.is_empty() || wait.is_zero() {
            return Ok(messages);
        }

        let _ = tokio::time::timeout(wait, arrival).await;
        Ok(self.take_visible(max_items))
    }

    async fn delete(&self, delivery_token: &str) -> Result<(), QueueError> {
        if take_failure(&self.delete_failures) {
            return Err(QueueError::Unavailable("injected delete failure".to_string()));
        }

        let mut entries = self.entries.lock();
        let position = entries
            .iter()
            .position(|entry| entry.delivery_token.as_deref() == Some(delivery_token))
            .ok_or_else(|| QueueError::UnknownDeliveryToken(delivery_token.to_string()))?;
        entries.remove(position);
        Ok(())
    }
}
