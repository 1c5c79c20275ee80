//! Secret client (§4.C): cache-through lookups, push updates, rotation
//! batches, and typed getters — all funneled through the redaction
//! registry in [`crate::logging`].

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{oneshot, Mutex};
use tracing::{info, warn};

use crate::error::{SdkError, SecretError, TypedSecretError};
use crate::logging;

const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMode {
    CacheThenRemote,
    ForceRemote,
    CacheOnly,
}

#[derive(Debug, Clone)]
struct SecretEntry {
    value: String,
    rotation_id: Option<String>,
}

pub type RotationSubscriber = Arc<dyn Fn(Vec<String>) -> RotationSubscriberFuture + Send + Sync>;
pub type RotationSubscriberFuture =
    std::pin::Pin<Box<dyn std::future::Future<Output = Result<(), String>> + Send>>;

/// Emits outbound `get_secret`/`rotation_ack` records; implemented by
/// whatever owns the orchestrator-facing channel (usually the IPC
/// dispatcher's sender half).
#[async_trait::async_trait]
pub trait SecretTransport: Send + Sync {
    async fn emit_get_secret(&self, name: &str) -> Result<(), SdkError>;
    async fn emit_rotation_ack(&self, rotation_id: &str, success: bool, message: Option<String>) -> Result<(), SdkError>;
}

struct Inner {
    cache: HashMap<String, SecretEntry>,
    pending: HashMap<String, Vec<oneshot::Sender<Result<String, SecretError>>>>,
    subscribers: Vec<(u64, RotationSubscriber)>,
    next_subscriber_id: u64,
}

pub struct SecretClient {
    transport: Arc<dyn SecretTransport>,
    fetch_timeout: Duration,
    inner: Mutex<Inner>,
}

impl SecretClient {
    pub fn new(transport: Arc<dyn SecretTransport>) -> Self {
        Self::with_timeout(transport, DEFAULT_FETCH_TIMEOUT)
    }

    pub fn with_timeout(transport: Arc<dyn SecretTransport>, fetch_timeout: Duration) -> Self {
        Self {
            transport,
            fetch_timeout,
            inner: Mutex::new(Inner {
                cache: HashMap::new(),
                pending: HashMap::new(),
                subscribers: Vec::new(),
                next_subscriber_id: 0,
            }),
        }
    }

    /// Fetch a secret by `name`. Concurrent misses on the same name
    /// share a single outbound `GetSecret` and all observe the same value.
    pub async fn get(&self, name: &str, mode: FetchMode) -> Result<String, SecretError> {
        if mode != FetchMode::ForceRemote {
            let mut inner = self.inner.lock().await;
            if let Some(entry) = inner.cache.get(name) {
                return Ok(entry.value.clone());
            }
            if mode == FetchMode::CacheOnly {
                return Err(SecretError(format!("secret '{name}' not in cache")));
            }

            if let Some(waiters) = inner.pending.get_mut(name) {
                let (tx, rx) = oneshot::channel();
                waiters.push(tx);
                drop(inner);
                return rx.await.map_err(|_| SecretError(format!("secret '{name}' request dropped")))?;
            }

            inner.pending.insert(name.to_owned(), Vec::new());
            drop(inner);
        } else {
            let mut inner = self.inner.lock().await;
            if inner.pending.contains_key(name) {
                let (tx, rx) = oneshot::channel();
                inner.pending.get_mut(name).unwrap().push(tx);
                drop(inner);
                return rx.await.map_err(|_| SecretError(format!("secret '{name}' request dropped")))?;
            }
            inner.pending.insert(name.to_owned(), Vec::new());
        }

        self.transport
            .emit_get_secret(name)
            .await
            .map_err(|e| SecretError(format!("failed to request secret '{name}': {e}")))?;

        let (tx, rx) = oneshot::channel();
        {
            let mut inner = self.inner.lock().await;
            inner.pending.entry(name.to_owned()).or_default().push(tx);
        }

        match tokio::time::timeout(self.fetch_timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(SecretError(format!("secret '{name}' request cancelled"))),
            Err(_) => {
                self.inner.lock().await.pending.remove(name);
                Err(SecretError(format!("timed out waiting for secret '{name}'")))
            }
        }
    }

    pub async fn get_many(&self, names: &[String], mode: FetchMode) -> HashMap<String, Result<String, SecretError>> {
        let mut out = HashMap::new();
        for name in names {
            out.insert(name.clone(), self.get(name, mode).await);
        }
        out
    }

    pub async fn get_int(&self, name: &str) -> Result<i64, TypedSecretError> {
        let value = self.get(name, FetchMode::CacheThenRemote).await.map_err(|e| TypedSecretError {
            name: name.to_owned(),
            target_type: "i64",
            reason: e.0,
        })?;
        value.parse().map_err(|e: std::num::ParseIntError| TypedSecretError {
            name: name.to_owned(),
            target_type: "i64",
            reason: e.to_string(),
        })
    }

    pub async fn get_float(&self, name: &str) -> Result<f64, TypedSecretError> {
        let value = self.get(name, FetchMode::CacheThenRemote).await.map_err(|e| TypedSecretError {
            name: name.to_owned(),
            target_type: "f64",
            reason: e.0,
        })?;
        value.parse().map_err(|e: std::num::ParseFloatError| TypedSecretError {
            name: name.to_owned(),
            target_type: "f64",
            reason: e.to_string(),
        })
    }

    pub async fn get_bool(&self, name: &str) -> Result<bool, TypedSecretError> {
        let value = self.get(name, FetchMode::CacheThenRemote).await.map_err(|e| TypedSecretError {
            name: name.to_owned(),
            target_type: "bool",
            reason: e.0,
        })?;
        match value.to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(true),
            "false" | "0" | "no" => Ok(false),
            other => Err(TypedSecretError {
                name: name.to_owned(),
                target_type: "bool",
                reason: format!("'{other}' is not a recognized boolean"),
            }),
        }
    }

    /// Register a rotation subscriber; returns an id usable with
    /// [`SecretClient::unsubscribe`].
    pub async fn subscribe(&self, callback: RotationSubscriber) -> u64 {
        let mut inner = self.inner.lock().await;
        let id = inner.next_subscriber_id;
        inner.next_subscriber_id += 1;
        inner.subscribers.push((id, callback));
        id
    }

    pub async fn unsubscribe(&self, id: u64) {
        self.inner.lock().await.subscribers.retain(|(sid, _)| *sid != id);
    }

    /// Handle an inbound `secret` push: store the value, update the
    /// redaction registry, and resolve any waiters for this name.
    pub async fn process_secret_message(&self, name: &str, value: &str, rotation_id: Option<String>) {
        logging::register_secret(value.to_owned());
        let mut inner = self.inner.lock().await;
        inner
            .cache
            .insert(name.to_owned(), SecretEntry { value: value.to_owned(), rotation_id });
        if let Some(waiters) = inner.pending.remove(name) {
            for waiter in waiters {
                let _ = waiter.send(Ok(value.to_owned()));
            }
        }
    }

    /// Handle an inbound `rotated` batch (§8 scenario 3): evict every
    /// listed key before subscribers run, invoke subscribers
    /// concurrently, then emit exactly one `rotation_ack`.
    pub async fn process_rotation_message(&self, keys: Vec<String>, rotation_id: String) {
        {
            let mut inner = self.inner.lock().await;
            for key in &keys {
                if let Some(entry) = inner.cache.remove(key) {
                    logging::unregister_secret(&entry.value);
                }
            }
        }

        let subscribers = self.inner.lock().await.subscribers.clone();
        let results = futures_util::future::join_all(
            subscribers.into_iter().map(|(_, callback)| callback(keys.clone())),
        )
        .await;

        let failure = results.into_iter().find_map(|r| r.err());
        match failure {
            None => {
                info!(rotation_id = %rotation_id, keys = ?keys, "rotation applied");
                let _ = self.transport.emit_rotation_ack(&rotation_id, true, None).await;
            }
            Some(reason) => {
                warn!(rotation_id = %rotation_id, %reason, "rotation subscriber failed");
                let _ = self.transport.emit_rotation_ack(&rotation_id, false, Some(reason)).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct CountingTransport {
        get_secret_calls: AtomicU32,
        acks: Mutex<Vec<(String, bool)>>,
    }

    impl CountingTransport {
        fn new() -> Self {
            Self { get_secret_calls: AtomicU32::new(0), acks: Mutex::new(Vec::new()) }
        }
    }

    #[async_trait::async_trait]
    impl SecretTransport for CountingTransport {
        async fn emit_get_secret(&self, _name: &str) -> Result<(), SdkError> {
            self.get_secret_calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        async fn emit_rotation_ack(&self, rotation_id: &str, success: bool, _message: Option<String>) -> Result<(), SdkError> {
            self.acks.lock().await.push((rotation_id.to_owned(), success));
            Ok(())
        }
    }

    #[tokio::test]
    async fn concurrent_misses_coalesce_to_one_get_secret() {
        let transport = Arc::new(CountingTransport::new());
        let client = Arc::new(SecretClient::new(transport.clone()));

        let mut handles = Vec::new();
        for _ in 0..10 {
            let client = client.clone();
            handles.push(tokio::spawn(async move { client.get("K", FetchMode::CacheThenRemote).await }));
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
        client.process_secret_message("K", "v", None).await;

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), "v");
        }
        assert_eq!(transport.get_secret_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn rotation_evicts_then_acks_success() {
        let transport = Arc::new(CountingTransport::new());
        let client = SecretClient::new(transport.clone());
        client.process_secret_message("A", "va", None).await;
        client.process_secret_message("B", "vb", None).await;

        client.process_rotation_message(vec!["A".to_owned(), "B".to_owned()], "R".to_owned()).await;

        let acks = transport.acks.lock().await;
        assert_eq!(acks.as_slice(), &[("R".to_owned(), true)]);

        let err = client.get("A", FetchMode::CacheOnly).await.unwrap_err();
        assert!(err.0.contains("A"));
    }

    #[tokio::test]
    async fn rotation_subscriber_failure_acks_error() {
        let transport = Arc::new(CountingTransport::new());
        let client = SecretClient::new(transport.clone());
        client
            .subscribe(Arc::new(|_keys| Box::pin(async { Err("boom".to_owned()) })))
            .await;

        client.process_rotation_message(vec!["A".to_owned()], "R".to_owned()).await;

        let acks = transport.acks.lock().await;
        assert_eq!(acks.as_slice(), &[("R".to_owned(), false)]);
    }

    #[tokio::test]
    async fn cache_only_fails_when_absent() {
        let transport = Arc::new(CountingTransport::new());
        let client = SecretClient::new(transport);
        let err = client.get("missing", FetchMode::CacheOnly).await.unwrap_err();
        assert!(err.0.contains("missing"));
    }
}
