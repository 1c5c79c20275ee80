// Scenario 2: concurrent lookups of the same secret name, before the
// value is known, coalesce into a single outbound `get_secret` and every
// waiter observes the resolved value. A cached hit never calls the
// transport at all.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use module_sdk::error::SdkError;
use module_sdk::secret::{FetchMode, SecretClient, SecretTransport};

struct RecordingTransport {
    get_secret_calls: AtomicU32,
}

#[async_trait::async_trait]
impl SecretTransport for RecordingTransport {
    async fn emit_get_secret(&self, _name: &str) -> Result<(), SdkError> {
        self.get_secret_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
    async fn emit_rotation_ack(&self, _rotation_id: &str, _success: bool, _message: Option<String>) -> Result<(), SdkError> {
        Ok(())
    }
}

#[tokio::test]
async fn twenty_concurrent_misses_share_one_fetch() {
    let transport = Arc::new(RecordingTransport { get_secret_calls: AtomicU32::new(0) });
    let client = Arc::new(SecretClient::new(transport.clone()));

    let mut handles = Vec::new();
    for _ in 0..20 {
        let client = client.clone();
        handles.push(tokio::spawn(async move {
            client.get("db_password", FetchMode::CacheThenRemote).await
        }));
    }

    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    client.process_secret_message("db_password", "hunter2", Some("rot-1".to_owned())).await;

    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap(), "hunter2");
    }
    assert_eq!(transport.get_secret_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn cache_hit_never_touches_transport() {
    let transport = Arc::new(RecordingTransport { get_secret_calls: AtomicU32::new(0) });
    let client = SecretClient::new(transport.clone());

    client.process_secret_message("api_key", "abc", None).await;
    let value = client.get("api_key", FetchMode::CacheThenRemote).await.unwrap();

    assert_eq!(value, "abc");
    assert_eq!(transport.get_secret_calls.load(Ordering::SeqCst), 0);
}
