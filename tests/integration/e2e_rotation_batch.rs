// Scenario 3: a `rotated` batch evicts every listed key before
// subscribers run, invokes every subscriber concurrently, and emits
// exactly one rotation_ack — success unless a subscriber failed.

use std::sync::Arc;

use module_sdk::error::SdkError;
use module_sdk::secret::{FetchMode, SecretClient, SecretTransport};
use tokio::sync::Mutex;

struct RecordingTransport {
    acks: Mutex<Vec<(String, bool, Option<String>)>>,
}

#[async_trait::async_trait]
impl SecretTransport for RecordingTransport {
    async fn emit_get_secret(&self, _name: &str) -> Result<(), SdkError> {
        Ok(())
    }
    async fn emit_rotation_ack(&self, rotation_id: &str, success: bool, message: Option<String>) -> Result<(), SdkError> {
        self.acks.lock().await.push((rotation_id.to_owned(), success, message));
        Ok(())
    }
}

#[tokio::test]
async fn all_subscribers_succeed_acks_success_and_evicts_cache() {
    let transport = Arc::new(RecordingTransport { acks: Mutex::new(Vec::new()) });
    let client = SecretClient::new(transport.clone());

    client.process_secret_message("db_password", "old", None).await;
    client.process_secret_message("api_key", "old-key", None).await;

    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen_clone = seen.clone();
    client
        .subscribe(Arc::new(move |keys| {
            let seen = seen_clone.clone();
            Box::pin(async move {
                seen.lock().await.push(keys);
                Ok(())
            })
        }))
        .await;

    client
        .process_rotation_message(vec!["db_password".to_owned(), "api_key".to_owned()], "rot-42".to_owned())
        .await;

    let acks = transport.acks.lock().await;
    assert_eq!(acks.as_slice(), &[("rot-42".to_owned(), true, None)]);

    assert!(client.get("db_password", FetchMode::CacheOnly).await.is_err());
    assert_eq!(seen.lock().await.len(), 1);
}

#[tokio::test]
async fn one_failing_subscriber_acks_error_with_reason() {
    let transport = Arc::new(RecordingTransport { acks: Mutex::new(Vec::new()) });
    let client = SecretClient::new(transport.clone());
    client.process_secret_message("k1", "v1", None).await;

    client.subscribe(Arc::new(|_keys| Box::pin(async { Ok(()) }))).await;
    client
        .subscribe(Arc::new(|_keys| Box::pin(async { Err("downstream handler unreachable".to_owned()) })))
        .await;

    client.process_rotation_message(vec!["k1".to_owned()], "rot-7".to_owned()).await;

    let acks = transport.acks.lock().await;
    assert_eq!(acks.len(), 1);
    assert_eq!(acks[0].0, "rot-7");
    assert!(!acks[0].1);
    assert_eq!(acks[0].2.as_deref(), Some("downstream handler unreachable"));
}
