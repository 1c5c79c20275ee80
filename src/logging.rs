//! Structured logging with secret redaction (§4.B).
//!
//! `init()` mirrors the rest of the workspace's `tracing_subscriber::fmt()`
//! + `EnvFilter` setup, with one addition: the formatter's writer is
//! wrapped in [`RedactingMakeWriter`], which runs every already-formatted
//! line through [`redact`] before it reaches stderr. Redacting the final
//! bytes (rather than individual event fields) means a secret can't slip
//! through via a field the visitor doesn't know to inspect.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, OnceLock};

use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

static REDACTION_REGISTRY: OnceLock<Mutex<HashSet<String>>> = OnceLock::new();

fn registry() -> &'static Mutex<HashSet<String>> {
    REDACTION_REGISTRY.get_or_init(|| Mutex::new(HashSet::new()))
}

/// Register a secret value for redaction in every future log record.
pub fn register_secret(value: impl Into<String>) {
    let value = value.into();
    if value.trim().is_empty() {
        return;
    }
    registry().lock().expect("redaction registry poisoned").insert(value);
}

/// Remove a secret from the redaction registry (e.g. on owner drop).
pub fn unregister_secret(value: &str) {
    registry().lock().expect("redaction registry poisoned").remove(value);
}

/// Replace every occurrence of a registered secret in `text` with `[REDACTED]`.
pub fn redact(text: &str) -> String {
    let guard = registry().lock().expect("redaction registry poisoned");
    if guard.is_empty() {
        return text.to_owned();
    }
    let mut result = text.to_owned();
    for secret in guard.iter() {
        if !secret.is_empty() && result.contains(secret.as_str()) {
            result = result.replace(secret.as_str(), "[REDACTED]");
        }
    }
    result
}

#[cfg(test)]
pub(crate) fn clear_registry_for_test() {
    registry().lock().expect("redaction registry poisoned").clear();
}

/// Wraps an inner `Write` and redacts registered secrets out of every
/// buffer before passing it through.
struct RedactingWriter<W>(W);

impl<W: std::io::Write> std::io::Write for RedactingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let text = String::from_utf8_lossy(buf);
        self.0.write_all(redact(&text).as_bytes())?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.0.flush()
    }
}

/// `MakeWriter` adapter that redacts an event's fully formatted line
/// before it reaches the wrapped writer.
#[derive(Clone)]
struct RedactingMakeWriter<M>(M);

impl<'a, M> MakeWriter<'a> for RedactingMakeWriter<M>
where
    M: MakeWriter<'a>,
{
    type Writer = RedactingWriter<M::Writer>;

    fn make_writer(&'a self) -> Self::Writer {
        RedactingWriter(self.0.make_writer())
    }
}

/// Install the redacting, JSON-capable subscriber. Must be the first call
/// in a module's `main`, before any logging or secret retrieval occurs.
pub fn init() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().json().with_writer(RedactingMakeWriter(std::io::stderr)))
        .with(env_filter)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redact_replaces_registered_secret() {
        clear_registry_for_test();
        register_secret("sk-super-secret");
        let out = redact("token is sk-super-secret please keep it safe");
        assert_eq!(out, "token is [REDACTED] please keep it safe");
        unregister_secret("sk-super-secret");
    }

    #[test]
    fn redact_is_noop_without_registered_secrets() {
        clear_registry_for_test();
        let out = redact("nothing secret here");
        assert_eq!(out, "nothing secret here");
    }

    #[test]
    fn unregister_stops_future_redaction() {
        clear_registry_for_test();
        register_secret("abc123");
        unregister_secret("abc123");
        let out = redact("value is abc123");
        assert_eq!(out, "value is abc123");
    }

    #[test]
    fn blank_secret_is_never_registered() {
        clear_registry_for_test();
        register_secret("   ");
        let out = redact("   ");
        assert_eq!(out, "   ");
    }

    #[derive(Clone, Default)]
    struct CapturedWriter(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().expect("captured writer poisoned").extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn fmt_layer_output_is_redacted_end_to_end() {
        clear_registry_for_test();
        register_secret("sk-live-12345");

        let captured = CapturedWriter::default();
        let for_writer = captured.clone();
        let make_writer = RedactingMakeWriter(move || for_writer.clone());

        let subscriber = tracing_subscriber::fmt().json().with_writer(make_writer).finish();

        tracing::subscriber::with_default(subscriber, || {
            tracing::info!(token = "sk-live-12345", "issued token");
        });

        let bytes = captured.0.lock().expect("captured writer poisoned").clone();
        let text = String::from_utf8(bytes).expect("utf8 log output");
        assert!(text.contains("[REDACTED]"), "expected redaction marker in: {text}");
        assert!(!text.contains("sk-live-12345"), "secret leaked into log output: {text}");

        unregister_secret("sk-live-12345");
    }
}
