//! Unified error taxonomy for the module runtime.
//!
//! Each branch below is its own `thiserror` enum, grounded in the
//! leaf-error style the rest of the workspace uses (manual `Display` +
//! `Error` impls where a type is simple, `#[derive(thiserror::Error)]`
//! where causes need to chain). [`SdkError`] composes them with `#[from]`
//! so `?` works across subsystem boundaries.

#[derive(Debug, thiserror::Error)]
pub enum MessageError {
    #[error("JSON serialization: {0}")]
    JsonSerialization(#[from] serde_json::Error),
    #[error("binary conversion: {0}")]
    BinaryConversion(String),
    #[error("binary decoding: {0}")]
    BinaryDecoding(String),
    #[error("unsupported encoding format tag {0}")]
    UnsupportedFormat(u8),
    #[error("envelope carried no content")]
    NoContent,
    #[error("invalid frame: {0}")]
    InvalidFormat(String),
    #[error("frame exceeds maximum size ({actual} > {limit} bytes)")]
    FrameTooLarge { actual: usize, limit: usize },
}

#[derive(Debug, thiserror::Error)]
pub enum NetworkError {
    #[error("connection error: {0}")]
    ConnectionError(String),
    #[error("connection timed out after {0:?}")]
    ConnectionTimeout(std::time::Duration),
    #[error("connection closed")]
    ConnectionClosed,
    #[error("connection failed: {0}")]
    ConnectionFailed(String),
    #[error("reconnection failed after {attempts} attempts: {reason}")]
    ReconnectionFailed { attempts: u32, reason: String },
    #[error("invalid channel configuration: {0}")]
    InvalidConfig(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, thiserror::Error)]
#[error("secret client error: {0}")]
pub struct SecretError(pub String);

#[derive(Debug, thiserror::Error)]
#[error("typed secret error: could not coerce {name} to {target_type}: {reason}")]
pub struct TypedSecretError {
    pub name: String,
    pub target_type: &'static str,
    pub reason: String,
}

#[derive(Debug, thiserror::Error)]
#[error("bootstrap failed: {0}")]
pub struct BootstrapError(pub String);

#[derive(Debug, thiserror::Error)]
#[error("handshake failed: {0}")]
pub struct HandshakeError(pub String);

#[derive(Debug, thiserror::Error)]
#[error("configuration error: {0}")]
pub struct ConfigError(pub String);

#[derive(Debug, thiserror::Error)]
#[error("registration error: {0}")]
pub struct RegistrationError(pub String);

#[derive(Debug, thiserror::Error)]
#[error("service discovery error: {0}")]
pub struct ServiceDiscoveryError(pub String);

#[derive(Debug, thiserror::Error)]
#[error("internal messaging error: {0}")]
pub struct InternalMessagingError(pub String);

#[derive(Debug, thiserror::Error)]
#[error("streaming error: {0}")]
pub struct StreamingError(pub String);

#[derive(Debug, thiserror::Error)]
#[error("routing error: {0}")]
pub struct RoutingError(pub String);

#[derive(Debug, thiserror::Error)]
pub enum CircuitBreakerError {
    #[error("circuit breaker open for {channel}")]
    Open { channel: String },
}

/// Top-level error every public SDK operation returns.
#[derive(Debug, thiserror::Error)]
pub enum SdkError {
    #[error(transparent)]
    Bootstrap(#[from] BootstrapError),
    #[error(transparent)]
    Handshake(#[from] HandshakeError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Secret(#[from] SecretError),
    #[error(transparent)]
    TypedSecret(#[from] TypedSecretError),
    #[error(transparent)]
    Network(#[from] NetworkError),
    #[error(transparent)]
    Message(#[from] MessageError),
    #[error(transparent)]
    Registration(#[from] RegistrationError),
    #[error(transparent)]
    ServiceDiscovery(#[from] ServiceDiscoveryError),
    #[error(transparent)]
    InternalMessaging(#[from] InternalMessagingError),
    #[error(transparent)]
    Streaming(#[from] StreamingError),
    #[error(transparent)]
    Routing(#[from] RoutingError),
    #[error(transparent)]
    CircuitBreaker(#[from] CircuitBreakerError),
    #[error("operation timed out after {0:?}")]
    Timeout(std::time::Duration),
    #[error("channel is disconnected")]
    Disconnected,
}

pub type SdkResult<T> = Result<T, SdkError>;
