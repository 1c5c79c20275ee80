//! Wire types exchanged between a module and its orchestrator.
//!
//! Every inbound/outbound IPC record is a member of [`OrchestratorToModule`]
//! or [`ModuleToOrchestrator`], tagged on the wire by an `op` field. This
//! mirrors the orchestrator's own JSON shape exactly — these types are
//! `serde`-derived, not hand-parsed.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The encoding used for a framed payload (see the `module_sdk::framing` module).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum EncodingFormat {
    Json = 0,
    MsgPack = 1,
}

impl EncodingFormat {
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(Self::Json),
            1 => Some(Self::MsgPack),
            _ => None,
        }
    }

    pub fn tag(self) -> u8 {
        self as u8
    }
}

/// Metadata carried alongside an envelope's content.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnvelopeMetadata {
    pub id: Option<String>,
    pub timestamp: Option<String>,
    pub source: Option<String>,
    pub destination: Option<String>,
    #[serde(flatten)]
    pub properties: HashMap<String, String>,
}

impl EnvelopeMetadata {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.properties.insert(key.into(), value.into());
    }
}

/// Address the orchestrator assigned a module to listen on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ListenAddress {
    Tcp(String),
    Unix { #[serde(rename = "Unix")] path: String },
}

impl ListenAddress {
    pub fn tcp(addr: impl Into<String>) -> Self {
        Self::Tcp(addr.into())
    }

    pub fn unix(path: impl Into<String>) -> Self {
        Self::Unix { path: path.into() }
    }

    pub fn is_tcp(&self) -> bool {
        matches!(self, Self::Tcp(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecurityLevel {
    None,
    Token,
    Mtls,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TcpChannelConfig {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub tls_enabled: bool,
    #[serde(default)]
    pub required: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IpcChannelConfig {
    pub socket_path: String,
    #[serde(default)]
    pub required: bool,
}

/// The orchestrator's first record, sent to the module on startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitBlob {
    pub orchestrator_api: String,
    pub module_id: String,
    #[serde(default)]
    pub env: HashMap<String, String>,
    pub listen: ListenAddress,
    #[serde(default)]
    pub tcp_channel: Option<TcpChannelConfig>,
    #[serde(default)]
    pub ipc_channel: Option<IpcChannelConfig>,
    #[serde(default)]
    pub auth_token: Option<String>,
    #[serde(default = "default_security_level")]
    pub security_level: SecurityLevel,
    #[serde(default)]
    pub debug_mode: bool,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_security_level() -> SecurityLevel {
    SecurityLevel::None
}

fn default_log_level() -> String {
    "info".to_owned()
}

impl InitBlob {
    pub fn has_required_channels(&self) -> bool {
        self.tcp_channel.as_ref().is_some_and(|c| c.required)
            || self.ipc_channel.as_ref().is_some_and(|c| c.required)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointAnnounce {
    pub path: String,
    pub methods: Vec<String>,
    #[serde(default)]
    pub auth: Option<String>,
}

/// The module's first outbound record, sent once its listener is bound.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnounceBlob {
    pub listen: String,
    pub endpoints: Vec<EndpointAnnounce>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetSecretRequest {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecretValueResponse {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub rotation_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RotatedNotification {
    pub keys: Vec<String>,
    pub rotation_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RotationStatus {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RotationAckRequest {
    pub rotation_id: String,
    pub status: RotationStatus,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IpcHttpRequest {
    pub request_id: String,
    pub method: String,
    pub uri: String,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub body: Option<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IpcHttpResponse {
    pub request_id: String,
    pub status_code: u16,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub body: Option<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortRequest {
    pub request_id: String,
    #[serde(default)]
    pub specific_port: Option<u16>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortResponse {
    pub request_id: String,
    pub success: bool,
    pub port: u16,
    #[serde(default)]
    pub error_message: Option<String>,
}

/// An opaque, already-encoded payload, as it travels embedded in a
/// `route_to_module` record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutedPayload {
    pub data_hex: String,
    pub format: EncodingFormat,
    #[serde(default)]
    pub metadata: EnvelopeMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteToModuleRequest {
    pub target_module_id: String,
    pub target_endpoint: String,
    pub request_id: String,
    pub payload: RoutedPayload,
    #[serde(default)]
    pub timeout_seconds: Option<f64>,
    /// The module that originated this request, stamped by the
    /// orchestrator on delivery so the target can address its reply.
    #[serde(default)]
    pub source_module_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteToModuleResponse {
    pub request_id: String,
    pub success: bool,
    #[serde(default)]
    pub payload: Option<RoutedPayload>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Records the orchestrator sends to a module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum OrchestratorToModule {
    Init { init: InitBlob },
    Secret { secret: SecretValueResponse },
    Rotated { rotated: RotatedNotification },
    Heartbeat,
    Shutdown,
    HttpRequest { http_request: IpcHttpRequest },
    PortResponse { port_response: PortResponse },
    RoutedModuleMessage { routed_module_message: RouteToModuleRequest },
    RoutedModuleResponse { routed_module_response: RouteToModuleResponse },
}

/// Records a module sends to the orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ModuleToOrchestrator {
    Identify { identify: String },
    Announce { announce: AnnounceBlob },
    GetSecret { get_secret: GetSecretRequest },
    RotationAck { rotation_ack: RotationAckRequest },
    PortRequest { port_request: PortRequest },
    HttpResponse { http_response: IpcHttpResponse },
    HeartbeatAck,
    RouteToModule { route_to_module: RouteToModuleRequest },
}

impl ModuleToOrchestrator {
    pub fn identify(module_id: impl Into<String>) -> Self {
        Self::Identify { identify: module_id.into() }
    }

    pub fn heartbeat_ack() -> Self {
        Self::HeartbeatAck
    }
}
