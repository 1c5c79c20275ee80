//! Typed module configuration, layered over the init record's environment
//! overrides and the process environment (§4.N).
//!
//! Follows the same raw/validated two-layer shape as the rest of the
//! workspace's config loaders: a `RawModuleConfig` with every field
//! optional, then [`load_config`] validates and defaults it into
//! [`ModuleConfig`].

use crate::error::ConfigError;
use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ModuleConfig {
    pub module_id: String,
    pub orchestrator_api: String,
    pub log_level: String,
    pub orchestrator_endpoint: String,
    pub secret_cache_ttl: Duration,
    pub rotation_sweep_interval: Duration,
    pub secret_fetch_timeout: Duration,
    pub port_negotiation_timeout: Duration,
    pub internal_request_timeout: Duration,
    pub build_commit: Option<String>,
    pub build_time: Option<String>,
}

#[derive(Debug, Default)]
struct RawModuleConfig {
    module_id: Option<String>,
    orchestrator_api: Option<String>,
    log_level: Option<String>,
    orchestrator_endpoint: Option<String>,
    secret_cache_ttl_secs: Option<u64>,
    rotation_sweep_interval_secs: Option<u64>,
    secret_fetch_timeout_secs: Option<u64>,
    port_negotiation_timeout_secs: Option<u64>,
    internal_request_timeout_secs: Option<u64>,
    build_commit: Option<String>,
    build_time: Option<String>,
}

const ENV_MODULE_ID: &str = "PYMOD_MODULE_ID";
const ENV_ORCHESTRATOR_API: &str = "PYMOD_ORCHESTRATOR_API";
const ENV_LOG_LEVEL: &str = "PYMOD_LOG_LEVEL";
const ENV_ORCHESTRATOR_ENDPOINT: &str = "PYMOD_ORCHESTRATOR_ENDPOINT";
const ENV_SECRET_CACHE_TTL_SECS: &str = "PYMOD_SECRET_CACHE_TTL_SECS";
const ENV_ROTATION_SWEEP_INTERVAL_SECS: &str = "PYMOD_ROTATION_SWEEP_INTERVAL_SECS";
const ENV_BUILD_COMMIT: &str = "PYMOD_BUILD_COMMIT";
const ENV_BUILD_TIME: &str = "PYMOD_BUILD_TIME";

/// Load config from the init record's environment overrides, merged over
/// `std::env` (overrides win on conflict).
pub fn load_config(
    module_id: &str,
    orchestrator_api: &str,
    log_level: &str,
    overrides: &HashMap<String, String>,
) -> Result<ModuleConfig, ConfigError> {
    let lookup = |key: &str| -> Option<String> {
        overrides.get(key).cloned().or_else(|| std::env::var(key).ok())
    };

    let raw = RawModuleConfig {
        module_id: Some(module_id.to_owned()),
        orchestrator_api: Some(orchestrator_api.to_owned()),
        log_level: Some(log_level.to_owned()),
        orchestrator_endpoint: lookup(ENV_ORCHESTRATOR_ENDPOINT),
        secret_cache_ttl_secs: lookup(ENV_SECRET_CACHE_TTL_SECS).and_then(|v| v.parse().ok()),
        rotation_sweep_interval_secs: lookup(ENV_ROTATION_SWEEP_INTERVAL_SECS)
            .and_then(|v| v.parse().ok()),
        secret_fetch_timeout_secs: None,
        port_negotiation_timeout_secs: None,
        internal_request_timeout_secs: None,
        build_commit: lookup(ENV_BUILD_COMMIT),
        build_time: lookup(ENV_BUILD_TIME),
    };

    validate(raw)
}

/// Load config purely from `std::env`, for modules that do not yet have
/// an init record (used by standalone test harnesses).
pub fn load_config_from_env() -> Result<ModuleConfig, ConfigError> {
    let module_id = std::env::var(ENV_MODULE_ID)
        .map_err(|_| ConfigError(format!("missing required env var {ENV_MODULE_ID}")))?;
    let orchestrator_api = std::env::var(ENV_ORCHESTRATOR_API)
        .map_err(|_| ConfigError(format!("missing required env var {ENV_ORCHESTRATOR_API}")))?;
    let log_level = std::env::var(ENV_LOG_LEVEL).unwrap_or_else(|_| "info".to_owned());
    load_config(&module_id, &orchestrator_api, &log_level, &HashMap::new())
}

fn validate(raw: RawModuleConfig) -> Result<ModuleConfig, ConfigError> {
    let module_id = raw
        .module_id
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ConfigError("missing required field: module_id".to_owned()))?;
    let orchestrator_api = raw
        .orchestrator_api
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ConfigError("missing required field: orchestrator_api".to_owned()))?;

    Ok(ModuleConfig {
        module_id,
        orchestrator_api,
        log_level: raw.log_level.unwrap_or_else(|| "info".to_owned()),
        orchestrator_endpoint: raw
            .orchestrator_endpoint
            .unwrap_or_else(|| "127.0.0.1:9900".to_owned()),
        secret_cache_ttl: Duration::from_secs(raw.secret_cache_ttl_secs.unwrap_or(3600)),
        rotation_sweep_interval: Duration::from_secs(
            raw.rotation_sweep_interval_secs.unwrap_or(10),
        ),
        secret_fetch_timeout: Duration::from_secs(raw.secret_fetch_timeout_secs.unwrap_or(30)),
        port_negotiation_timeout: Duration::from_secs(
            raw.port_negotiation_timeout_secs.unwrap_or(3),
        ),
        internal_request_timeout: Duration::from_secs(
            raw.internal_request_timeout_secs.unwrap_or(30),
        ),
        build_commit: raw.build_commit,
        build_time: raw.build_time,
    })
}
