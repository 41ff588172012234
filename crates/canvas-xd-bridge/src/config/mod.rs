//! Bridge config loader (strict parsing).

pub mod schema;

use std::fs;

use canvas_xd_core::error::{Result, XdError};

pub use schema::{
    BridgeConfig, ClientSection, CollisionPolicy, HostSection, ProxyDefaults, SequenceSection,
};

pub fn load_from_file(path: &str) -> Result<BridgeConfig> {
    let s = fs::read_to_string(path)
        .map_err(|e| XdError::Internal(format!("read config failed: {e}")))?;
    load_from_str(&s)
}

pub fn load_from_str(s: &str) -> Result<BridgeConfig> {
    let cfg: BridgeConfig = serde_yaml::from_str(s)
        .map_err(|e| XdError::BadRequest(format!("invalid yaml: {e}")))?;
    cfg.validate()?;
    Ok(cfg)
}
