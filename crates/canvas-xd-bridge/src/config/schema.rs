use serde::Deserialize;

use canvas_xd_core::error::{Result, XdError};
use canvas_xd_core::protocol::origin::origin_of;

use crate::policy::allowlist::compile_origin_rules;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BridgeConfig {
    pub version: u32,

    #[serde(default)]
    pub client: ClientSection,

    #[serde(default)]
    pub host: Option<HostSection>,
}

impl BridgeConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(XdError::UnsupportedVersion);
        }
        self.client.validate()?;
        if let Some(host) = &self.host {
            host.validate()?;
        }
        Ok(())
    }
}

/// Canvas-side settings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientSection {
    /// Host page URL. Overrides whatever the frame fragment carries.
    #[serde(default)]
    pub parent_url: Option<String>,

    /// Extra trusted sender origins (`https://host` or `https://*.domain`).
    #[serde(default)]
    pub allowed_origins: Vec<String>,

    #[serde(default)]
    pub sequence: SequenceSection,

    #[serde(default)]
    pub proxy: ProxyDefaults,

    /// Token the session starts with (e.g. restored after a reload).
    #[serde(default)]
    pub initial_token: Option<String>,
}

impl ClientSection {
    pub fn validate(&self) -> Result<()> {
        if let Some(url) = &self.parent_url {
            origin_of(url).map_err(|e| {
                XdError::BadRequest(format!("client.parent_url is not a usable url: {e}"))
            })?;
        }
        compile_origin_rules(&self.allowed_origins)?;
        self.sequence.validate()?;
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SequenceSection {
    #[serde(default = "default_ceiling")]
    pub ceiling: u32,

    #[serde(default)]
    pub on_collision: CollisionPolicy,
}

impl Default for SequenceSection {
    fn default() -> Self {
        Self {
            ceiling: default_ceiling(),
            on_collision: CollisionPolicy::default(),
        }
    }
}

impl SequenceSection {
    pub fn validate(&self) -> Result<()> {
        if !(1..=65535).contains(&self.ceiling) {
            return Err(XdError::BadRequest(
                "client.sequence.ceiling must be between 1 and 65535".into(),
            ));
        }
        Ok(())
    }
}

/// What allocation does when the next sequence is still bound to a live call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollisionPolicy {
    /// Replace the old handler (it is assumed abandoned).
    #[default]
    Overwrite,
    /// Advance to the next free sequence; fail when none is free.
    SkipInUse,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProxyDefaults {
    #[serde(default = "default_authorization_scheme")]
    pub authorization_scheme: String,

    #[serde(default = "default_json")]
    pub content_type: String,

    #[serde(default = "default_json")]
    pub accept: String,
}

impl Default for ProxyDefaults {
    fn default() -> Self {
        Self {
            authorization_scheme: default_authorization_scheme(),
            content_type: default_json(),
            accept: default_json(),
        }
    }
}

/// Host-side settings (only needed when running the responder).
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HostSection {
    /// Origin of the canvas frame the host answers.
    pub canvas_origin: String,

    /// Tokens the context service accepts.
    #[serde(default)]
    pub valid_tokens: Vec<String>,

    /// Context document returned for `ctx` requests.
    #[serde(default)]
    pub context: serde_json::Value,
}

impl HostSection {
    pub fn validate(&self) -> Result<()> {
        let origin = origin_of(&self.canvas_origin)
            .map_err(|e| XdError::BadRequest(format!("host.canvas_origin: {e}")))?;
        if origin != self.canvas_origin {
            return Err(XdError::BadRequest(format!(
                "host.canvas_origin must be a bare origin (got {}, expected {origin})",
                self.canvas_origin
            )));
        }
        Ok(())
    }
}

fn default_ceiling() -> u32 {
    100
}
fn default_authorization_scheme() -> String {
    "OAuth".into()
}
fn default_json() -> String {
    "application/json".into()
}
