//! Pipeline config loader (strict parsing).

use std::fs;

use serde::Deserialize;

use evio_core::{DecodeLimits, ProtocolVersion};

use crate::error::{PipelineError, Result};

/// Top-level config document.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StackConfig {
    pub version: u32,

    /// Grammar revision the decoder speaks (1..=5).
    #[serde(default = "default_protocol_version")]
    pub protocol_version: u8,

    #[serde(default)]
    pub pipeline: PipelineConfig,

    #[serde(default)]
    pub limits: LimitsSection,
}

impl StackConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(PipelineError::Config(format!(
                "unsupported config version {}",
                self.version
            )));
        }
        ProtocolVersion::from_u8(self.protocol_version)
            .map_err(|e| PipelineError::Config(e.to_string()))?;
        self.pipeline.validate()?;
        self.limits.validate()?;
        Ok(())
    }

    pub fn protocol_version(&self) -> ProtocolVersion {
        // validate() gates the range; default to the newest revision if a
        // caller skipped it.
        ProtocolVersion::from_u8(self.protocol_version).unwrap_or(ProtocolVersion::V5)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    /// Upper bound on any single wait for attachment bytes.
    #[serde(default = "default_supply_timeout_ms")]
    pub supply_timeout_ms: u64,

    /// Chunk capacity of each slot's internal pipe.
    #[serde(default = "default_pipe_depth")]
    pub pipe_depth: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            supply_timeout_ms: default_supply_timeout_ms(),
            pipe_depth: default_pipe_depth(),
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<()> {
        if !(100..=600_000).contains(&self.supply_timeout_ms) {
            return Err(PipelineError::Config(
                "pipeline.supply_timeout_ms must be between 100 and 600000".to_string(),
            ));
        }
        if !(1..=1024).contains(&self.pipe_depth) {
            return Err(PipelineError::Config(
                "pipeline.pipe_depth must be between 1 and 1024".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_supply_timeout_ms() -> u64 {
    30_000
}
fn default_pipe_depth() -> usize {
    32
}
fn default_protocol_version() -> u8 {
    5
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LimitsSection {
    #[serde(default = "default_max_frame_bytes")]
    pub max_frame_bytes: usize,

    #[serde(default = "default_max_attachments")]
    pub max_attachments: usize,
}

impl Default for LimitsSection {
    fn default() -> Self {
        Self {
            max_frame_bytes: default_max_frame_bytes(),
            max_attachments: default_max_attachments(),
        }
    }
}

impl LimitsSection {
    pub fn validate(&self) -> Result<()> {
        if self.max_frame_bytes < 16 {
            return Err(PipelineError::Config(
                "limits.max_frame_bytes must be at least 16".to_string(),
            ));
        }
        if !(1..=4096).contains(&self.max_attachments) {
            return Err(PipelineError::Config(
                "limits.max_attachments must be between 1 and 4096".to_string(),
            ));
        }
        Ok(())
    }

    pub fn to_decode_limits(&self) -> DecodeLimits {
        DecodeLimits {
            max_frame_bytes: self.max_frame_bytes,
            max_attachments: self.max_attachments,
        }
    }
}

fn default_max_frame_bytes() -> usize {
    1 << 20
}
fn default_max_attachments() -> usize {
    256
}

pub fn load_from_file(path: &str) -> Result<StackConfig> {
    let s = fs::read_to_string(path)
        .map_err(|e| PipelineError::Config(format!("read config failed: {e}")))?;
    load_from_str(&s)
}

pub fn load_from_str(s: &str) -> Result<StackConfig> {
    let cfg: StackConfig =
        serde_yaml::from_str(s).map_err(|e| PipelineError::Config(format!("invalid yaml: {e}")))?;
    cfg.validate()?;
    Ok(cfg)
}
