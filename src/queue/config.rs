//! FQ-CoDel 参数
//!
//! 所有时间参数在 JSON 中以微秒表示，缺省字段取默认值。

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::sim::SimTime;

/// 配置加载或校验失败
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// 单个服务类的配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassConfig {
    pub name: String,
    /// 每轮 DRR 的字节配额
    #[serde(default = "default_quantum")]
    pub quantum: u32,
}

fn default_quantum() -> u32 {
    1514
}

impl ClassConfig {
    pub fn new(name: impl Into<String>, quantum: u32) -> Self {
        Self {
            name: name.into(),
            quantum,
        }
    }
}

/// 接口级 FQ-CoDel 配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FqConfig {
    /// CoDel 目标时延
    pub target_delay_us: u64,
    /// CoDel 测量区间，同时也是出队停滞判定的时间窗
    pub update_interval_us: u64,
    /// 接口总包数上限，达到后进入公平丢包逻辑
    pub pkt_drop_limit: u32,
    /// "接近满"阈值（占 `pkt_drop_limit` 的百分比），决定 overwhelming 标志能否保持
    pub almost_full_pct: u32,
    /// 成为 largest flow 候选所需的最少字节数
    pub large_flow_bytes: u64,
    /// 判定出队停滞所需的最少积压字节数
    pub min_stall_backlog_bytes: u64,
    /// 是否启用包压缩
    pub compression: bool,
    /// 空流在 empty 链表上保留多久后被回收
    pub empty_purge_delay_us: u64,
    /// 流控表容量
    pub flow_control_capacity: usize,
    pub classes: Vec<ClassConfig>,
}

impl Default for FqConfig {
    fn default() -> Self {
        Self {
            target_delay_us: 10_000,
            update_interval_us: 100_000,
            pkt_drop_limit: 2048,
            almost_full_pct: 80,
            large_flow_bytes: 15_000,
            min_stall_backlog_bytes: 7_500,
            compression: true,
            empty_purge_delay_us: 1_000_000,
            flow_control_capacity: 1024,
            classes: vec![
                ClassConfig::new("bk", default_quantum()),
                ClassConfig::new("be", default_quantum()),
                ClassConfig::new("vi", default_quantum()),
                ClassConfig::new("vo", default_quantum()),
            ],
        }
    }
}

impl FqConfig {
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let cfg: FqConfig = serde_json::from_str(raw)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.classes.is_empty() {
            return Err(ConfigError::Invalid("at least one service class is required".into()));
        }
        if let Some(c) = self.classes.iter().find(|c| c.quantum == 0) {
            return Err(ConfigError::Invalid(format!(
                "class `{}` has a zero quantum",
                c.name
            )));
        }
        if self.pkt_drop_limit == 0 {
            return Err(ConfigError::Invalid("pkt_drop_limit must be positive".into()));
        }
        if self.update_interval_us == 0 {
            return Err(ConfigError::Invalid("update_interval_us must be positive".into()));
        }
        if self.target_delay_us >= self.update_interval_us {
            return Err(ConfigError::Invalid(format!(
                "target delay ({}us) must be below the update interval ({}us)",
                self.target_delay_us, self.update_interval_us
            )));
        }
        if self.almost_full_pct == 0 || self.almost_full_pct > 100 {
            return Err(ConfigError::Invalid(format!(
                "almost_full_pct must be in 1..=100, got {}",
                self.almost_full_pct
            )));
        }
        Ok(())
    }

    pub fn target_delay(&self) -> SimTime {
        SimTime::from_micros(self.target_delay_us)
    }

    pub fn update_interval(&self) -> SimTime {
        SimTime::from_micros(self.update_interval_us)
    }

    pub fn empty_purge_delay(&self) -> SimTime {
        SimTime::from_micros(self.empty_purge_delay_us)
    }

    /// 接近满时的包数阈值
    pub fn almost_full_pkts(&self) -> u32 {
        let limit = u64::from(self.pkt_drop_limit) * u64::from(self.almost_full_pct) / 100;
        u32::try_from(limit).unwrap_or(u32::MAX)
    }
}
