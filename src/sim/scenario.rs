use serde::{Deserialize, Serialize};

use crate::net::{ClassId, Protocol};
use crate::queue::{ConfigError, FqConfig};

fn default_schema_version() -> u32 {
    1
}

fn default_link_mbps() -> u64 {
    100
}

fn default_until_ms() -> u64 {
    1_000
}

fn default_pkt_bytes() -> u32 {
    1500
}

fn default_chain() -> u32 {
    1
}

/// 仿真场景：一个接口、一条出口链路和若干个发包流
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioSpec {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    #[serde(default)]
    pub fq: FqConfig,
    #[serde(default = "default_link_mbps")]
    pub link_mbps: u64,
    #[serde(default = "default_until_ms")]
    pub until_ms: u64,
    /// 对象池上限，缺省为全局上限
    #[serde(default)]
    pub pool_limit: Option<usize>,
    pub flows: Vec<FlowSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowSpec {
    pub flow_hash: u32,
    #[serde(default)]
    pub class: ClassId,
    #[serde(default)]
    pub proto: Protocol,
    /// 由本机 socket 发出（可接收流控通告）
    #[serde(default)]
    pub from_socket: bool,
    #[serde(default = "default_pkt_bytes")]
    pub pkt_bytes: u32,
    /// 两次入队之间的间隔（微秒）
    pub gap_us: u64,
    #[serde(default)]
    pub start_us: u64,
    /// 总入队次数，缺省一直发到仿真结束
    #[serde(default)]
    pub bursts: Option<u64>,
    /// 每次入队的包数
    #[serde(default = "default_chain")]
    pub chain: u32,
    /// 大于 0 时包可压缩：每 `comp_gen_run` 个包共用一个代数
    #[serde(default)]
    pub comp_gen_run: u32,
}

impl ScenarioSpec {
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let spec: ScenarioSpec = serde_json::from_str(raw)?;
        spec.validate()?;
        Ok(spec)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.fq.validate()?;
        if self.link_mbps == 0 {
            return Err(ConfigError::Invalid("link_mbps must be positive".into()));
        }
        if self.flows.is_empty() {
            return Err(ConfigError::Invalid("scenario has no flows".into()));
        }
        for f in &self.flows {
            if f.class.0 >= self.fq.classes.len() {
                return Err(ConfigError::Invalid(format!(
                    "flow {:#x} uses class {} but only {} classes are configured",
                    f.flow_hash,
                    f.class.0,
                    self.fq.classes.len()
                )));
            }
            if f.gap_us == 0 || f.pkt_bytes == 0 || f.chain == 0 {
                return Err(ConfigError::Invalid(format!(
                    "flow {:#x} needs positive gap_us, pkt_bytes and chain",
                    f.flow_hash
                )));
            }
        }
        Ok(())
    }
}
