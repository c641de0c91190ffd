use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use crate::net::{BuildError, Net, NetBuilder};

/// 连续运行时的默认轮数上限；活的环形网在没有上限时不会返回。
pub const DEFAULT_MAX_PASSES: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// 反复计算可发射集并发射，直到不动点（Paused）或 Ended。
    #[default]
    Continuous,
    /// 每次调用只发射一批，然后暂停。
    Stepped,
}

impl FromStr for Mode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "continuous" => Ok(Mode::Continuous),
            "stepped" | "step" => Ok(Mode::Stepped),
            other => anyhow::bail!("unsupported mode '{}'", other),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Continuous => f.write_str("continuous"),
            Mode::Stepped => f.write_str("stepped"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub mode: Mode,
    /// `None` 表示不设上限；在 TOML 中写作 `max_passes = 0`。
    #[serde(default = "default_max_passes", with = "max_passes_repr")]
    pub max_passes: Option<usize>,
    /// 只用于调试时重放一次会话；缺省时从操作系统取随机种子。
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            mode: Mode::default(),
            max_passes: default_max_passes(),
            seed: None,
        }
    }
}

impl EngineConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        let config: EngineConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;
        Ok(config)
    }
}

fn default_max_passes() -> Option<usize> {
    Some(DEFAULT_MAX_PASSES)
}

/// 轮数上限的外部表示，TOML 与命令行共用：0 表示不设上限。
pub fn pass_limit(raw: usize) -> Option<usize> {
    (raw != 0).then_some(raw)
}

mod max_passes_repr {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(limit: &Option<usize>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(limit.map_or(0, |limit| limit as u64))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<usize>, D::Error>
    where
        D: Deserializer<'de>,
    {
        usize::deserialize(deserializer).map(super::pass_limit)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaceDescription {
    pub name: String,
    #[serde(default)]
    pub tokens: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionDescription {
    pub name: String,
    #[serde(default)]
    pub terminal: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArcDescription {
    pub from: String,
    pub to: String,
    #[serde(default = "default_weight")]
    pub weight: i64,
}

fn default_weight() -> i64 {
    1
}

/// 前端使用的 TOML 网描述：节点按名称引用，弧的方向由端点种类决定。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetDescription {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub places: Vec<PlaceDescription>,
    #[serde(default)]
    pub transitions: Vec<TransitionDescription>,
    #[serde(default)]
    pub arcs: Vec<ArcDescription>,
}

impl NetDescription {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read net description: {:?}", path))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("Failed to parse net description: {:?}", path))
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn build(&self) -> Result<Net, BuildError> {
        let mut builder = NetBuilder::new();
        for place in &self.places {
            builder.place(place.name.clone(), place.tokens)?;
        }
        for transition in &self.transitions {
            if transition.terminal {
                builder.terminal_transition(transition.name.clone())?;
            } else {
                builder.transition(transition.name.clone())?;
            }
        }
        for arc in &self.arcs {
            builder.connect_named(&arc.from, &arc.to, arc.weight)?;
        }
        Ok(builder.build())
    }
}
