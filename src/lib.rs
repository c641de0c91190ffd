//! 位置/迁移网（P/T 网）的建模与执行引擎。
//!
//! * [`net`]：不可变的网结构、标识、可发射判定与发射语义；
//! * [`observer`]：发射与生命周期事件及其订阅者，`net` 与 `engine` 共用；
//! * [`engine`]：生命周期状态机与按轮驱动的执行引擎；
//! * [`config`] / [`options`]：引擎配置、TOML 网描述与命令行参数。

pub mod config;
pub mod engine;
pub mod net;
pub mod observer;
pub mod options;

pub use config::{EngineConfig, Mode};
pub use engine::{Engine, EngineError, Event, Observer, RunSummary, State};
pub use net::{Marking, Net, NetBuilder};
