//! Parsing Options.
//! `pn <NET.toml> [--config FILE] [--mode continuous|stepped] [--max-passes N] [--seed N] [--json] [--dot FILE] [--trace]`

use anyhow::{Context, Result};
use clap::{Arg, ArgAction, Command};

use crate::config::{EngineConfig, Mode, pass_limit};

fn make_options_parser() -> clap::Command {
    Command::new("pn")
        .no_binary_name(true)
        .about("Run a place/transition net until it pauses or ends")
        .version("v0.1.0")
        .arg(
            Arg::new("net")
                .value_name("NET")
                .help("TOML description of the net to execute")
                .required(true),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Engine settings file; replaces the description's [engine] table"),
        )
        .arg(
            Arg::new("mode")
                .short('m')
                .long("mode")
                .help("Execution mode; overrides the description's [engine] table")
                .value_parser(["continuous", "stepped"]),
        )
        .arg(
            Arg::new("max-passes")
                .long("max-passes")
                .value_name("N")
                .help("Upper bound on passes of a continuous run, 0 for unbounded")
                .value_parser(clap::value_parser!(usize)),
        )
        .arg(
            Arg::new("seed")
                .long("seed")
                .value_name("N")
                .help("Seed the conflict shuffle to replay a session")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("steps")
                .short('n')
                .long("steps")
                .value_name("N")
                .help("In stepped mode, how many batches to execute")
                .default_value("1")
                .value_parser(clap::value_parser!(usize)),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .help("Print the run summary and final marking as JSON")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("dot")
                .long("dot")
                .value_name("FILE")
                .help("Write the final marking as a Graphviz file"),
        )
        .arg(
            Arg::new("trace")
                .long("trace")
                .help("Print every engine event")
                .action(ArgAction::SetTrue),
        )
}

#[derive(Debug, Default)]
pub struct Options {
    pub net: String,
    pub config: Option<String>,
    pub mode: Option<Mode>,
    pub max_passes: Option<usize>,
    pub seed: Option<u64>,
    pub steps: usize,
    pub json: bool,
    pub dot: Option<String>,
    pub trace: bool,
}

impl Options {
    pub fn parse_from_str(s: &str) -> Result<Self> {
        let flags = shellwords::split(s).context("malformed option string")?;
        Self::parse_from_args(&flags)
    }

    pub fn parse_from_args(flags: &[String]) -> Result<Self> {
        let app = make_options_parser();
        let matches = app.try_get_matches_from(flags.iter())?;

        let mode = matches
            .get_one::<String>("mode")
            .map(|mode| mode.parse::<Mode>())
            .transpose()?;

        Ok(Options {
            net: matches
                .get_one::<String>("net")
                .cloned()
                .unwrap_or_default(),
            config: matches.get_one::<String>("config").cloned(),
            mode,
            max_passes: matches.get_one::<usize>("max-passes").copied(),
            seed: matches.get_one::<u64>("seed").copied(),
            steps: matches.get_one::<usize>("steps").copied().unwrap_or(1),
            json: matches.get_flag("json"),
            dot: matches.get_one::<String>("dot").cloned(),
            trace: matches.get_flag("trace"),
        })
    }

    /// 命令行参数覆盖网描述中的 `[engine]` 配置。
    pub fn apply_to(&self, config: &mut EngineConfig) {
        if let Some(mode) = self.mode {
            config.mode = mode;
        }
        if let Some(raw) = self.max_passes {
            config.max_passes = pass_limit(raw);
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }
    }
}
