use anyhow::{Context, Result};
use log::debug;
use serde::Serialize;

use pn_engine::config::{EngineConfig, Mode, NetDescription};
use pn_engine::engine::{Engine, Event, LogObserver, RunSummary, SharedRecorder, State};
use pn_engine::options::Options;

#[derive(Serialize)]
struct Report<'a> {
    summary: RunSummary,
    marking: Vec<(String, u64)>,
    #[serde(skip_serializing_if = "Option::is_none")]
    events: Option<&'a [Event]>,
}

fn main() {
    if std::env::var("PN_LOG").is_ok() {
        let e = env_logger::Env::new()
            .filter("PN_LOG")
            .write_style("PN_LOG_STYLE");
        env_logger::init_from_env(e);
    }

    if let Err(err) = run() {
        eprintln!("error: {:#}", err);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    // PN_FLAGS 中的参数排在命令行参数之前，后者可以覆盖前者
    let mut flags = shellwords::split(&std::env::var("PN_FLAGS").unwrap_or_default())
        .context("malformed PN_FLAGS")?;
    flags.extend(std::env::args().skip(1));
    let options = Options::parse_from_args(&flags)?;
    debug!("PN options: {:?}", options);

    let description = NetDescription::load_from_file(&options.net)?;
    let net = description
        .build()
        .with_context(|| format!("invalid net description {}", options.net))?;
    net.log_diagnostics();

    let mut config = match &options.config {
        Some(path) => EngineConfig::load_from_file(path)?,
        None => description.engine.clone(),
    };
    options.apply_to(&mut config);
    let mode = config.mode;

    let recorder = SharedRecorder::default();
    let mut engine = Engine::new(&net).with_config(config);
    engine.subscribe(LogObserver);
    if options.trace {
        engine.subscribe(recorder.clone());
    }

    let mut summary = engine.start()?;
    if mode == Mode::Stepped {
        for _ in 1..options.steps {
            if engine.state() != State::Paused {
                break;
            }
            let next = engine.step()?;
            summary.passes += next.passes;
            summary.fired += next.fired;
            summary.skipped += next.skipped;
            summary.final_state = next.final_state;
        }
    }

    if let Some(path) = &options.dot {
        net.write_dot(path, engine.marking())
            .with_context(|| format!("failed to write {}", path))?;
    }

    let trace = recorder.snapshot();
    if options.json {
        let report = Report {
            summary,
            marking: engine.marking().summary(&net),
            events: options.trace.then_some(trace.events()),
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        if options.trace {
            for event in trace.events() {
                println!("{:?}", event);
            }
        }
        println!(
            "{} after {} pass(es): {} fired, {} skipped",
            summary.final_state, summary.passes, summary.fired, summary.skipped
        );
        println!("{}", engine.marking().display(&net));
    }
    Ok(())
}
