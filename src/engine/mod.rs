//! # 执行引擎
//!
//! 引擎借用一个不可变的 [`Net`]，持有自己的 [`Marking`]，并按轮（pass）驱动执行：
//!
//! 1. 计算可发射集并做均匀随机洗牌，使冲突中的迁移不会被系统性地偏袒；
//! 2. 按洗牌后的顺序逐个发射，每次发射前重新检查可发射性，
//!    被同轮先前发射禁用的迁移静默跳过；
//! 3. 连续模式下重复上述过程，直到可发射集为空（进入 Paused）或终止迁移发射（进入 Ended）；
//!    单步模式下只执行一轮即暂停。
//!
//! 执行是单线程、同步的。需要跨线程共享时，把整个引擎放进 `Mutex`，而不是只保护标识。
//!
//! ```rust
//! use pn_engine::engine::{Engine, State};
//! use pn_engine::net::NetBuilder;
//!
//! let mut builder = NetBuilder::new();
//! let p1 = builder.place("p1", 1).unwrap();
//! let p2 = builder.place("p2", 0).unwrap();
//! let t1 = builder.transition("t1").unwrap();
//! builder.input(p1, t1, 1).unwrap();
//! builder.output(t1, p2, 1).unwrap();
//! let net = builder.build();
//!
//! let mut engine = Engine::new(&net);
//! let summary = engine.start().unwrap();
//! assert_eq!(summary.fired, 1);
//! assert_eq!(engine.state(), State::Paused);
//! assert_eq!(engine.marking().count(p2), 1);
//! ```
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::Serialize;
use thiserror::Error;

use crate::config::{EngineConfig, Mode};
use crate::net::firing::{self, FireError};
use crate::net::ids::TransitionId;
use crate::net::marking::{Marking, MarkingError};
use crate::net::Net;

pub mod lifecycle;

pub use crate::observer::{
    Event, LogObserver, NoopObserver, Observer, Recorder, SharedRecorder,
};
pub use lifecycle::{Lifecycle, State};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error("engine is already started")]
    AlreadyStarted,
    #[error("engine is already stopped")]
    AlreadyStopped,
    #[error("engine is already paused")]
    AlreadyPaused,
    #[error("workflow has ended")]
    WorkflowEnded,
    #[error("cannot {event} while engine is {state}")]
    InvalidState { state: State, event: &'static str },
    #[error(transparent)]
    Fire(#[from] FireError),
    #[error(transparent)]
    Marking(#[from] MarkingError),
}

/// 一次 `start`/`resume`/`step`/`run` 调用的统计。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub passes: usize,
    pub fired: usize,
    /// 进入本轮时可发射、轮到它时已被禁用的迁移数。
    pub skipped: usize,
    pub final_state: State,
}

impl RunSummary {
    fn new() -> Self {
        Self {
            passes: 0,
            fired: 0,
            skipped: 0,
            final_state: State::Started,
        }
    }
}

enum Pass {
    Quiescent,
    Fired,
    Ended,
}

/// 把一次事件分发给所有订阅者。
struct Fanout<'a>(&'a mut [Box<dyn Observer + Send>]);

impl Observer for Fanout<'_> {
    fn on_event(&mut self, event: &Event) {
        for observer in self.0.iter_mut() {
            observer.on_event(event);
        }
    }
}

pub struct Engine<'net> {
    net: &'net Net,
    marking: Marking,
    lifecycle: Lifecycle,
    config: EngineConfig,
    rng: StdRng,
    observers: Vec<Box<dyn Observer + Send>>,
}

impl<'net> Engine<'net> {
    /// 以网的初始标识创建引擎。
    pub fn new(net: &'net Net) -> Self {
        Self {
            net,
            marking: net.initial_marking(),
            lifecycle: Lifecycle::new(),
            config: EngineConfig::default(),
            rng: StdRng::from_os_rng(),
            observers: Vec::new(),
        }
    }

    pub fn with_marking(net: &'net Net, marking: Marking) -> Result<Self, EngineError> {
        marking.validate_for(net)?;
        let mut engine = Self::new(net);
        engine.marking = marking;
        Ok(engine)
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        if let Some(seed) = config.seed {
            self.rng = StdRng::seed_from_u64(seed);
        }
        self.config = config;
        self
    }

    pub fn subscribe<O>(&mut self, observer: O)
    where
        O: Observer + Send + 'static,
    {
        self.observers.push(Box::new(observer));
    }

    pub fn net(&self) -> &'net Net {
        self.net
    }

    pub fn marking(&self) -> &Marking {
        &self.marking
    }

    pub fn into_marking(self) -> Marking {
        self.marking
    }

    pub fn state(&self) -> State {
        self.lifecycle.state()
    }

    pub fn is_resumed(&self) -> bool {
        self.lifecycle.is_resumed()
    }

    pub fn mode(&self) -> Mode {
        self.config.mode
    }

    pub fn set_mode(&mut self, mode: Mode) {
        self.config.mode = mode;
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// 当前标识下可发射的迁移，顺序为均匀随机排列。
    pub fn enabled_transitions(&mut self) -> Vec<TransitionId> {
        let mut enabled = self.net.enabled_transitions(&self.marking);
        enabled.shuffle(&mut self.rng);
        enabled
    }

    pub fn is_enabled(&self, transition: TransitionId) -> bool {
        self.net.is_enabled(transition, &self.marking)
    }

    /// 进入 Started 并立即执行；Paused 上调用等同于 `resume`。
    pub fn start(&mut self) -> Result<RunSummary, EngineError> {
        let event = self.lifecycle.start()?;
        self.notify(&event);
        self.drive(self.config.mode)
    }

    pub fn resume(&mut self) -> Result<RunSummary, EngineError> {
        let event = self.lifecycle.resume()?;
        self.notify(&event);
        self.drive(self.config.mode)
    }

    /// 无论当前模式如何，只执行一轮后暂停。必要时先进入 Started。
    pub fn step(&mut self) -> Result<RunSummary, EngineError> {
        self.enter_started()?;
        self.drive(Mode::Stepped)
    }

    /// 无论当前模式如何，连续执行到不动点（Paused）或 Ended。必要时先进入 Started。
    pub fn run(&mut self) -> Result<RunSummary, EngineError> {
        self.enter_started()?;
        self.drive(Mode::Continuous)
    }

    pub fn pause(&mut self) -> Result<(), EngineError> {
        let event = self.lifecycle.pause()?;
        self.notify(&event);
        Ok(())
    }

    pub fn stop(&mut self) -> Result<(), EngineError> {
        let event = self.lifecycle.stop()?;
        self.notify(&event);
        Ok(())
    }

    pub fn end(&mut self) -> Result<(), EngineError> {
        let event = self.lifecycle.end()?;
        self.notify(&event);
        Ok(())
    }

    /// 以新标识开始一次新的会话，生命周期回到 Stopped（包括已 Ended 的引擎）。
    pub fn reset(&mut self, marking: Marking) -> Result<(), EngineError> {
        marking.validate_for(self.net)?;
        self.marking = marking;
        self.lifecycle = Lifecycle::new();
        Ok(())
    }

    /// 在引擎之外直接发射一个迁移；不检查生命周期，未启用时返回 `NotEnabled`。
    pub fn fire(&mut self, transition: TransitionId) -> Result<firing::FireOutcome, EngineError> {
        let outcome = firing::fire(
            self.net,
            transition,
            &mut self.marking,
            &mut Fanout(&mut self.observers),
        )?;
        Ok(outcome)
    }

    fn enter_started(&mut self) -> Result<(), EngineError> {
        if self.state() != State::Started {
            let event = self.lifecycle.start()?;
            self.notify(&event);
        }
        Ok(())
    }

    fn drive(&mut self, mode: Mode) -> Result<RunSummary, EngineError> {
        self.lifecycle.expect_started("run")?;
        let mut summary = RunSummary::new();

        loop {
            match self.run_pass(&mut summary)? {
                Pass::Ended => break,
                Pass::Quiescent => {
                    log::debug!("no enabled transitions after {} pass(es)", summary.passes);
                    self.pause()?;
                    break;
                }
                Pass::Fired if mode == Mode::Stepped => {
                    self.pause()?;
                    break;
                }
                Pass::Fired => {
                    if let Some(limit) = self.config.max_passes {
                        if summary.passes >= limit {
                            log::warn!(
                                "pass limit {} reached with transitions still enabled, pausing",
                                limit
                            );
                            self.pause()?;
                            break;
                        }
                    }
                }
            }
        }

        summary.final_state = self.state();
        log::debug!(
            "run finished: {} pass(es), {} fired, {} skipped, state {}",
            summary.passes,
            summary.fired,
            summary.skipped,
            summary.final_state
        );
        Ok(summary)
    }

    fn run_pass(&mut self, summary: &mut RunSummary) -> Result<Pass, EngineError> {
        let enabled = self.enabled_transitions();
        if enabled.is_empty() {
            return Ok(Pass::Quiescent);
        }
        summary.passes += 1;
        log::trace!("pass {}: {:?}", summary.passes, enabled);

        for transition in enabled {
            // 同一轮中先前的发射可能已经取走了它需要的令牌
            if !self.net.is_enabled(transition, &self.marking) {
                summary.skipped += 1;
                continue;
            }
            let outcome = self.fire(transition)?;
            summary.fired += 1;
            if outcome.terminal {
                log::debug!("terminal transition {} fired", transition);
                self.end()?;
                return Ok(Pass::Ended);
            }
        }
        Ok(Pass::Fired)
    }

    fn notify(&mut self, event: &Event) {
        Fanout(&mut self.observers).on_event(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::NetBuilder;
    use crate::net::ids::PlaceId;

    fn assert_send<T: Send>() {}

    #[test]
    fn engine_is_send() {
        assert_send::<Engine<'static>>();
    }

    fn chain() -> (Net, [PlaceId; 3]) {
        let mut builder = NetBuilder::new();
        let p1 = builder.place("p1", 1).unwrap();
        let p2 = builder.place("p2", 0).unwrap();
        let p3 = builder.place("p3", 0).unwrap();
        let t1 = builder.transition("t1").unwrap();
        let t2 = builder.transition("t2").unwrap();
        builder.input(p1, t1, 1).unwrap();
        builder.output(t1, p2, 1).unwrap();
        builder.input(p2, t2, 1).unwrap();
        builder.output(t2, p3, 1).unwrap();
        (builder.build(), [p1, p2, p3])
    }

    #[test]
    fn continuous_run_reaches_fixed_point() {
        let (net, [p1, p2, p3]) = chain();
        let mut engine = Engine::new(&net);

        let summary = engine.start().unwrap();
        assert_eq!(summary.fired, 2);
        assert_eq!(summary.passes, 2);
        assert_eq!(summary.final_state, State::Paused);
        assert_eq!(
            (
                engine.marking().count(p1),
                engine.marking().count(p2),
                engine.marking().count(p3)
            ),
            (0, 0, 1)
        );
    }

    #[test]
    fn drive_requires_started() {
        let (net, _) = chain();
        let mut engine = Engine::new(&net);
        assert!(matches!(
            engine.drive(Mode::Continuous),
            Err(EngineError::InvalidState { state: State::Stopped, event: "run" })
        ));
    }

    #[test]
    fn run_finishes_a_stepped_session() {
        let (net, [p1, p2, p3]) = chain();
        let recorder = SharedRecorder::default();
        let mut engine = Engine::new(&net);
        engine.subscribe(recorder.clone());
        engine.set_mode(Mode::Stepped);

        engine.start().unwrap();
        assert_eq!(engine.marking().count(p2), 1);

        let rest = engine.run().unwrap();
        assert_eq!((rest.fired, rest.final_state), (1, State::Paused));
        assert_eq!(
            (
                engine.marking().count(p1),
                engine.marking().count(p2),
                engine.marking().count(p3)
            ),
            (0, 0, 1)
        );
        assert_eq!(engine.mode(), Mode::Stepped);
        assert!(recorder.snapshot().events().contains(&Event::EngineResumed));
    }

    #[test]
    fn run_from_stopped_starts_the_engine() {
        let (net, [_, _, p3]) = chain();
        let mut engine = Engine::new(&net);
        engine.set_mode(Mode::Stepped);

        let summary = engine.run().unwrap();
        assert_eq!((summary.passes, summary.fired), (2, 2));
        assert_eq!(engine.marking().count(p3), 1);
    }

    #[test]
    fn stepped_mode_pauses_after_each_batch() {
        let (net, [_, p2, p3]) = chain();
        let mut engine = Engine::new(&net);
        engine.set_mode(Mode::Stepped);

        let first = engine.start().unwrap();
        assert_eq!((first.fired, first.final_state), (1, State::Paused));
        assert_eq!(engine.marking().count(p2), 1);

        let second = engine.resume().unwrap();
        assert_eq!(second.fired, 1);
        assert_eq!(engine.marking().count(p3), 1);

        let idle = engine.resume().unwrap();
        assert_eq!((idle.passes, idle.fired), (0, 0));
        assert_eq!(engine.state(), State::Paused);
    }

    #[test]
    fn terminal_transition_ends_the_workflow() {
        let mut builder = NetBuilder::new();
        let p = builder.place("p", 1).unwrap();
        let done = builder.place("done", 0).unwrap();
        let finish = builder.terminal_transition("finish").unwrap();
        builder.input(p, finish, 1).unwrap();
        builder.output(finish, done, 1).unwrap();
        let net = builder.build();

        let mut engine = Engine::new(&net);
        let summary = engine.start().unwrap();
        assert_eq!(summary.final_state, State::Ended);
        assert_eq!(engine.marking().count(done), 1);

        assert_eq!(engine.start(), Err(EngineError::WorkflowEnded));
        assert_eq!(engine.step(), Err(EngineError::WorkflowEnded));
        assert_eq!(engine.stop(), Err(EngineError::WorkflowEnded));
    }

    #[test]
    fn pass_limit_pauses_live_nets() {
        let mut builder = NetBuilder::new();
        let a = builder.place("a", 1).unwrap();
        let b = builder.place("b", 0).unwrap();
        let forth = builder.transition("forth").unwrap();
        let back = builder.transition("back").unwrap();
        builder.input(a, forth, 1).unwrap();
        builder.output(forth, b, 1).unwrap();
        builder.input(b, back, 1).unwrap();
        builder.output(back, a, 1).unwrap();
        let net = builder.build();

        let config = EngineConfig {
            max_passes: Some(5),
            ..EngineConfig::default()
        };
        let mut engine = Engine::new(&net).with_config(config);
        let summary = engine.start().unwrap();

        assert_eq!(summary.passes, 5);
        assert_eq!(summary.final_state, State::Paused);
        assert_eq!(engine.marking().total(), 1);
    }

    #[test]
    fn with_marking_rejects_foreign_places() {
        let (net, _) = chain();
        let marking = Marking::from_counts([(PlaceId::new(42), 1)]);
        assert!(matches!(
            Engine::with_marking(&net, marking),
            Err(EngineError::Marking(MarkingError::UnknownPlace(_)))
        ));
    }

    #[test]
    fn reset_starts_a_new_session() {
        let (net, [p1, _, p3]) = chain();
        let mut engine = Engine::new(&net);
        engine.start().unwrap();
        assert_eq!(engine.marking().count(p3), 1);

        engine.reset(Marking::from_counts([(p1, 2)])).unwrap();
        assert_eq!(engine.state(), State::Stopped);
        engine.start().unwrap();
        assert_eq!(engine.marking().count(p3), 2);
    }

    #[test]
    fn direct_fire_reports_not_enabled() {
        let (net, _) = chain();
        let t2 = net.transition_by_name("t2").unwrap();
        let mut engine = Engine::new(&net);
        assert_eq!(
            engine.fire(t2).unwrap_err(),
            EngineError::Fire(FireError::NotEnabled(t2))
        );
    }

    #[test]
    fn lifecycle_events_reach_observers() {
        let (net, _) = chain();
        let recorder = SharedRecorder::default();
        let mut engine = Engine::new(&net);
        engine.subscribe(recorder.clone());
        engine.set_mode(Mode::Stepped);

        engine.start().unwrap();
        engine.resume().unwrap();
        engine.stop().unwrap();

        let lifecycle = recorder
            .snapshot()
            .events()
            .iter()
            .map(Event::kind)
            .filter(|kind| kind.starts_with("engine_"))
            .collect::<Vec<_>>();
        assert_eq!(
            lifecycle,
            vec![
                "engine_started",
                "engine_paused",
                "engine_resumed",
                "engine_paused",
                "engine_stopped"
            ]
        );
    }
}
