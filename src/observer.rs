//! 通知接口：引擎在生命周期变化与每次发射前后同步回调观察者。
use serde::Serialize;

use crate::net::ids::{PlaceId, TransitionId};
use crate::net::marking::Token;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    EngineStarted,
    EngineResumed,
    EnginePaused,
    EngineStopped,
    EngineEnded,
    BeforeFire { transition: TransitionId },
    TokenConsumed { token: Token, place: PlaceId },
    TokenProduced { token: Token, place: PlaceId },
    AfterFire { transition: TransitionId },
}

impl Event {
    pub fn kind(&self) -> &'static str {
        match self {
            Event::EngineStarted => "engine_started",
            Event::EngineResumed => "engine_resumed",
            Event::EnginePaused => "engine_paused",
            Event::EngineStopped => "engine_stopped",
            Event::EngineEnded => "engine_ended",
            Event::BeforeFire { .. } => "before_fire",
            Event::TokenConsumed { .. } => "token_consumed",
            Event::TokenProduced { .. } => "token_produced",
            Event::AfterFire { .. } => "after_fire",
        }
    }
}

pub trait Observer {
    fn on_event(&mut self, event: &Event);
}

impl<F> Observer for F
where
    F: FnMut(&Event),
{
    fn on_event(&mut self, event: &Event) {
        self(event)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl Observer for NoopObserver {
    fn on_event(&mut self, _event: &Event) {}
}

/// 把事件转发到 `log`：生命周期事件为 debug 级别，令牌流动为 trace 级别。
#[derive(Debug, Default, Clone, Copy)]
pub struct LogObserver;

impl Observer for LogObserver {
    fn on_event(&mut self, event: &Event) {
        match event {
            Event::TokenConsumed { token, place } => log::trace!("{} <- {}", token, place),
            Event::TokenProduced { token, place } => log::trace!("{} -> {}", token, place),
            Event::BeforeFire { transition } | Event::AfterFire { transition } => {
                log::trace!("{} {}", event.kind(), transition)
            }
            _ => log::debug!("{}", event.kind()),
        }
    }
}

/// 按顺序记录收到的所有事件。
#[derive(Debug, Default, Clone)]
pub struct Recorder {
    events: Vec<Event>,
}

impl Recorder {
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn into_events(self) -> Vec<Event> {
        self.events
    }

    pub fn fired(&self) -> Vec<TransitionId> {
        self.events
            .iter()
            .filter_map(|event| match event {
                Event::AfterFire { transition } => Some(*transition),
                _ => None,
            })
            .collect()
    }
}

impl Observer for Recorder {
    fn on_event(&mut self, event: &Event) {
        self.events.push(event.clone());
    }
}

/// 可在多处共享的记录器，引擎持有一份克隆，调用方保留另一份读取结果。
#[derive(Debug, Default, Clone)]
pub struct SharedRecorder(std::sync::Arc<std::sync::Mutex<Recorder>>);

impl SharedRecorder {
    pub fn snapshot(&self) -> Recorder {
        match self.0.lock() {
            Ok(recorder) => recorder.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl Observer for SharedRecorder {
    fn on_event(&mut self, event: &Event) {
        match self.0.lock() {
            Ok(mut recorder) => recorder.on_event(event),
            Err(poisoned) => poisoned.into_inner().on_event(event),
        }
    }
}
