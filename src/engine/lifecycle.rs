//! 引擎生命周期状态机。
//!
//! | 当前      | start            | resume           | stop           | pause          | end            |
//! |-----------|------------------|------------------|----------------|----------------|----------------|
//! | Stopped   | Started          | Started          | AlreadyStopped | InvalidState   | InvalidState   |
//! | Started   | AlreadyStarted   | InvalidState     | Stopped        | Paused         | Ended          |
//! | Paused    | Started (resume) | Started (resume) | Stopped        | AlreadyPaused  | InvalidState   |
//! | Ended     | WorkflowEnded    | WorkflowEnded    | WorkflowEnded  | WorkflowEnded  | WorkflowEnded  |
//!
//! 从 Paused 重新进入的 Started 带有 `resumed` 标记，只影响对外通知的事件种类。
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::engine::EngineError;
use crate::observer::Event;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum State {
    Stopped,
    Started,
    Paused,
    Ended,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            State::Stopped => "stopped",
            State::Started => "started",
            State::Paused => "paused",
            State::Ended => "ended",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lifecycle {
    state: State,
    resumed: bool,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            state: State::Stopped,
            resumed: false,
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// 当前的 Started 是否由 Paused 恢复而来。
    pub fn is_resumed(&self) -> bool {
        self.state == State::Started && self.resumed
    }

    pub fn start(&mut self) -> Result<Event, EngineError> {
        match self.state {
            State::Stopped => Ok(self.enter_started(false)),
            State::Paused => Ok(self.enter_started(true)),
            State::Started => Err(EngineError::AlreadyStarted),
            State::Ended => Err(EngineError::WorkflowEnded),
        }
    }

    /// 在 Stopped 上等同于 `start`。
    pub fn resume(&mut self) -> Result<Event, EngineError> {
        match self.state {
            State::Stopped => Ok(self.enter_started(false)),
            State::Paused => Ok(self.enter_started(true)),
            State::Started => Err(self.invalid("resume")),
            State::Ended => Err(EngineError::WorkflowEnded),
        }
    }

    pub fn stop(&mut self) -> Result<Event, EngineError> {
        match self.state {
            State::Started | State::Paused => {
                self.enter(State::Stopped);
                Ok(Event::EngineStopped)
            }
            State::Stopped => Err(EngineError::AlreadyStopped),
            State::Ended => Err(EngineError::WorkflowEnded),
        }
    }

    pub fn pause(&mut self) -> Result<Event, EngineError> {
        match self.state {
            State::Started => {
                self.enter(State::Paused);
                Ok(Event::EnginePaused)
            }
            State::Paused => Err(EngineError::AlreadyPaused),
            State::Stopped => Err(self.invalid("pause")),
            State::Ended => Err(EngineError::WorkflowEnded),
        }
    }

    pub fn end(&mut self) -> Result<Event, EngineError> {
        match self.state {
            State::Started => {
                self.enter(State::Ended);
                Ok(Event::EngineEnded)
            }
            State::Stopped | State::Paused => Err(self.invalid("end")),
            State::Ended => Err(EngineError::WorkflowEnded),
        }
    }

    pub(crate) fn expect_started(&self, event: &'static str) -> Result<(), EngineError> {
        match self.state {
            State::Started => Ok(()),
            State::Ended => Err(EngineError::WorkflowEnded),
            _ => Err(self.invalid(event)),
        }
    }

    fn enter_started(&mut self, resumed: bool) -> Event {
        self.enter(State::Started);
        self.resumed = resumed;
        if resumed {
            Event::EngineResumed
        } else {
            Event::EngineStarted
        }
    }

    fn enter(&mut self, state: State) {
        log::debug!("engine {} -> {}", self.state, state);
        self.state = state;
        self.resumed = false;
    }

    fn invalid(&self, event: &'static str) -> EngineError {
        EngineError::InvalidState {
            state: self.state,
            event,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn in_state(state: State) -> Lifecycle {
        let mut lifecycle = Lifecycle::new();
        match state {
            State::Stopped => {}
            State::Started => {
                lifecycle.start().unwrap();
            }
            State::Paused => {
                lifecycle.start().unwrap();
                lifecycle.pause().unwrap();
            }
            State::Ended => {
                lifecycle.start().unwrap();
                lifecycle.end().unwrap();
            }
        }
        assert_eq!(lifecycle.state(), state);
        lifecycle
    }

    #[test]
    fn stopped_transitions() {
        assert_eq!(in_state(State::Stopped).start(), Ok(Event::EngineStarted));
        assert_eq!(in_state(State::Stopped).resume(), Ok(Event::EngineStarted));
        assert_eq!(in_state(State::Stopped).stop(), Err(EngineError::AlreadyStopped));
        assert!(matches!(
            in_state(State::Stopped).end(),
            Err(EngineError::InvalidState { state: State::Stopped, .. })
        ));
    }

    #[test]
    fn started_transitions() {
        assert_eq!(in_state(State::Started).start(), Err(EngineError::AlreadyStarted));
        assert!(matches!(
            in_state(State::Started).resume(),
            Err(EngineError::InvalidState { state: State::Started, event: "resume" })
        ));

        let mut lifecycle = in_state(State::Started);
        assert_eq!(lifecycle.pause(), Ok(Event::EnginePaused));
        assert_eq!(lifecycle.state(), State::Paused);

        let mut lifecycle = in_state(State::Started);
        assert_eq!(lifecycle.stop(), Ok(Event::EngineStopped));
        assert_eq!(lifecycle.state(), State::Stopped);

        let mut lifecycle = in_state(State::Started);
        assert_eq!(lifecycle.end(), Ok(Event::EngineEnded));
        assert_eq!(lifecycle.state(), State::Ended);
    }

    #[test]
    fn paused_transitions() {
        let mut lifecycle = in_state(State::Paused);
        assert_eq!(lifecycle.resume(), Ok(Event::EngineResumed));
        assert!(lifecycle.is_resumed());

        let mut lifecycle = in_state(State::Paused);
        assert_eq!(lifecycle.start(), Ok(Event::EngineResumed));
        assert_eq!(lifecycle.state(), State::Started);

        assert_eq!(in_state(State::Paused).pause(), Err(EngineError::AlreadyPaused));
        assert!(matches!(
            in_state(State::Paused).end(),
            Err(EngineError::InvalidState { state: State::Paused, .. })
        ));
        assert_eq!(in_state(State::Paused).stop(), Ok(Event::EngineStopped));
    }

    #[test]
    fn resumed_started_rejects_start_and_resume() {
        let mut lifecycle = in_state(State::Paused);
        lifecycle.resume().unwrap();
        assert_eq!(lifecycle.start(), Err(EngineError::AlreadyStarted));
        assert!(matches!(lifecycle.resume(), Err(EngineError::InvalidState { .. })));

        lifecycle.pause().unwrap();
        assert!(!lifecycle.is_resumed());
    }

    #[test]
    fn ended_rejects_everything() {
        let mut lifecycle = in_state(State::Ended);
        assert_eq!(lifecycle.start(), Err(EngineError::WorkflowEnded));
        assert_eq!(lifecycle.resume(), Err(EngineError::WorkflowEnded));
        assert_eq!(lifecycle.stop(), Err(EngineError::WorkflowEnded));
        assert_eq!(lifecycle.pause(), Err(EngineError::WorkflowEnded));
        assert_eq!(lifecycle.end(), Err(EngineError::WorkflowEnded));
        assert_eq!(lifecycle.expect_started("run"), Err(EngineError::WorkflowEnded));
        assert_eq!(lifecycle.state(), State::Ended);
    }
}
