//! 可发射判定与发射语义.
//!
//! * 迁移 `t` **可发射** 当且仅当 `t` 至少有一条输入弧，且对每条输入弧 `(p, t, w)` 都有
//!   `M[p] ≥ w`。没有输入弧的迁移按约定永远不可发射：令牌不能凭空产生。
//! * **发射** 时先按库所身份把输入弧与输出弧两两配对（自环），配对的弧不移动任何令牌；
//!   其余输入弧各移除 `w` 个任意令牌，其余输出弧各产生 `w` 个新令牌。
//! * 消耗是尽力而为的：若库所在发射途中已不足 `w` 个令牌（例如同一库所有多条输入弧），
//!   能取多少取多少，不报错、不回滚。
use smallvec::SmallVec;
use thiserror::Error;

use crate::net::Net;
use crate::net::ids::{PlaceId, TransitionId};
use crate::net::marking::{Marking, Token};
use crate::net::structure::Weight;
use crate::observer::{Event, Observer};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FireError {
    #[error("transition {0} is out of bounds")]
    OutOfBounds(TransitionId),
    #[error("transition {0} is not enabled under the supplied marking")]
    NotEnabled(TransitionId),
}

/// 一次发射的结果记录。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FireOutcome {
    pub transition: TransitionId,
    pub consumed: Vec<(PlaceId, Token)>,
    pub produced: Vec<(PlaceId, Token)>,
    /// 因自环配对而未被触碰的库所。
    pub self_loops: Vec<PlaceId>,
    /// 消耗时缺少的令牌数，正常情况下为 0。
    pub shortfall: Weight,
    pub terminal: bool,
}

impl FireOutcome {
    fn new(transition: TransitionId, terminal: bool) -> Self {
        Self {
            transition,
            consumed: Vec::new(),
            produced: Vec::new(),
            self_loops: Vec::new(),
            shortfall: 0,
            terminal,
        }
    }

    /// 发射前后令牌总数的变化量。
    pub fn delta(&self) -> i64 {
        self.produced.len() as i64 - self.consumed.len() as i64
    }
}

pub fn is_enabled(net: &Net, transition: TransitionId, marking: &Marking) -> bool {
    let Some(node) = net.transition(transition) else {
        return false;
    };
    if node.input_arcs.is_empty() {
        return false;
    }
    net.input_arcs(transition.into())
        .all(|(_, arc)| marking.count(arc.place()) >= arc.weight())
}

type Worklist = SmallVec<[(PlaceId, Weight); 4]>;

/// 去除自环配对之后的消耗与产生清单。
struct FirePlan {
    consume: Worklist,
    produce: Worklist,
    self_loops: Vec<PlaceId>,
}

impl FirePlan {
    fn for_transition(net: &Net, transition: TransitionId) -> Self {
        let mut produce = net
            .output_arcs(transition.into())
            .map(|(_, arc)| Some((arc.place(), arc.weight())))
            .collect::<SmallVec<[_; 4]>>();
        let mut consume = Worklist::new();
        let mut self_loops = Vec::new();

        for (_, arc) in net.input_arcs(transition.into()) {
            let partner = produce
                .iter_mut()
                .find(|slot| matches!(slot, Some((place, _)) if *place == arc.place()));
            match partner {
                Some(slot) => {
                    *slot = None;
                    self_loops.push(arc.place());
                }
                None => consume.push((arc.place(), arc.weight())),
            }
        }

        Self {
            consume,
            produce: produce.into_iter().flatten().collect(),
            self_loops,
        }
    }
}

/// 在 `marking` 上原地发射 `transition`，并按
/// before-fire → 消耗 → 产生 → after-fire 的顺序通知 `observer`。
pub fn fire(
    net: &Net,
    transition: TransitionId,
    marking: &mut Marking,
    observer: &mut dyn Observer,
) -> Result<FireOutcome, FireError> {
    let Some(node) = net.transition(transition) else {
        return Err(FireError::OutOfBounds(transition));
    };
    if !is_enabled(net, transition, marking) {
        return Err(FireError::NotEnabled(transition));
    }

    let plan = FirePlan::for_transition(net, transition);
    let mut outcome = FireOutcome::new(transition, node.terminal);
    outcome.self_loops = plan.self_loops;

    observer.on_event(&Event::BeforeFire { transition });

    for (place, weight) in plan.consume {
        for _ in 0..weight {
            match marking.take_one(place) {
                Some(token) => {
                    observer.on_event(&Event::TokenConsumed { token, place });
                    outcome.consumed.push((place, token));
                }
                None => outcome.shortfall += 1,
            }
        }
    }
    if outcome.shortfall > 0 {
        log::debug!(
            "{} ({}) consumed {} token(s) fewer than its arcs require",
            node.name,
            transition,
            outcome.shortfall
        );
    }

    for (place, weight) in plan.produce {
        for _ in 0..weight {
            let token = marking.put_one(place);
            observer.on_event(&Event::TokenProduced { token, place });
            outcome.produced.push((place, token));
        }
    }

    observer.on_event(&Event::AfterFire { transition });
    log::trace!("fired {} ({}): delta {}", node.name, transition, outcome.delta());
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::{NoopObserver, Recorder};
    use crate::net::NetBuilder;
    use crate::net::structure::{Arc, ArcDirection};

    #[test]
    fn transition_without_inputs_is_never_enabled() {
        let mut builder = NetBuilder::new();
        let out = builder.place("out", 5).unwrap();
        let t = builder.transition("spontaneous").unwrap();
        builder.output(t, out, 1).unwrap();
        let net = builder.build();

        assert!(!is_enabled(&net, t, &net.initial_marking()));
        assert!(!is_enabled(&net, t, &Marking::from_counts([(out, 100)])));
        assert_eq!(
            fire(&net, t, &mut net.initial_marking(), &mut NoopObserver),
            Err(FireError::NotEnabled(t))
        );
    }

    #[test]
    fn one_unsatisfied_arc_disables() {
        let mut builder = NetBuilder::new();
        let a = builder.place("a", 5).unwrap();
        let b = builder.place("b", 1).unwrap();
        let t = builder.transition("t").unwrap();
        builder.input(a, t, 1).unwrap();
        builder.input(b, t, 2).unwrap();
        let net = builder.build();

        let marking = net.initial_marking();
        assert!(!is_enabled(&net, t, &marking));
        assert!(is_enabled(&net, t, &Marking::from_counts([(a, 1), (b, 2)])));
    }

    #[test]
    fn enabling_check_is_pure() {
        let mut builder = NetBuilder::new();
        let p = builder.place("p", 2).unwrap();
        let t = builder.transition("t").unwrap();
        builder.input(p, t, 2).unwrap();
        let net = builder.build();

        let marking = net.initial_marking();
        let before = marking.tokens(p).to_vec();
        for _ in 0..10 {
            assert!(is_enabled(&net, t, &marking));
        }
        assert_eq!(marking.tokens(p), before.as_slice());
    }

    #[test]
    fn unknown_transition_is_out_of_bounds() {
        let net = NetBuilder::new().build();
        let ghost = TransitionId::new(3);
        assert!(!is_enabled(&net, ghost, &Marking::new()));
        assert_eq!(
            fire(&net, ghost, &mut Marking::new(), &mut NoopObserver),
            Err(FireError::OutOfBounds(ghost))
        );
    }

    #[test]
    fn weighted_firing_conserves_tokens() {
        let mut builder = NetBuilder::new();
        let a = builder.place("a", 3).unwrap();
        let b = builder.place("b", 0).unwrap();
        let c = builder.place("c", 0).unwrap();
        let t = builder.transition("t").unwrap();
        builder.input(a, t, 3).unwrap();
        builder.output(t, b, 2).unwrap();
        builder.output(t, c, 4).unwrap();
        let net = builder.build();

        let mut marking = net.initial_marking();
        let outcome = fire(&net, t, &mut marking, &mut NoopObserver).unwrap();

        assert_eq!(outcome.consumed.len(), 3);
        assert_eq!(outcome.produced.len(), 6);
        assert_eq!(outcome.delta(), 3);
        assert_eq!(marking.total(), 6);
        assert_eq!((marking.count(a), marking.count(b), marking.count(c)), (0, 2, 4));
    }

    #[test]
    fn self_loop_leaves_place_unchanged() {
        for weight in [1, 3] {
            let mut builder = NetBuilder::new();
            let guard = builder.place("guard", weight as u64).unwrap();
            let src = builder.place("src", 1).unwrap();
            let dst = builder.place("dst", 0).unwrap();
            let t = builder.transition("t").unwrap();
            builder.input(guard, t, weight).unwrap();
            builder.output(t, guard, weight).unwrap();
            builder.input(src, t, 1).unwrap();
            builder.output(t, dst, 1).unwrap();
            let net = builder.build();

            let mut marking = net.initial_marking();
            let before = marking.tokens(guard).to_vec();
            let outcome = fire(&net, t, &mut marking, &mut NoopObserver).unwrap();

            assert_eq!(outcome.self_loops, vec![guard]);
            assert_eq!(marking.count(guard), weight as u64);
            assert_eq!(marking.tokens(guard), before.as_slice(), "tokens keep their identity");
            assert_eq!((marking.count(src), marking.count(dst)), (0, 1));
        }
    }

    #[test]
    fn self_loop_still_requires_tokens_to_enable() {
        let mut builder = NetBuilder::new();
        let p = builder.place("p", 0).unwrap();
        let t = builder.transition("t").unwrap();
        builder.input(p, t, 1).unwrap();
        builder.output(t, p, 1).unwrap();
        let net = builder.build();

        assert!(!is_enabled(&net, t, &net.initial_marking()));
        assert!(is_enabled(&net, t, &Marking::from_counts([(p, 1)])));
    }

    #[test]
    fn consumption_is_best_effort() {
        let mut builder = NetBuilder::new();
        let p = builder.place("p", 1).unwrap();
        let out = builder.place("out", 0).unwrap();
        let t = builder.transition("t").unwrap();
        builder.input(p, t, 1).unwrap();
        builder.output(t, out, 1).unwrap();
        let mut net = builder.build();

        // 第二条同向弧绕过构造器的唯一性检查
        let extra = net
            .arcs
            .push(Arc::new(p, t, 1, ArcDirection::PlaceToTransition).unwrap());
        net.places[p].output_arcs.push(extra);
        net.transitions[t].input_arcs.push(extra);

        let mut marking = net.initial_marking();
        assert!(is_enabled(&net, t, &marking));
        let outcome = fire(&net, t, &mut marking, &mut NoopObserver).unwrap();

        assert_eq!(outcome.consumed.len(), 1);
        assert_eq!(outcome.shortfall, 1);
        assert_eq!(marking.count(p), 0);
        assert_eq!(marking.count(out), 1);
    }

    #[test]
    fn events_follow_fixed_order() {
        let mut builder = NetBuilder::new();
        let a = builder.place("a", 1).unwrap();
        let b = builder.place("b", 1).unwrap();
        let c = builder.place("c", 0).unwrap();
        let t = builder.transition("t").unwrap();
        builder.input(a, t, 1).unwrap();
        builder.input(b, t, 1).unwrap();
        builder.output(t, c, 2).unwrap();
        let net = builder.build();

        let mut recorder = Recorder::default();
        let mut marking = net.initial_marking();
        fire(&net, t, &mut marking, &mut recorder).unwrap();

        let kinds = recorder.events().iter().map(Event::kind).collect::<Vec<_>>();
        assert_eq!(
            kinds,
            vec![
                "before_fire",
                "token_consumed",
                "token_consumed",
                "token_produced",
                "token_produced",
                "after_fire"
            ]
        );
    }

    #[test]
    fn zero_weight_arcs_move_nothing() {
        let mut builder = NetBuilder::new();
        let a = builder.place("a", 0).unwrap();
        let b = builder.place("b", 0).unwrap();
        let t = builder.transition("t").unwrap();
        builder.input(a, t, 0).unwrap();
        builder.output(t, b, 0).unwrap();
        let net = builder.build();

        let mut marking = net.initial_marking();
        let outcome = fire(&net, t, &mut marking, &mut NoopObserver).unwrap();
        assert_eq!(outcome.delta(), 0);
        assert!(marking.is_empty());
    }
}
