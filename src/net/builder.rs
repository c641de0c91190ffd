//! 网的构造器。构造期错误都在这里同步报告，`build` 之后网不再变化。
use thiserror::Error;

use crate::net::Net;
use crate::net::ids::{ArcId, NodeRef, PlaceId, TransitionId};
use crate::net::structure::{Arc, ArcDirection, Place, Transition, Weight};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BuildError {
    #[error("arc must connect a place and a transition, got {from} -> {to}")]
    InvalidConnection { from: NodeRef, to: NodeRef },
    #[error("arc weight must be non-negative, got {0}")]
    InvalidWeight(i64),
    #[error("an arc {from} -> {to} already exists")]
    DuplicateArc { from: NodeRef, to: NodeRef },
    #[error("a {kind} named '{name}' already exists")]
    DuplicateId { kind: &'static str, name: String },
    #[error("node {0} does not exist")]
    UnknownNode(NodeRef),
    #[error("no {kind} named '{name}'")]
    UnknownName { kind: &'static str, name: String },
    #[error("arc lists of {0} disagree with the arc table")]
    ArcListMismatch(NodeRef),
}

#[derive(Debug, Default)]
pub struct NetBuilder {
    net: Net,
}

impl NetBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn place(&mut self, name: impl Into<String>, tokens: Weight) -> Result<PlaceId, BuildError> {
        let name = name.into();
        if self.net.place_by_name(&name).is_some() {
            return Err(BuildError::DuplicateId {
                kind: "place",
                name,
            });
        }
        Ok(self.net.places.push(Place::new(name, tokens)))
    }

    pub fn transition(&mut self, name: impl Into<String>) -> Result<TransitionId, BuildError> {
        self.add_transition(Transition::new(name))
    }

    /// 发射后结束整个工作流的迁移。
    pub fn terminal_transition(
        &mut self,
        name: impl Into<String>,
    ) -> Result<TransitionId, BuildError> {
        self.add_transition(Transition::new_terminal(name))
    }

    fn add_transition(&mut self, transition: Transition) -> Result<TransitionId, BuildError> {
        if self.net.transition_by_name(&transition.name).is_some() {
            return Err(BuildError::DuplicateId {
                kind: "transition",
                name: transition.name,
            });
        }
        Ok(self.net.transitions.push(transition))
    }

    /// 输入弧: place -> transition
    pub fn input(
        &mut self,
        place: PlaceId,
        transition: TransitionId,
        weight: i64,
    ) -> Result<ArcId, BuildError> {
        self.connect(place.into(), transition.into(), weight)
    }

    /// 输出弧: transition -> place
    pub fn output(
        &mut self,
        transition: TransitionId,
        place: PlaceId,
        weight: i64,
    ) -> Result<ArcId, BuildError> {
        self.connect(transition.into(), place.into(), weight)
    }

    /// 按名称连接两个节点；名称先在库所中查找，再在迁移中查找。
    pub fn connect_named(
        &mut self,
        source: &str,
        target: &str,
        weight: i64,
    ) -> Result<ArcId, BuildError> {
        let source = self.resolve(source)?;
        let target = self.resolve(target)?;
        self.connect(source, target, weight)
    }

    fn resolve(&self, name: &str) -> Result<NodeRef, BuildError> {
        self.net
            .place_by_name(name)
            .map(NodeRef::Place)
            .or_else(|| self.net.transition_by_name(name).map(NodeRef::Transition))
            .ok_or_else(|| BuildError::UnknownName {
                kind: "node",
                name: name.to_string(),
            })
    }

    pub fn connect(
        &mut self,
        source: NodeRef,
        target: NodeRef,
        weight: i64,
    ) -> Result<ArcId, BuildError> {
        let (place, transition, direction) = match (source, target) {
            (NodeRef::Place(p), NodeRef::Transition(t)) => (p, t, ArcDirection::PlaceToTransition),
            (NodeRef::Transition(t), NodeRef::Place(p)) => (p, t, ArcDirection::TransitionToPlace),
            _ => {
                return Err(BuildError::InvalidConnection {
                    from: source,
                    to: target,
                });
            }
        };
        let arc = Arc::new(place, transition, weight, direction)?;
        self.insert_arc(arc)
    }

    /// 插入一条已校验权值的弧，检查端点存在且不重复。
    pub(crate) fn insert_arc(&mut self, arc: Arc) -> Result<ArcId, BuildError> {
        let (place, transition, direction) = (arc.place(), arc.transition(), arc.direction());
        let (source, target): (NodeRef, NodeRef) = match direction {
            ArcDirection::PlaceToTransition => (place.into(), transition.into()),
            ArcDirection::TransitionToPlace => (transition.into(), place.into()),
        };
        if !self.net.places.contains(place) {
            return Err(BuildError::UnknownNode(place.into()));
        }
        if !self.net.transitions.contains(transition) {
            return Err(BuildError::UnknownNode(transition.into()));
        }

        let duplicate = self.net.output_arcs(source).any(|(_, existing)| {
            existing.place() == place && existing.transition() == transition
        });
        if duplicate {
            return Err(BuildError::DuplicateArc {
                from: source,
                to: target,
            });
        }

        let id = self.net.arcs.push(arc);
        match direction {
            ArcDirection::PlaceToTransition => {
                self.net.places[place].output_arcs.push(id);
                self.net.transitions[transition].input_arcs.push(id);
            }
            ArcDirection::TransitionToPlace => {
                self.net.transitions[transition].output_arcs.push(id);
                self.net.places[place].input_arcs.push(id);
            }
        }
        Ok(id)
    }

    pub fn build(self) -> Net {
        log::debug!(
            "built net with {} places, {} transitions, {} arcs",
            self.net.places_len(),
            self.net.transitions_len(),
            self.net.arcs().len()
        );
        self.net
    }
}
