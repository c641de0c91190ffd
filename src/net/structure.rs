//! P/T 网静态结构元素：库所、迁移与带权弧。
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::net::builder::BuildError;
use crate::net::ids::{ArcId, PlaceId, TransitionId};

pub type Weight = u64;

#[derive(Clone, Serialize, Deserialize, PartialEq, Eq, Hash, Debug)]
pub struct Place {
    pub name: String,
    /// 初始标识中此库所的令牌数。
    pub initial_tokens: Weight,
    pub input_arcs: Vec<ArcId>,
    pub output_arcs: Vec<ArcId>,
}

impl Place {
    pub fn new(name: impl Into<String>, initial_tokens: Weight) -> Self {
        Self {
            name: name.into(),
            initial_tokens,
            input_arcs: Vec::new(),
            output_arcs: Vec::new(),
        }
    }

    /// 没有输入弧的库所是起始库所。
    pub fn is_start(&self) -> bool {
        self.input_arcs.is_empty()
    }

    /// 没有输出弧的库所是终止库所。
    pub fn is_end(&self) -> bool {
        self.output_arcs.is_empty()
    }
}

#[derive(Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Transition {
    pub name: String,
    /// 发射后宣告整个网运行结束。
    pub terminal: bool,
    pub input_arcs: Vec<ArcId>,
    pub output_arcs: Vec<ArcId>,
}

impl Transition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            terminal: false,
            input_arcs: Vec::new(),
            output_arcs: Vec::new(),
        }
    }

    pub fn new_terminal(name: impl Into<String>) -> Self {
        Self {
            terminal: true,
            ..Self::new(name)
        }
    }
}

impl fmt::Debug for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut tuple = f.debug_tuple("Transition");
        tuple.field(&self.name);
        if self.terminal {
            tuple.field(&"terminal");
        }
        tuple.finish()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ArcDirection {
    /// 输入弧：迁移从库所消耗令牌。
    PlaceToTransition,
    /// 输出弧：迁移向库所产生令牌。
    TransitionToPlace,
}

#[derive(Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Arc {
    place: PlaceId,
    transition: TransitionId,
    weight: Weight,
    direction: ArcDirection,
}

impl Arc {
    pub fn new(
        place: PlaceId,
        transition: TransitionId,
        weight: i64,
        direction: ArcDirection,
    ) -> Result<Self, BuildError> {
        let mut arc = Self {
            place,
            transition,
            weight: 1,
            direction,
        };
        arc.set_weight(weight)?;
        Ok(arc)
    }

    /// 权值为 0 的弧是合法的退化弧：既不要求也不移动令牌。
    pub fn set_weight(&mut self, weight: i64) -> Result<(), BuildError> {
        self.weight = Weight::try_from(weight).map_err(|_| BuildError::InvalidWeight(weight))?;
        Ok(())
    }

    pub fn place(&self) -> PlaceId {
        self.place
    }

    pub fn transition(&self) -> TransitionId {
        self.transition
    }

    pub fn weight(&self) -> Weight {
        self.weight
    }

    pub fn direction(&self) -> ArcDirection {
        self.direction
    }

    pub fn is_input(&self) -> bool {
        self.direction == ArcDirection::PlaceToTransition
    }
}

impl fmt::Debug for Arc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Arc")
            .field("place", &self.place)
            .field("transition", &self.transition)
            .field("weight", &self.weight)
            .field("direction", &self.direction)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_weight_is_rejected() {
        let err = Arc::new(
            PlaceId::new(0),
            TransitionId::new(0),
            -1,
            ArcDirection::PlaceToTransition,
        )
        .unwrap_err();
        assert!(matches!(err, BuildError::InvalidWeight(-1)));
    }

    #[test]
    fn zero_weight_is_accepted() {
        let mut arc = Arc::new(
            PlaceId::new(0),
            TransitionId::new(0),
            3,
            ArcDirection::TransitionToPlace,
        )
        .unwrap();
        arc.set_weight(0).unwrap();
        assert_eq!(arc.weight(), 0);

        assert!(arc.set_weight(-5).is_err());
        assert_eq!(arc.weight(), 0, "failed update must leave the weight untouched");
    }
}
