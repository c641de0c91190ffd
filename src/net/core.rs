//! 网结构容器：拓扑遍历、初始标识与连通性诊断.
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::net::builder::{BuildError, NetBuilder};
use crate::net::firing::{self, FireError};
use crate::net::ids::{ArcId, NodeRef, PlaceId, TransitionId};
use crate::net::index_vec::IndexVec;
use crate::net::marking::Marking;
use crate::net::structure::{Arc, Place, Transition};
use crate::observer::NoopObserver;

/// Petri 网连通性诊断报告
#[derive(Debug, Clone, Default)]
pub struct DiagnosticReport {
    /// 孤立库所（无任何连接的弧）
    pub isolated_places: Vec<(PlaceId, String)>,
    /// 孤立变迁（无任何连接的弧）
    pub isolated_transitions: Vec<(TransitionId, String)>,
    pub warnings: Vec<String>,
    pub total_places: usize,
    pub total_transitions: usize,
}

impl DiagnosticReport {
    pub fn has_issues(&self) -> bool {
        !self.isolated_places.is_empty()
            || !self.isolated_transitions.is_empty()
            || !self.warnings.is_empty()
    }
}

/// 构造完成后不可变的 P/T 网。只能通过 [`NetBuilder`] 创建；反序列化同样经由构造器重建。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(try_from = "RawNet")]
pub struct Net {
    pub(crate) places: IndexVec<PlaceId, Place>,
    pub(crate) transitions: IndexVec<TransitionId, Transition>,
    pub(crate) arcs: IndexVec<ArcId, Arc>,
}

/// 未经校验的序列化形态。
#[derive(Deserialize)]
struct RawNet {
    places: IndexVec<PlaceId, Place>,
    transitions: IndexVec<TransitionId, Transition>,
    arcs: IndexVec<ArcId, Arc>,
}

impl TryFrom<RawNet> for Net {
    type Error = BuildError;

    fn try_from(raw: RawNet) -> Result<Self, Self::Error> {
        let mut builder = NetBuilder::new();
        for place in raw.places.iter() {
            builder.place(place.name.clone(), place.initial_tokens)?;
        }
        for transition in raw.transitions.iter() {
            if transition.terminal {
                builder.terminal_transition(transition.name.clone())?;
            } else {
                builder.transition(transition.name.clone())?;
            }
        }
        for arc in raw.arcs.iter() {
            builder.insert_arc(*arc)?;
        }
        let net = builder.build();

        // 节点上记录的弧表只是弧表的索引，必须与重建结果一致
        for (id, place) in raw.places.iter_enumerated() {
            let rebuilt = &net.places[id];
            if place.input_arcs != rebuilt.input_arcs || place.output_arcs != rebuilt.output_arcs {
                return Err(BuildError::ArcListMismatch(id.into()));
            }
        }
        for (id, transition) in raw.transitions.iter_enumerated() {
            let rebuilt = &net.transitions[id];
            if transition.input_arcs != rebuilt.input_arcs
                || transition.output_arcs != rebuilt.output_arcs
            {
                return Err(BuildError::ArcListMismatch(id.into()));
            }
        }
        Ok(net)
    }
}

impl Net {
    pub fn places(&self) -> &IndexVec<PlaceId, Place> {
        &self.places
    }

    pub fn transitions(&self) -> &IndexVec<TransitionId, Transition> {
        &self.transitions
    }

    pub fn arcs(&self) -> &IndexVec<ArcId, Arc> {
        &self.arcs
    }

    pub fn place(&self, place: PlaceId) -> Option<&Place> {
        self.places.get(place)
    }

    pub fn transition(&self, transition: TransitionId) -> Option<&Transition> {
        self.transitions.get(transition)
    }

    pub fn arc(&self, arc: ArcId) -> Option<&Arc> {
        self.arcs.get(arc)
    }

    pub fn place_by_name(&self, name: &str) -> Option<PlaceId> {
        self.places.position(|place| place.name == name)
    }

    pub fn transition_by_name(&self, name: &str) -> Option<TransitionId> {
        self.transitions.position(|transition| transition.name == name)
    }

    pub fn places_len(&self) -> usize {
        self.places.len()
    }

    pub fn transitions_len(&self) -> usize {
        self.transitions.len()
    }

    /// 以 `node` 为目标的弧。未知节点返回空序列。
    pub fn input_arcs(&self, node: NodeRef) -> impl Iterator<Item = (ArcId, &Arc)> + '_ {
        let ids = match node {
            NodeRef::Place(place) => self.places.get(place).map(|p| p.input_arcs.as_slice()),
            NodeRef::Transition(transition) => self
                .transitions
                .get(transition)
                .map(|t| t.input_arcs.as_slice()),
        };
        self.resolve_arcs(ids.unwrap_or_default())
    }

    /// 以 `node` 为源的弧。未知节点返回空序列。
    pub fn output_arcs(&self, node: NodeRef) -> impl Iterator<Item = (ArcId, &Arc)> + '_ {
        let ids = match node {
            NodeRef::Place(place) => self.places.get(place).map(|p| p.output_arcs.as_slice()),
            NodeRef::Transition(transition) => self
                .transitions
                .get(transition)
                .map(|t| t.output_arcs.as_slice()),
        };
        self.resolve_arcs(ids.unwrap_or_default())
    }

    fn resolve_arcs<'a>(&'a self, ids: &'a [ArcId]) -> impl Iterator<Item = (ArcId, &'a Arc)> + 'a {
        ids.iter().map(move |id| (*id, &self.arcs[*id]))
    }

    pub fn start_places(&self) -> Vec<PlaceId> {
        self.places
            .iter_enumerated()
            .filter(|(_, place)| place.is_start())
            .map(|(id, _)| id)
            .collect()
    }

    pub fn end_places(&self) -> Vec<PlaceId> {
        self.places
            .iter_enumerated()
            .filter(|(_, place)| place.is_end())
            .map(|(id, _)| id)
            .collect()
    }

    pub fn initial_marking(&self) -> Marking {
        Marking::from_counts(
            self.places
                .iter_enumerated()
                .map(|(id, place)| (id, place.initial_tokens)),
        )
    }

    pub fn is_enabled(&self, transition: TransitionId, marking: &Marking) -> bool {
        firing::is_enabled(self, transition, marking)
    }

    /// 按标识符顺序返回可发射的迁移；引擎会在此基础上打乱顺序。
    pub fn enabled_transitions(&self, marking: &Marking) -> Vec<TransitionId> {
        self.transitions
            .indices()
            .filter(|transition| self.is_enabled(*transition, marking))
            .collect()
    }

    /// 纯函数版本的发射：返回新标识，原标识保持不变。
    pub fn fire_transition(
        &self,
        marking: &Marking,
        transition: TransitionId,
    ) -> Result<Marking, FireError> {
        let mut next = marking.clone();
        firing::fire(self, transition, &mut next, &mut NoopObserver)?;
        Ok(next)
    }

    pub fn to_dot(&self, marking: &Marking) -> String {
        crate::net::dot::to_dot(self, marking)
    }

    pub fn write_dot<P: AsRef<Path>>(&self, path: P, marking: &Marking) -> std::io::Result<()> {
        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.to_dot(marking))
    }

    /// 诊断信息：检测 Petri 网中的孤立节点和永远无法触发的迁移
    pub fn diagnose_connectivity(&self) -> DiagnosticReport {
        let mut isolated_places = Vec::new();
        let mut isolated_transitions = Vec::new();
        let mut warnings = Vec::new();

        for (place_id, place) in self.places.iter_enumerated() {
            if place.is_start() && place.is_end() {
                isolated_places.push((place_id, place.name.clone()));
            } else if place.is_start() && place.initial_tokens == 0 {
                warnings.push(format!(
                    "库所 '{}' ({}) 无输入弧且初始标记为 0，永远不会获得令牌",
                    place.name, place_id
                ));
            }
        }

        for (trans_id, trans) in self.transitions.iter_enumerated() {
            let has_preset = !trans.input_arcs.is_empty();
            let has_postset = !trans.output_arcs.is_empty();

            if !has_preset && !has_postset {
                isolated_transitions.push((trans_id, trans.name.clone()));
            } else if !has_preset {
                // 无输入弧的迁移按约定永远不可发射
                warnings.push(format!(
                    "变迁 '{}' ({}) 无前置库所，永远无法触发",
                    trans.name, trans_id
                ));
            }
        }

        DiagnosticReport {
            isolated_places,
            isolated_transitions,
            warnings,
            total_places: self.places_len(),
            total_transitions: self.transitions_len(),
        }
    }

    /// 打印诊断报告到日志
    pub fn log_diagnostics(&self) {
        let report = self.diagnose_connectivity();

        if report.has_issues() {
            log::warn!(
                "连通性诊断: {} 个库所, {} 个变迁",
                report.total_places,
                report.total_transitions
            );
            for (id, name) in &report.isolated_places {
                log::warn!("  孤立库所 [{}] {}", id, name);
            }
            for (id, name) in &report.isolated_transitions {
                log::warn!("  孤立变迁 [{}] {}", id, name);
            }
            for warning in &report.warnings {
                log::warn!("  - {}", warning);
            }
        } else {
            log::info!("Petri 网连通性检查通过，无孤立节点");
        }
    }
}
