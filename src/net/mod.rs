//! # Petri 网核心定义（Place/Transition Net）
//!
//! 网由库所集合 `P`、迁移集合 `T` 以及带非负整数权值的弧组成，每条弧恰好连接一个库所和一个迁移：
//! `place -> transition` 为输入弧，`transition -> place` 为输出弧。
//! 结构由 [`NetBuilder`] 构造，构造完成后不可变；执行期间唯一可变的状态是 [`Marking`]。
//!
//! * 迁移 `t` **可发射** 当且仅当 `t` 至少有一条输入弧，且每条输入弧 `(p, t, w)` 满足 `M[p] ≥ w`；
//! * 迁移 **发射** 时，同一库所上的输入/输出弧两两抵消（自环），
//!   其余输入弧移除 `w` 个令牌，其余输出弧产生 `w` 个新令牌。
//!
//! ## 示例
//!
//! ```rust
//! use pn_engine::net::*;
//!
//! let mut builder = NetBuilder::new();
//! let p0 = builder.place("p0", 1).unwrap();
//! let p1 = builder.place("p1", 0).unwrap();
//! let t0 = builder.transition("t0").unwrap();
//! builder.input(p0, t0, 1).unwrap();
//! builder.output(t0, p1, 1).unwrap();
//! let net = builder.build();
//!
//! let marking = net.initial_marking();
//! assert_eq!(net.enabled_transitions(&marking), vec![t0]);
//! let next = net.fire_transition(&marking, t0).unwrap();
//! assert_eq!(next.count(p0), 0);
//! assert_eq!(next.count(p1), 1);
//! ```

pub mod builder;
pub mod core;
pub mod dot;
pub mod firing;
pub mod ids;
pub mod index_vec;
pub mod marking;
pub mod structure;

pub use builder::{BuildError, NetBuilder};
pub use self::core::{DiagnosticReport, Net};
pub use firing::{FireError, FireOutcome, fire, is_enabled};
pub use ids::{ArcId, NodeRef, PlaceId, TokenId, TransitionId};
pub use index_vec::{Idx, IndexVec};
pub use marking::{Marking, MarkingError, Token};
pub use structure::{Arc, ArcDirection, Place, Transition, Weight};
