//! 标识：叠加在不可变网结构之上的令牌分布。
//!
//! 同一个 [`Net`] 可以同时被多个 `Marking` 驱动，互不干扰；网结构本身在执行期间从不改变。
use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use thiserror::Error;

use crate::net::Net;
use crate::net::ids::{PlaceId, TokenId};
use crate::net::structure::Weight;

type TokenBag = SmallVec<[Token; 4]>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MarkingError {
    #[error("marking references place {0} which does not belong to the net")]
    UnknownPlace(PlaceId),
}

/// 无负载的令牌，仅携带身份。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Token {
    pub id: TokenId,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.id, f)
    }
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct Marking {
    places: IndexMap<PlaceId, TokenBag>,
    next_token: u64,
}

impl Marking {
    pub fn new() -> Self {
        Self::default()
    }

    /// 以 `(库所, 令牌数)` 序列构造标识，每个令牌分配新身份。
    pub fn from_counts<I>(counts: I) -> Self
    where
        I: IntoIterator<Item = (PlaceId, Weight)>,
    {
        let mut marking = Self::new();
        for (place, count) in counts {
            marking.put(place, count);
        }
        marking
    }

    /// 缺少条目的库所视为 0 个令牌。
    pub fn count(&self, place: PlaceId) -> Weight {
        self.places
            .get(&place)
            .map_or(0, |bag| bag.len() as Weight)
    }

    pub fn tokens(&self, place: PlaceId) -> &[Token] {
        self.places
            .get(&place)
            .map(|bag| bag.as_slice())
            .unwrap_or(&[])
    }

    pub fn total(&self) -> Weight {
        self.places.values().map(|bag| bag.len() as Weight).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    /// 有条目的库所及其令牌数（包括已被取空的库所）。
    pub fn places(&self) -> impl Iterator<Item = (PlaceId, Weight)> + '_ {
        self.places
            .iter()
            .map(|(place, bag)| (*place, bag.len() as Weight))
    }

    pub fn put_one(&mut self, place: PlaceId) -> Token {
        let token = Token {
            id: TokenId(self.next_token),
        };
        self.next_token += 1;
        self.places.entry(place).or_default().push(token);
        token
    }

    pub fn put(&mut self, place: PlaceId, count: Weight) -> Vec<Token> {
        (0..count).map(|_| self.put_one(place)).collect()
    }

    /// 从库所中移除任意一个令牌；库所为空时返回 `None`，不视为错误。
    pub fn take_one(&mut self, place: PlaceId) -> Option<Token> {
        self.places.get_mut(&place).and_then(|bag| bag.pop())
    }

    pub fn validate_for(&self, net: &Net) -> Result<(), MarkingError> {
        match self.places.keys().find(|place| net.place(**place).is_none()) {
            Some(place) => Err(MarkingError::UnknownPlace(*place)),
            None => Ok(()),
        }
    }

    /// 按网中库所顺序给出 `(名称, 令牌数)`，缺少条目的库所记为 0。
    pub fn summary(&self, net: &Net) -> Vec<(String, Weight)> {
        net.places()
            .iter_enumerated()
            .map(|(id, place)| (place.name.clone(), self.count(id)))
            .collect()
    }

    pub fn display<'a>(&'a self, net: &'a Net) -> MarkingDisplay<'a> {
        MarkingDisplay { marking: self, net }
    }
}

impl fmt::Debug for Marking {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.places()).finish()
    }
}

/// 带库所名称的标识渲染，例如 `{p1: 0, p2: 1}`。
pub struct MarkingDisplay<'a> {
    marking: &'a Marking,
    net: &'a Net,
}

impl fmt::Display for MarkingDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (idx, (name, count)) in self.marking.summary(self.net).into_iter().enumerate() {
            if idx > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", name, count)?;
        }
        write!(f, "}}")
    }
}
