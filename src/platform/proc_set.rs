//! 紧凑资源集合
//!
//! 用有序、互不相交的闭区间表示一组资源 id，文本形式为 `"0-3 7 9-10"`。

use super::id::ResourceId;
use crate::sim::SimError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// 资源 id 集合（闭区间列表，区间之间至少间隔 1）
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ProcSet {
    ranges: Vec<(u32, u32)>,
}

impl ProcSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// 加入一个资源 id
    pub fn insert(&mut self, id: ResourceId) {
        self.insert_range(id.0, id.0);
    }

    /// 并入另一个集合
    pub fn union(&mut self, other: &ProcSet) {
        for &(lo, hi) in &other.ranges {
            self.insert_range(lo, hi);
        }
    }

    pub fn contains(&self, id: ResourceId) -> bool {
        self.ranges.iter().any(|&(lo, hi)| lo <= id.0 && id.0 <= hi)
    }

    pub fn len(&self) -> usize {
        self.ranges
            .iter()
            .map(|&(lo, hi)| (hi - lo) as usize + 1)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// 按升序遍历所有资源 id
    pub fn iter(&self) -> impl Iterator<Item = ResourceId> + '_ {
        self.ranges
            .iter()
            .flat_map(|&(lo, hi)| (lo..=hi).map(ResourceId))
    }

    fn insert_range(&mut self, lo: u32, hi: u32) {
        let mut lo = lo;
        let mut hi = hi;
        let mut merged = Vec::with_capacity(self.ranges.len() + 1);
        let mut placed = false;
        for &(a, b) in &self.ranges {
            if b.saturating_add(1) < lo {
                merged.push((a, b));
            } else if hi.saturating_add(1) < a {
                if !placed {
                    merged.push((lo, hi));
                    placed = true;
                }
                merged.push((a, b));
            } else {
                lo = lo.min(a);
                hi = hi.max(b);
            }
        }
        if !placed {
            merged.push((lo, hi));
        }
        self.ranges = merged;
    }
}

impl FromIterator<ResourceId> for ProcSet {
    fn from_iter<I: IntoIterator<Item = ResourceId>>(iter: I) -> Self {
        let mut set = ProcSet::new();
        for id in iter {
            set.insert(id);
        }
        set
    }
}

impl fmt::Display for ProcSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, &(lo, hi)) in self.ranges.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            if lo == hi {
                write!(f, "{lo}")?;
            } else {
                write!(f, "{lo}-{hi}")?;
            }
        }
        Ok(())
    }
}

impl FromStr for ProcSet {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parse = |part: &str| {
            part.trim()
                .parse::<u32>()
                .map_err(|_| SimError::malformed(format!("bad resource id `{part}` in `{s}`")))
        };
        let mut set = ProcSet::new();
        for token in s.split_whitespace() {
            match token.split_once('-') {
                Some((lo, hi)) => {
                    let (lo, hi) = (parse(lo)?, parse(hi)?);
                    if lo > hi {
                        return Err(SimError::malformed(format!("reversed range `{token}`")));
                    }
                    set.insert_range(lo, hi);
                }
                None => set.insert_range(parse(token)?, parse(token)?),
            }
        }
        Ok(set)
    }
}

impl Serialize for ProcSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ProcSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
