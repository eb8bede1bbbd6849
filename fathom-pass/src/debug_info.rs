use fathom_base::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Records, for one rewrite, which source-dag nodes each destination
/// node was derived from. Pass ids are stable across ancestor clones, so
/// chaining archives across a pipeline reconstructs end-to-end lineage.
#[derive(Clone, Default, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct DebugInfoArchive {
    mappings: BTreeMap<i64, Vec<i64>>,
}

impl DebugInfoArchive {
    pub fn new() -> Self {
        DebugInfoArchive::default()
    }

    pub fn add_mapping(&mut self, dest: i64, srcs: Vec<i64>) {
        self.mappings.insert(dest, srcs);
    }

    pub fn mapping(&self, dest: i64) -> &[i64] {
        self.mappings.get(&dest).map_or(&[], |srcs| srcs.as_slice())
    }

    pub fn mappings(&self) -> &BTreeMap<i64, Vec<i64>> {
        &self.mappings
    }

    /// Chain two adjacent rewrites: map each destination of `rhs`
    /// through `lhs`'s sources.
    pub fn merge_adjacent(lhs: &DebugInfoArchive, rhs: &DebugInfoArchive) -> DebugInfoArchive {
        let mut result = DebugInfoArchive::new();
        for (dest, mids) in &rhs.mappings {
            let srcs = mids
                .iter()
                .flat_map(|mid| lhs.mapping(*mid).iter().copied())
                .collect();
            result.add_mapping(*dest, srcs);
        }
        result
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(rmp_serde::to_vec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(rmp_serde::from_slice(bytes)?)
    }
}
