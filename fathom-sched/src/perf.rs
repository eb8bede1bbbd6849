use fathom_ct::{CtKind, CtProgram};
use std::collections::BTreeMap;

// A coarse runtime model for lowered programs. One time unit is roughly
// 2^16 CPU modular multiplies; key-switching costs follow the CraterLake
// accelerator's published per-level polynomial.

const CHUNK_MODULAR_MULTIPLIES_PER_SECOND: f64 = (1u64 << (30 - 16)) as f64;
const BOOTSTRAP_SECONDS: f64 = 17.0;

/// Estimated wall-clock seconds for one ciphertext op.
pub fn execution_time(kind: &CtKind, level: i64) -> f64 {
    match kind {
        CtKind::Input { .. } | CtKind::Output { .. } => 0.0,
        _ if kind.requires_keyswitching() => {
            (3 * level * level + (4 + 6 * 8) * level) as f64
                / CHUNK_MODULAR_MULTIPLIES_PER_SECOND
        }
        CtKind::Bootstrap => BOOTSTRAP_SECONDS,
        _ => level as f64 / CHUNK_MODULAR_MULTIPLIES_PER_SECOND,
    }
}

/// Aggregate runtime estimate with a per-op-kind breakdown and
/// per-level op counts for the expensive kinds.
#[derive(Clone, Debug, Default)]
pub struct PerfEstimate {
    pub total_seconds: f64,
    pub bootstrap_seconds: f64,
    pub breakdown: BTreeMap<&'static str, f64>,
    pub counts_by_level: BTreeMap<(&'static str, i64), usize>,
}

impl PerfEstimate {
    pub fn bootstrap_share(&self) -> f64 {
        if self.total_seconds == 0.0 {
            0.0
        } else {
            self.bootstrap_seconds / self.total_seconds
        }
    }
}

pub fn estimate_program(program: &CtProgram) -> PerfEstimate {
    let mut estimate = PerfEstimate::default();
    let dag = program.dag();
    for id in dag.topological_order() {
        let op = dag.value(id);
        let time = execution_time(op.kind(), op.level().value());
        estimate.total_seconds += time;
        *estimate.breakdown.entry(op.kind().type_name()).or_insert(0.0) += time;
        if matches!(op.kind(), CtKind::Bootstrap) {
            estimate.bootstrap_seconds += time;
        }
        if matches!(
            op.kind(),
            CtKind::MulCC | CtKind::MulCP { .. } | CtKind::Rotate { .. }
        ) {
            *estimate
                .counts_by_level
                .entry((op.kind().type_name(), op.level().value()))
                .or_insert(0) += 1;
        }
    }
    estimate
}
