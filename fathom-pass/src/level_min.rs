use fathom_base::{Level, LevelInfo};
use fathom_ct::{CtKind, CtProgram};
use fathom_dag::{Dag, NodeId};

/// Push every node's level down to the minimum its consumers allow:
/// walking in reverse topological order, a node needs the maximum of its
/// children's levels, one more than any rescale child, and outputs pin
/// to level 1. Children that are bootstraps are ignored; a node feeding
/// nothing else floors at level 1.
pub struct LevelMinimizationPass;

fn min_level(dag: &Dag<fathom_ct::CtOp>, id: NodeId) -> Level {
    if matches!(dag.value(id).kind(), CtKind::Output { .. }) {
        return Level::new(1);
    }
    let mut distinct = dag.children(id).to_vec();
    distinct.sort_unstable();
    distinct.dedup();
    let levels: Vec<Level> = distinct
        .iter()
        .filter(|child| !matches!(dag.value(**child).kind(), CtKind::Bootstrap))
        .map(|child| {
            let level = dag.value(*child).level();
            if matches!(dag.value(*child).kind(), CtKind::Rescale) {
                Level::new(level.value() + 1)
            } else {
                level
            }
        })
        .collect();
    levels.into_iter().max().unwrap_or(Level::new(1))
}

impl LevelMinimizationPass {
    pub fn run(&self, program: &CtProgram) -> CtProgram {
        let mut out = program.dag().clone_from_ancestor();
        for id in out.reverse_topological_order() {
            let level = min_level(&out, id);
            let log_scale = out.value(id).log_scale();
            out.value_mut(id)
                .set_level_info(LevelInfo::new(level, log_scale));
        }
        CtProgram::with_parts(*program.context(), out, program.chunk_dict().clone())
    }
}
