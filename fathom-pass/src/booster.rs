use fathom_base::{Level, LevelInfo};
use fathom_ct::{CtKind, CtOp, CtProgram};
use fathom_dag::{Dag, NodeId};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Greedy bootstrap placement. A node's score counts the rescale-weighted
/// paths that would run out of levels through it: `bwd[n][l]` paths
/// arrive at `n` having consumed `l` levels, `fwd[n][l]` leave toward
/// outputs consuming `l` more, and pairing them against the level budget
/// scores the node. Each round bootstraps the argmax and recomputes with
/// bootstrapped nodes excluded, until no positive score remains.
///
/// Path counts use 128-bit integers and saturate instead of failing.
pub struct FheBoosterPass {
    usable_levels: Level,
}

type Paths = BTreeMap<NodeId, Vec<i128>>;

fn saturating_add(a: i128, b: i128) -> i128 {
    a.checked_add(b).unwrap_or(i128::MAX)
}

fn is_rescale(dag: &Dag<CtOp>, id: NodeId) -> bool {
    matches!(dag.value(id).kind(), CtKind::Rescale)
}

fn backward_counts(dag: &Dag<CtOp>, usable: usize, boosted: &BTreeSet<NodeId>) -> Paths {
    let mut bwd: Paths = Paths::new();
    for id in dag.topological_order() {
        let mut counts = vec![0i128; usable];
        if !boosted.contains(&id) {
            if is_rescale(dag, id) {
                counts[0] = 1;
            }
            let mut parents = dag.parents(id).to_vec();
            parents.sort_unstable();
            parents.dedup();
            for lvl in 0..usable {
                for parent in &parents {
                    let from = &bwd[parent];
                    if is_rescale(dag, id) {
                        if lvl > 0 {
                            counts[lvl] = saturating_add(counts[lvl], from[lvl - 1]);
                        }
                    } else {
                        counts[lvl] = saturating_add(counts[lvl], from[lvl]);
                    }
                }
            }
        }
        bwd.insert(id, counts);
    }
    bwd
}

fn forward_counts(dag: &Dag<CtOp>, usable: usize, boosted: &BTreeSet<NodeId>) -> Paths {
    let mut fwd: Paths = Paths::new();
    for id in dag.reverse_topological_order() {
        let mut counts = vec![0i128; usable];
        if !boosted.contains(&id) {
            let any_rescale_child = dag
                .children(id)
                .iter()
                .any(|child| is_rescale(dag, *child));
            if any_rescale_child {
                counts[0] = 1;
            }
            for lvl in 0..usable {
                for child in dag.children(id) {
                    let from = &fwd[child];
                    if is_rescale(dag, id) {
                        if lvl > 0 {
                            counts[lvl] = saturating_add(counts[lvl], from[lvl - 1]);
                        }
                    } else if !(lvl == 0 && any_rescale_child) {
                        counts[lvl] = saturating_add(counts[lvl], from[lvl]);
                    }
                }
            }
        }
        fwd.insert(id, counts);
    }
    fwd
}

fn path_scores(
    dag: &Dag<CtOp>,
    usable: usize,
    boosted: &BTreeSet<NodeId>,
    bwd: &Paths,
    fwd: &Paths,
) -> BTreeMap<NodeId, i128> {
    let mut scores = BTreeMap::new();
    for id in dag.ids() {
        let mut score = 0i128;
        if !boosted.contains(&id) {
            for lvl in 0..usable {
                let product = bwd[&id][lvl]
                    .checked_mul(fwd[&id][usable - 1 - lvl])
                    .unwrap_or(i128::MAX);
                score = saturating_add(score, product);
            }
        }
        scores.insert(id, score);
    }
    scores
}

impl FheBoosterPass {
    pub fn new(usable_levels: Level) -> Self {
        FheBoosterPass { usable_levels }
    }

    pub fn run(&self, program: &CtProgram) -> CtProgram {
        let mut out = program.dag().clone_from_ancestor();
        let usable = self.usable_levels.value() as usize;
        let mut boosted: BTreeSet<NodeId> = BTreeSet::new();
        loop {
            let bwd = backward_counts(&out, usable, &boosted);
            let fwd = forward_counts(&out, usable, &boosted);
            let scores = path_scores(&out, usable, &boosted, &bwd, &fwd);
            // Ascending id iteration keeps ties deterministic.
            let best = scores
                .iter()
                .fold(None, |best: Option<(NodeId, i128)>, (id, score)| match best {
                    Some((_, best_score)) if best_score >= *score => best,
                    _ => Some((*id, *score)),
                });
            let Some((id, score)) = best else { break };
            if score <= 0 {
                break;
            }
            boosted.insert(id);
        }
        debug!(target: "fathom", count = boosted.len(), "placed bootstraps");
        for id in boosted {
            let children = out.children(id).to_vec();
            let log_scale = out.value(id).log_scale();
            let bootstrap = out.add_node(
                CtOp::new(
                    CtKind::Bootstrap,
                    LevelInfo::new(self.usable_levels, log_scale),
                ),
                &[id],
            );
            for child in children {
                out.remove_edge(id, child);
                out.add_edge(bootstrap, child);
            }
        }
        CtProgram::with_parts(*program.context(), out, program.chunk_dict().clone())
    }
}
