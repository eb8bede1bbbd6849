use fathom_ct::{CtKind, CtProgram};
use fathom_dag::NodeId;
use tracing::debug;

fn other_parent_of(program: &CtProgram, parent: NodeId, child: NodeId) -> NodeId {
    let others: Vec<NodeId> = program
        .dag()
        .parents(child)
        .iter()
        .copied()
        .filter(|p| *p != parent)
        .collect();
    assert!(others.len() == 1, "binary op with one non-zero parent");
    others[0]
}

// Ops fed by a zero fold: rotates and multiplies collapse onto the zero,
// adds lose the zero edge. Additive plaintext ops and outputs stay put.
fn prune_descendants(program: &mut CtProgram, zero: NodeId) {
    loop {
        let children: Vec<NodeId> = {
            let mut distinct = program.dag().children(zero).to_vec();
            distinct.sort_unstable();
            distinct.dedup();
            distinct
        };
        for child in &children {
            let child = *child;
            if !program.dag().contains(child) {
                continue;
            }
            match program.dag().value(child).kind() {
                CtKind::Rotate { .. } | CtKind::MulCP { .. } | CtKind::MulCS { .. } => {
                    program.dag_mut().remove_node(child);
                }
                CtKind::MulCC => {
                    let other = other_parent_of(program, zero, child);
                    program.dag_mut().remove_edge(other, child);
                    program.dag_mut().remove_node(child);
                }
                CtKind::AddCC => {
                    program.dag_mut().remove_edge(zero, child);
                }
                _ => {}
            }
        }
        let mut now: Vec<NodeId> = program.dag().children(zero).to_vec();
        now.sort_unstable();
        now.dedup();
        if now == children {
            break;
        }
    }
}

/// Fold operations whose sole ciphertext operand is a shared zero. The
/// node constructors already avoid emitting these; this pass cleans up
/// dags that arrived by deserialization or hand construction.
pub fn prune_zero_noops(program: &mut CtProgram) {
    let zeroes: Vec<NodeId> = program
        .dag()
        .sentinel_children()
        .iter()
        .copied()
        .filter(|id| program.dag().value(*id).kind().is_zero())
        .collect();
    for zero in &zeroes {
        prune_descendants(program, *zero);
    }
    debug!(target: "fathom", zeroes = zeroes.len(), "pruned zero-fed noops");
}
