use fathom_base::LevelInfo;
use fathom_ct::{CtProgram, ProgramContext};
use fathom_dag::{Dag, NodeId};
use fathom_top::{CtTensor, TOp};
use std::collections::BTreeMap;

/// Walk the tensor-op dag in topological order, rewriting each op into
/// ciphertext ops against its parents' already-lowered tensors.
pub fn lower_t_op_dag(context: ProgramContext, t_dag: &Dag<TOp>) -> CtProgram {
    let mut program = CtProgram::new(context);
    let mut lowered: BTreeMap<NodeId, CtTensor> = BTreeMap::new();
    for id in t_dag.topological_order() {
        let result = match t_dag.value(id) {
            TOp::Input(t_input) => {
                let level_info = LevelInfo::new(context.usable_levels(), t_input.log_scale());
                t_input.create_input_tensor(&mut program, level_info)
            }
            op => {
                let inputs: Vec<CtTensor> = t_dag
                    .parents(id)
                    .iter()
                    .map(|parent| lowered[parent].clone())
                    .collect();
                op.amend(&mut program, &inputs)
            }
        };
        lowered.insert(id, result);
    }
    program
}
