// The assembled pipeline: a tensor-op dag is decomposed, lowered through
// the translation-mask rewriters into a ciphertext program, level
// management runs, and the result emits in the scheduler's format.


mod lower;
mod preprocess;

pub use lower::lower_t_op_dag;
pub use preprocess::preprocess;

pub use fathom_base as base;
pub use fathom_ct as ct;
pub use fathom_dag as dag;
pub use fathom_layout as layout;
pub use fathom_pass as pass;
pub use fathom_sched as sched;
pub use fathom_top as top;

use fathom_ct::{CtProgram, ProgramContext};
use fathom_pass::{ConversionDecomposerPass, FheBoosterPass, LevelMinimizationPass};
use fathom_top::TOp;
use tracing::debug;

/// Lower a tensor-op dag all the way to a level-managed ciphertext
/// program.
pub fn compile(
    context: ProgramContext,
    t_dag: &fathom_dag::Dag<TOp>,
    max_tentacles_per_conversion: usize,
    place_bootstraps: bool,
) -> CtProgram {
    let decomposed = ConversionDecomposerPass::new(max_tentacles_per_conversion).run(t_dag);
    let program = lower_t_op_dag(context, &decomposed);
    debug!(target: "fathom", nodes = program.dag().len(), "lowered tensor dag");
    let program = if place_bootstraps {
        FheBoosterPass::new(context.usable_levels()).run(&program)
    } else {
        program
    };
    LevelMinimizationPass.run(&program)
}
