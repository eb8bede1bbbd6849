
mod chunk_ir;
mod dict;
mod level_rules;
mod op;
mod persist;
mod program;

pub use chunk_ir::{ChunkIr, Tensor};
pub use dict::{Dictionary, KeyType, RamDictionary};
pub use level_rules::{
    level_info_for_add_cc, level_info_for_add_cp, level_info_for_add_cs, level_info_for_backend_mask,
    level_info_for_mul_cc, level_info_for_mul_cp, level_info_for_mul_cs, level_info_for_rotate_c,
    waterline_rescale,
};
pub use op::{CtKind, CtOp, ScaledPtVal};
pub use persist::{read_program, write_program};
pub use program::{partition_program, CtProgram, ProgramContext};
