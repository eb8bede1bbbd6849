use crate::trans_mask::CtTensor;
use fathom_base::{flat_indices, LogScale};
use fathom_ct::{ChunkIr, CtProgram, ScaledPtVal};
use fathom_layout::{LaidOutChunk, LaidOutTensor, TensorLayout};
use itertools::Itertools;

/// Chunkwise ciphertext-ciphertext multiply.
#[derive(Clone, PartialEq, Debug)]
pub struct TMulCC {
    layout: TensorLayout,
}

/// Chunkwise ciphertext-ciphertext add.
#[derive(Clone, PartialEq, Debug)]
pub struct TAddCC {
    layout: TensorLayout,
}

macro_rules! chunkwise_cc {
    ($name:ident, $create:ident) => {
        impl $name {
            pub fn new(layout: TensorLayout) -> Self {
                $name { layout }
            }

            pub fn layout(&self) -> &TensorLayout {
                &self.layout
            }

            pub fn added_log_scale(&self) -> LogScale {
                LogScale::new(0)
            }

            pub fn backend_mask_depth(&self) -> i64 {
                0
            }

            pub fn amend(&self, program: &mut CtProgram, inputs: &[CtTensor]) -> CtTensor {
                assert!(inputs.len() == 2);
                assert!(*inputs[0].layout() == self.layout);
                assert!(*inputs[1].layout() == self.layout);
                let chunks = inputs[0]
                    .chunks()
                    .iter()
                    .zip_eq(inputs[1].chunks())
                    .map(|(lhs, rhs)| {
                        assert!(lhs.offset() == rhs.offset());
                        let node = program.$create(*lhs.payload(), *rhs.payload());
                        LaidOutChunk::new(lhs.layout().clone(), *lhs.offset(), node)
                    })
                    .collect();
                LaidOutTensor::new(chunks)
            }
        }
    };
}

chunkwise_cc!(TMulCC, create_mul_cc);
chunkwise_cc!(TAddCC, create_add_cc);

/// Chunkwise op against a named frontend plaintext tensor, resolved slot
/// by slot through an indirect chunk recipe.
fn amend_ct_pt(
    program: &mut CtProgram,
    input: &CtTensor,
    tensor_name: &str,
    pt_log_scale: LogScale,
    mul: bool,
) -> CtTensor {
    let layout = input.layout().clone();
    let chunks = input
        .chunks()
        .iter()
        .map(|chunk| {
            let slots = layout.tensor_indices(chunk.offset());
            let recipe = ChunkIr::Indirect {
                tensor_name: tensor_name.to_string(),
                flat_indices: flat_indices(&slots),
            };
            let node = if mul {
                program.create_mul_cp(*chunk.payload(), recipe, pt_log_scale)
            } else {
                program.create_add_cp(*chunk.payload(), recipe, pt_log_scale)
            };
            LaidOutChunk::new(chunk.layout().clone(), *chunk.offset(), node)
        })
        .collect();
    LaidOutTensor::new(chunks)
}

/// Multiply by a frontend plaintext tensor.
#[derive(Clone, PartialEq, Debug)]
pub struct TMulCP {
    layout: TensorLayout,
    tensor_name: String,
    pt_log_scale: LogScale,
}

/// Add a frontend plaintext tensor.
#[derive(Clone, PartialEq, Debug)]
pub struct TAddCP {
    layout: TensorLayout,
    tensor_name: String,
    pt_log_scale: LogScale,
}

macro_rules! chunkwise_cp {
    ($name:ident, $mul:expr, $added:expr) => {
        impl $name {
            pub fn new(
                layout: TensorLayout,
                tensor_name: impl Into<String>,
                pt_log_scale: LogScale,
            ) -> Self {
                $name {
                    layout,
                    tensor_name: tensor_name.into(),
                    pt_log_scale,
                }
            }

            pub fn layout(&self) -> &TensorLayout {
                &self.layout
            }

            pub fn tensor_name(&self) -> &str {
                &self.tensor_name
            }

            pub fn pt_log_scale(&self) -> LogScale {
                self.pt_log_scale
            }

            pub fn added_log_scale(&self) -> LogScale {
                if $added {
                    self.pt_log_scale
                } else {
                    LogScale::new(0)
                }
            }

            pub fn backend_mask_depth(&self) -> i64 {
                0
            }

            pub fn amend(&self, program: &mut CtProgram, inputs: &[CtTensor]) -> CtTensor {
                assert!(inputs.len() == 1);
                assert!(*inputs[0].layout() == self.layout);
                amend_ct_pt(
                    program,
                    &inputs[0],
                    &self.tensor_name,
                    self.pt_log_scale,
                    $mul,
                )
            }
        }
    };
}

chunkwise_cp!(TMulCP, true, true);
chunkwise_cp!(TAddCP, false, false);

/// Multiply every chunk by an immediate scalar.
#[derive(Clone, PartialEq, Debug)]
pub struct TMulCSI {
    layout: TensorLayout,
    scalar: ScaledPtVal,
}

/// Add an immediate scalar to every chunk.
#[derive(Clone, PartialEq, Debug)]
pub struct TAddCSI {
    layout: TensorLayout,
    scalar: ScaledPtVal,
}

macro_rules! chunkwise_cs {
    ($name:ident, $create:ident, $added:expr) => {
        impl $name {
            pub fn new(layout: TensorLayout, scalar: ScaledPtVal) -> Self {
                $name { layout, scalar }
            }

            pub fn layout(&self) -> &TensorLayout {
                &self.layout
            }

            pub fn scalar(&self) -> ScaledPtVal {
                self.scalar
            }

            pub fn added_log_scale(&self) -> LogScale {
                if $added {
                    self.scalar.log_scale
                } else {
                    LogScale::new(0)
                }
            }

            pub fn backend_mask_depth(&self) -> i64 {
                0
            }

            pub fn amend(&self, program: &mut CtProgram, inputs: &[CtTensor]) -> CtTensor {
                assert!(inputs.len() == 1);
                assert!(*inputs[0].layout() == self.layout);
                let chunks = inputs[0]
                    .chunks()
                    .iter()
                    .map(|chunk| {
                        let node = program.$create(*chunk.payload(), self.scalar);
                        LaidOutChunk::new(chunk.layout().clone(), *chunk.offset(), node)
                    })
                    .collect();
                LaidOutTensor::new(chunks)
            }
        }
    };
}

chunkwise_cs!(TMulCSI, create_mul_cs, true);
chunkwise_cs!(TAddCSI, create_add_cs, false);
