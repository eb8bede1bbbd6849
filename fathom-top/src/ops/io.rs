use crate::trans_mask::CtTensor;
use fathom_base::{IoSpec, LevelInfo, LogScale};
use fathom_ct::CtProgram;
use fathom_layout::{LaidOutChunk, LaidOutTensor, TensorLayout};

/// A named ciphertext input: one InputC per chunk offset.
#[derive(Clone, PartialEq, Debug)]
pub struct TInput {
    layout: TensorLayout,
    name: String,
    log_scale: LogScale,
}

impl TInput {
    pub fn new(layout: TensorLayout, name: impl Into<String>, log_scale: LogScale) -> Self {
        TInput {
            layout,
            name: name.into(),
            log_scale,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn log_scale(&self) -> LogScale {
        self.log_scale
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

    /// Inputs are sources, not rewrites of other tensors.
    pub fn amend(&self, _program: &mut CtProgram, _inputs: &[CtTensor]) -> CtTensor {
        unreachable!("inputs enter a program through create_input_tensor")
    }

    pub fn create_input_tensor(
        &self,
        program: &mut CtProgram,
        level_info: LevelInfo,
    ) -> CtTensor {
        let chunks = self
            .layout
            .chunk_offsets()
            .iter()
            .map(|offset| {
                let node = program
                    .create_input_c(level_info, IoSpec::new(self.name.clone(), offset.flat()));
                LaidOutChunk::new(self.layout.clone(), *offset, node)
            })
            .collect();
        LaidOutTensor::new(chunks)
    }
}

/// A named ciphertext output: one OutputC per chunk.
#[derive(Clone, PartialEq, Debug)]
pub struct TOutput {
    layout: TensorLayout,
    name: String,
}

impl TOutput {
    pub fn new(layout: TensorLayout, name: impl Into<String>) -> Self {
        TOutput {
            layout,
            name: name.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
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
        assert!(inputs.len() == 1);
        assert!(*inputs[0].layout() == self.layout);
        let level_info = program.level_info(*inputs[0].chunks()[0].payload());
        let chunks = inputs[0]
            .chunks()
            .iter()
            .map(|chunk| {
                let node = program.create_output_c(
                    level_info,
                    IoSpec::new(self.name.clone(), chunk.offset().flat()),
                    *chunk.payload(),
                );
                LaidOutChunk::new(chunk.layout().clone(), *chunk.offset(), node)
            })
            .collect();
        LaidOutTensor::new(chunks)
    }
}
