use crate::trans_mask::{apply_translation_masks, make_translation_masks, CtTensor};
use fathom_base::LogScale;
use fathom_ct::CtProgram;
use fathom_layout::{LaidOutChunk, LaidOutTensor, TensorLayout};

/// Move a tensor between two layouts of the same shape and chunk size.
/// The permutation is the identity on tensor indices; all the work is in
/// the slot plumbing.
#[derive(Clone, PartialEq, Debug)]
pub struct TLayoutConversion {
    input_layout: TensorLayout,
    output_layout: TensorLayout,
}

impl TLayoutConversion {
    pub fn new(input_layout: TensorLayout, output_layout: TensorLayout) -> Self {
        assert!(input_layout.shape() == output_layout.shape());
        assert!(input_layout.chunk_size() == output_layout.chunk_size());
        TLayoutConversion {
            input_layout,
            output_layout,
        }
    }

    pub fn input_layout(&self) -> &TensorLayout {
        &self.input_layout
    }

    pub fn output_layout(&self) -> &TensorLayout {
        &self.output_layout
    }

    pub fn added_log_scale(&self) -> LogScale {
        LogScale::new(0)
    }

    pub fn backend_mask_depth(&self) -> i64 {
        1
    }

    /// Number of slot-bit positions the two layouts disagree on; the
    /// conversion fans out into up to `2^mismatching` translations.
    pub fn mismatching_bit_count(&self) -> usize {
        assert!(self.input_layout.bits().len() == self.output_layout.bits().len());
        self.input_layout
            .bits()
            .iter()
            .zip(self.output_layout.bits())
            .filter(|(a, b)| a != b)
            .count()
    }

    pub fn amend(&self, program: &mut CtProgram, inputs: &[CtTensor]) -> CtTensor {
        assert!(inputs.len() == 1);
        assert!(*inputs[0].layout() == self.input_layout);
        let masks =
            make_translation_masks(&self.input_layout, &self.output_layout, |ti| Some(*ti));
        LaidOutTensor::new(apply_translation_masks(
            program,
            &inputs[0],
            &masks,
            &self.output_layout,
        ))
    }
}

/// Relabel chunks under a new layout after a plan-level multiply-chain
/// fusion; payloads carry over untouched.
#[derive(Clone, PartialEq, Debug)]
pub struct TMergedMulChain {
    input_layout: TensorLayout,
    output_layout: TensorLayout,
}

impl TMergedMulChain {
    pub fn new(input_layout: TensorLayout, output_layout: TensorLayout) -> Self {
        assert!(input_layout.total_chunks() == output_layout.total_chunks());
        TMergedMulChain {
            input_layout,
            output_layout,
        }
    }

    pub fn input_layout(&self) -> &TensorLayout {
        &self.input_layout
    }

    pub fn output_layout(&self) -> &TensorLayout {
        &self.output_layout
    }

    pub fn added_log_scale(&self) -> LogScale {
        LogScale::new(0)
    }

    pub fn backend_mask_depth(&self) -> i64 {
        0
    }

    pub fn amend(&self, _program: &mut CtProgram, inputs: &[CtTensor]) -> CtTensor {
        assert!(inputs.len() == 1);
        assert!(*inputs[0].layout() == self.input_layout);
        let chunks = inputs[0]
            .chunks()
            .iter()
            .zip(self.output_layout.chunk_offsets())
            .map(|(chunk, offset)| {
                LaidOutChunk::new(self.output_layout.clone(), *offset, *chunk.payload())
            })
            .collect();
        LaidOutTensor::new(chunks)
    }
}
