use crate::ops::dims::TResizeDim;
use crate::raw_shift::{do_raw_shift, wraps_around, RawShiftBit};
use crate::trans_mask::{apply_mask, mask_all_invalid_slots, zero_laid_out_tensor, CtTensor};
use fathom_base::{ceil_log2, is_power_of_two, DimensionBit, LogScale, Shape};
use fathom_ct::CtProgram;
use fathom_layout::{LaidOutChunk, LaidOutTensor, TensorLayout};

pub fn reduce_dim_shape(shape: &Shape, dimension: usize) -> Shape {
    let mut dims = *shape.dims();
    dims.set(dimension, 1);
    Shape::new(dims).expect("reduced shape stays valid")
}

fn check_other_dims_match(input: &Shape, output: &Shape, dimension: usize) {
    assert!(input.rank() == output.rank());
    for d in 0..input.rank() {
        if d != dimension {
            assert!(input[d] == output[d]);
        }
    }
}

/// Sum a dimension away by halving: shift-and-accumulate along each of
/// the dimension's bits, then resize down to extent 1.
#[derive(Clone, PartialEq, Debug)]
pub struct TReduceDim {
    input_layout: TensorLayout,
    output_layout: TensorLayout,
    dimension: usize,
}

impl TReduceDim {
    pub fn new(input_layout: TensorLayout, output_layout: TensorLayout, dimension: usize) -> Self {
        assert!(dimension < input_layout.shape().rank());
        assert!(output_layout.shape()[dimension] == 1);
        check_other_dims_match(input_layout.shape(), output_layout.shape(), dimension);
        TReduceDim {
            input_layout,
            output_layout,
            dimension,
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
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
        TResizeDim::new(self.input_layout.clone(), self.output_layout.clone())
            .backend_mask_depth()
    }

    pub fn amend(&self, program: &mut CtProgram, inputs: &[CtTensor]) -> CtTensor {
        assert!(inputs.len() == 1);
        assert!(*inputs[0].layout() == self.input_layout);
        let shape = *self.input_layout.shape();
        let mut result = inputs[0].clone();
        // Fold bits living outside the chunk first, zeroing the chunks
        // made redundant so the in-chunk rotates that follow skip them.
        for bit_idx in (0..ceil_log2(shape[self.dimension])).rev() {
            let dim_bit = DimensionBit::new(self.dimension as i64, bit_idx);
            if self.input_layout.bits().contains(&Some(dim_bit)) {
                continue;
            }
            let shift_bit = RawShiftBit::new(dim_bit, -1);
            result = do_raw_shift(program, &result, &shift_bit);
            let mut chunks = result.into_chunks();
            for chunk in chunks.iter_mut() {
                if !wraps_around(&shift_bit, chunk.offset()) {
                    let zero = program.fetch_zero_same_level_as(*chunk.payload());
                    *chunk = LaidOutChunk::new(chunk.layout().clone(), *chunk.offset(), zero);
                }
            }
            result = LaidOutTensor::new(chunks);
        }
        for bit_idx in (0..ceil_log2(shape[self.dimension])).rev() {
            let dim_bit = DimensionBit::new(self.dimension as i64, bit_idx);
            if self.input_layout.bits().contains(&Some(dim_bit)) {
                let shift_bit = RawShiftBit::new(dim_bit, -1);
                result = do_raw_shift(program, &result, &shift_bit);
            }
        }
        TResizeDim::new(self.input_layout.clone(), self.output_layout.clone())
            .amend(program, &[result])
    }
}

pub fn replicate_dim_shape(shape: &Shape, dimension: usize, multiple: i64) -> Shape {
    let mut dims = *shape.dims();
    dims.set(dimension, shape[dimension] * multiple);
    Shape::new(dims).expect("replicated shape stays valid")
}

/// Broadcast a unit dimension to `multiple` copies by doubling shifts,
/// masking stray slots when the multiple is not a power of two.
#[derive(Clone, PartialEq, Debug)]
pub struct TReplicateDim {
    input_layout: TensorLayout,
    output_layout: TensorLayout,
    dimension: usize,
    multiple: i64,
}

impl TReplicateDim {
    pub fn new(
        input_layout: TensorLayout,
        output_layout: TensorLayout,
        dimension: usize,
        multiple: i64,
    ) -> Self {
        assert!(dimension < input_layout.shape().rank());
        assert!(multiple >= 1);
        assert!(input_layout.shape()[dimension] == 1);
        assert!(output_layout.shape()[dimension] == multiple);
        check_other_dims_match(input_layout.shape(), output_layout.shape(), dimension);
        TReplicateDim {
            input_layout,
            output_layout,
            dimension,
            multiple,
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn multiple(&self) -> i64 {
        self.multiple
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

    /// Every input chunk offset must have an output chunk with the same
    /// dimension indices for the mask-free placement to work.
    fn can_skip_resize(&self) -> bool {
        self.input_layout.chunk_offsets().iter().all(|offset| {
            self.output_layout
                .chunk_offsets()
                .iter()
                .any(|out| out.dims() == offset.dims())
        })
    }

    pub fn backend_mask_depth(&self) -> i64 {
        let resize_depth = || {
            TResizeDim::new(self.input_layout.clone(), self.output_layout.clone())
                .backend_mask_depth()
        };
        if self.can_skip_resize() {
            if is_power_of_two(self.multiple) {
                0
            } else {
                1
            }
        } else if is_power_of_two(self.multiple) {
            resize_depth()
        } else {
            1 + resize_depth()
        }
    }

    pub fn amend(&self, program: &mut CtProgram, inputs: &[CtTensor]) -> CtTensor {
        assert!(inputs.len() == 1);
        assert!(*inputs[0].layout() == self.input_layout);
        let input = &inputs[0];
        // Placing the input chunks at their matching output offsets saves
        // the masking level a resize would burn, when the offsets line up.
        let mut result = if self.can_skip_resize() {
            let mut sum = zero_laid_out_tensor(
                program,
                *input.chunks()[0].payload(),
                &self.output_layout,
            );
            for chunk in input.chunks() {
                let at = sum
                    .iter()
                    .position(|s| s.offset().dims() == chunk.offset().dims())
                    .expect("matching output chunk exists when resize is skipped");
                let offset = *sum[at].offset();
                sum[at] = LaidOutChunk::new(self.output_layout.clone(), offset, *chunk.payload());
            }
            LaidOutTensor::new(sum)
        } else {
            TResizeDim::new(self.input_layout.clone(), self.output_layout.clone())
                .amend(program, &[input.clone()])
        };
        let new_extent = self.output_layout.shape()[self.dimension];
        let old_extent = self.input_layout.shape()[self.dimension];
        // Doubling shifts, in-chunk bits first to keep rotate counts low.
        for bit_idx in (ceil_log2(old_extent)..ceil_log2(new_extent)).rev() {
            let dim_bit = DimensionBit::new(self.dimension as i64, bit_idx);
            if self.output_layout.bits().contains(&Some(dim_bit)) {
                result = do_raw_shift(program, &result, &RawShiftBit::new(dim_bit, 1));
            }
        }
        for bit_idx in (ceil_log2(old_extent)..ceil_log2(new_extent)).rev() {
            let dim_bit = DimensionBit::new(self.dimension as i64, bit_idx);
            if !self.output_layout.bits().contains(&Some(dim_bit)) {
                result = do_raw_shift(program, &result, &RawShiftBit::new(dim_bit, 1));
            }
        }
        if is_power_of_two(self.multiple) {
            return result;
        }
        let mask = mask_all_invalid_slots(result.layout());
        apply_mask(program, &result, &mask)
    }
}
