use crate::trans_mask::{apply_rotation, CtChunk, CtTensor};
use fathom_base::{Array, DiffTensorIndex, DimensionBit, Shape, TensorIndex};
use fathom_ct::CtProgram;
use fathom_layout::{LaidOutChunk, LaidOutTensor, TensorLayout};
use std::collections::BTreeMap;

/// One power-of-two step along one dimension, in either direction. The
/// reduce/replicate rewriters walk a dimension bit by bit with these.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct RawShiftBit {
    dim_bit: DimensionBit,
    direction: i64,
}

impl RawShiftBit {
    pub fn new(dim_bit: DimensionBit, direction: i64) -> Self {
        assert!(direction.abs() == 1);
        RawShiftBit { dim_bit, direction }
    }

    pub fn dimension(&self) -> usize {
        self.dim_bit.dimension as usize
    }

    pub fn direction(&self) -> i64 {
        self.direction
    }

    pub fn dimension_bit(&self) -> DimensionBit {
        self.dim_bit
    }

    pub fn shift_amount(&self) -> i64 {
        self.direction * (1i64 << self.dim_bit.bit_index)
    }

    pub fn shift_diff(&self, shape: &Shape) -> DiffTensorIndex {
        let mut diffs = Array::zeros(shape.rank());
        diffs.set(self.dimension(), self.shift_amount());
        DiffTensorIndex::new(*shape, diffs)
    }
}

/// Whether shifting the chunk at `offset` leaves the tensor along the
/// shift's dimension.
pub fn wraps_around(shift_bit: &RawShiftBit, offset: &TensorIndex) -> bool {
    let shape = offset.shape();
    let result = offset[shift_bit.dimension()] + shift_bit.shift_amount();
    result < 0 || result >= shape[shift_bit.dimension()]
}

fn is_raw_shift_in_chunk(layout: &TensorLayout, shift_bit: &RawShiftBit) -> bool {
    layout.bits().contains(&Some(shift_bit.dimension_bit()))
}

fn rotate_by_of(layout: &TensorLayout, shift_bit: &RawShiftBit) -> i64 {
    let position = layout
        .bits()
        .iter()
        .position(|bit| *bit == Some(shift_bit.dimension_bit()))
        .expect("shift bit not bound in chunk");
    shift_bit.direction() * (1i64 << position)
}

/// Move whole chunks by the shift when the bit lives outside the chunk:
/// every non-wrapping chunk lands at its translated offset, the rest of
/// the offsets fall to zero.
fn raw_shifted_chunks(
    program: &mut CtProgram,
    chunks: &[CtChunk],
    shift_bit: &RawShiftBit,
) -> CtTensor {
    let layout = chunks[0].layout().clone();
    if is_raw_shift_in_chunk(&layout, shift_bit) {
        return LaidOutTensor::new(chunks.to_vec());
    }
    let rotate_diff = shift_bit.shift_diff(layout.shape());
    let zero = program.fetch_zero_same_level_as(*chunks[0].payload());
    let mut result: BTreeMap<i64, CtChunk> = layout
        .chunk_offsets()
        .iter()
        .map(|offset| {
            (
                offset.flat(),
                LaidOutChunk::new(layout.clone(), *offset, zero),
            )
        })
        .collect();
    for chunk in chunks {
        if !wraps_around(shift_bit, chunk.offset()) {
            let new_offset = layout.chunk_offset_at(&rotate_diff.cyclic_add(chunk.offset()));
            result.insert(
                new_offset.flat(),
                LaidOutChunk::new(layout.clone(), new_offset, *chunk.payload()),
            );
        }
    }
    LaidOutTensor::new(result.into_values().collect())
}

/// Shift-and-accumulate: rotate within chunks (when the bit is bound in
/// the chunk), move chunks otherwise, then add back onto the input.
pub fn do_raw_shift(
    program: &mut CtProgram,
    input: &CtTensor,
    shift_bit: &RawShiftBit,
) -> CtTensor {
    let rotated = if is_raw_shift_in_chunk(input.layout(), shift_bit) {
        let rotate_by = rotate_by_of(input.layout(), shift_bit);
        apply_rotation(program, input.chunks(), rotate_by)
    } else {
        input.chunks().to_vec()
    };
    let shuffled = raw_shifted_chunks(program, &rotated, shift_bit);
    let summed = crate::trans_mask::sum_cts(program, shuffled.chunks(), input.chunks());
    LaidOutTensor::new(summed)
}
