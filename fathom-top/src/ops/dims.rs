use crate::trans_mask::{apply_translation_masks, make_translation_masks, CtTensor};
use fathom_base::{Array, DimensionBit, LogScale, Shape, TensorIndex};
use fathom_ct::CtProgram;
use fathom_layout::{LaidOutChunk, LaidOutTensor, TensorLayout};

pub fn reorder_dims_shape(shape: &Shape, dim_order: &[usize]) -> Shape {
    let dims: Array = dim_order.iter().map(|d| shape[*d]).collect();
    Shape::new(dims).expect("permuting a shape keeps it valid")
}

/// Permute the tensor's dimensions.
#[derive(Clone, PartialEq, Debug)]
pub struct TReorderDims {
    input_layout: TensorLayout,
    output_layout: TensorLayout,
    dim_order: Vec<usize>,
}

impl TReorderDims {
    pub fn new(
        input_layout: TensorLayout,
        output_layout: TensorLayout,
        dim_order: Vec<usize>,
    ) -> Self {
        let mut sorted = dim_order.clone();
        sorted.sort_unstable();
        assert!(sorted == (0..input_layout.shape().rank()).collect::<Vec<_>>());
        assert!(
            *output_layout.shape() == reorder_dims_shape(input_layout.shape(), &dim_order)
        );
        TReorderDims {
            input_layout,
            output_layout,
            dim_order,
        }
    }

    pub fn dim_order(&self) -> &[usize] {
        &self.dim_order
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

    pub fn amend(&self, program: &mut CtProgram, inputs: &[CtTensor]) -> CtTensor {
        assert!(inputs.len() == 1);
        assert!(*inputs[0].layout() == self.input_layout);
        let out_shape = *self.output_layout.shape();
        let masks = make_translation_masks(&self.input_layout, &self.output_layout, |ti| {
            let dims: Array = self.dim_order.iter().map(|d| ti[*d]).collect();
            Some(TensorIndex::from_dims(out_shape, dims))
        });
        LaidOutTensor::new(apply_translation_masks(
            program,
            &inputs[0],
            &masks,
            &self.output_layout,
        ))
    }
}

pub fn stride_shape(shape: &Shape, strides: &[i64]) -> Shape {
    assert!(strides.len() == shape.rank());
    let dims: Array = shape
        .iter()
        .zip(strides)
        .map(|(dim, stride)| (dim + stride - 1) / stride)
        .collect();
    Shape::new(dims).expect("strided shape stays valid")
}

/// Keep every `stride`-th index along each dimension.
#[derive(Clone, PartialEq, Debug)]
pub struct TStride {
    input_layout: TensorLayout,
    output_layout: TensorLayout,
    strides: Vec<i64>,
}

impl TStride {
    pub fn new(input_layout: TensorLayout, output_layout: TensorLayout, strides: Vec<i64>) -> Self {
        assert!(strides.iter().all(|s| *s >= 1));
        assert!(*output_layout.shape() == stride_shape(input_layout.shape(), &strides));
        TStride {
            input_layout,
            output_layout,
            strides,
        }
    }

    pub fn strides(&self) -> &[i64] {
        &self.strides
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

    pub fn amend(&self, program: &mut CtProgram, inputs: &[CtTensor]) -> CtTensor {
        assert!(inputs.len() == 1);
        assert!(*inputs[0].layout() == self.input_layout);
        let out_shape = *self.output_layout.shape();
        let masks = make_translation_masks(&self.input_layout, &self.output_layout, |ti| {
            let divisible = (0..self.strides.len()).all(|d| ti[d] % self.strides[d] == 0);
            if !divisible {
                return None;
            }
            let dims: Array = (0..self.strides.len())
                .map(|d| ti[d] / self.strides[d])
                .collect();
            Some(TensorIndex::from_dims(out_shape, dims))
        });
        LaidOutTensor::new(apply_translation_masks(
            program,
            &inputs[0],
            &masks,
            &self.output_layout,
        ))
    }
}

/// Grow or shrink dimensions in place: indices inside the output shape
/// carry over, everything else drops (or arrives zero).
#[derive(Clone, PartialEq, Debug)]
pub struct TResizeDim {
    input_layout: TensorLayout,
    output_layout: TensorLayout,
}

impl TResizeDim {
    pub fn new(input_layout: TensorLayout, output_layout: TensorLayout) -> Self {
        assert!(input_layout.shape().rank() == output_layout.shape().rank());
        TResizeDim {
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
        (self.input_layout != self.output_layout) as i64
    }

    pub fn amend(&self, program: &mut CtProgram, inputs: &[CtTensor]) -> CtTensor {
        assert!(inputs.len() == 1);
        assert!(*inputs[0].layout() == self.input_layout);
        if self.input_layout == self.output_layout {
            return inputs[0].clone();
        }
        let out_shape = *self.output_layout.shape();
        let masks = make_translation_masks(&self.input_layout, &self.output_layout, |ti| {
            if out_shape.contains(ti.dims()) {
                Some(TensorIndex::from_dims(out_shape, *ti.dims()))
            } else {
                None
            }
        });
        LaidOutTensor::new(apply_translation_masks(
            program,
            &inputs[0],
            &masks,
            &self.output_layout,
        ))
    }
}

fn shifted_bits(bits: &[Option<DimensionBit>], at: usize, delta: i64) -> Vec<Option<DimensionBit>> {
    bits.iter()
        .map(|bit| {
            bit.map(|bit| {
                if bit.dimension >= at as i64 {
                    DimensionBit::new(bit.dimension + delta, bit.bit_index)
                } else {
                    bit
                }
            })
        })
        .collect()
}

pub fn drop_dim_shape(shape: &Shape, dim_to_drop: usize) -> Shape {
    assert!(dim_to_drop < shape.rank());
    assert!(shape[dim_to_drop] == 1);
    let dims: Array = shape
        .iter()
        .enumerate()
        .filter(|(d, _)| *d != dim_to_drop)
        .map(|(_, v)| v)
        .collect();
    Shape::new(dims).expect("dropping a unit dimension keeps the shape valid")
}

pub fn drop_dim_layout(input_layout: &TensorLayout, dim_to_drop: usize) -> TensorLayout {
    TensorLayout::new(
        drop_dim_shape(input_layout.shape(), dim_to_drop),
        shifted_bits(input_layout.bits(), dim_to_drop, -1),
    )
    .expect("relabeled layout stays valid")
}

pub fn insert_dim_shape(shape: &Shape, dim_to_insert: usize) -> Shape {
    assert!(dim_to_insert <= shape.rank());
    let mut dims = Array::zeros(0);
    for (d, v) in shape.iter().enumerate() {
        if d == dim_to_insert {
            dims.push(1);
        }
        dims.push(v);
    }
    if dim_to_insert == shape.rank() {
        dims.push(1);
    }
    Shape::new(dims).expect("inserting a unit dimension keeps the shape valid")
}

pub fn insert_dim_layout(input_layout: &TensorLayout, dim_to_insert: usize) -> TensorLayout {
    TensorLayout::new(
        insert_dim_shape(input_layout.shape(), dim_to_insert),
        shifted_bits(input_layout.bits(), dim_to_insert, 1),
    )
    .expect("relabeled layout stays valid")
}

fn adapt_to_layout(output_layout: &TensorLayout, input: &CtTensor) -> CtTensor {
    assert!(output_layout.total_chunks() == input.chunks().len());
    let chunks = input
        .chunks()
        .iter()
        .map(|chunk| {
            let ti = TensorIndex::from_flat(*output_layout.shape(), chunk.offset().flat());
            LaidOutChunk::new(
                output_layout.clone(),
                output_layout.chunk_offset_at(&ti),
                *chunk.payload(),
            )
        })
        .collect();
    LaidOutTensor::new(chunks)
}

/// Remove a unit dimension; pure relabel, no ciphertext ops.
#[derive(Clone, PartialEq, Debug)]
pub struct TDropDim {
    input_layout: TensorLayout,
    output_layout: TensorLayout,
    dim_to_drop: usize,
}

impl TDropDim {
    pub fn new(input_layout: TensorLayout, dim_to_drop: usize) -> Self {
        let output_layout = drop_dim_layout(&input_layout, dim_to_drop);
        TDropDim {
            input_layout,
            output_layout,
            dim_to_drop,
        }
    }

    pub fn dim_to_drop(&self) -> usize {
        self.dim_to_drop
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
        adapt_to_layout(&self.output_layout, &inputs[0])
    }
}

/// Add a unit dimension; pure relabel, no ciphertext ops.
#[derive(Clone, PartialEq, Debug)]
pub struct TInsertDim {
    input_layout: TensorLayout,
    output_layout: TensorLayout,
    dim_to_insert: usize,
}

impl TInsertDim {
    pub fn new(input_layout: TensorLayout, dim_to_insert: usize) -> Self {
        let output_layout = insert_dim_layout(&input_layout, dim_to_insert);
        TInsertDim {
            input_layout,
            output_layout,
            dim_to_insert,
        }
    }

    pub fn dim_to_insert(&self) -> usize {
        self.dim_to_insert
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
        adapt_to_layout(&self.output_layout, &inputs[0])
    }
}
