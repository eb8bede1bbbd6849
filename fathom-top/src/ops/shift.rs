use crate::trans_mask::{
    apply_translation_masks, apply_translations_but_not_masks, make_translation_masks, CtTensor,
    TranslationMask,
};
use fathom_base::{DiffTensorIndex, LogScale};
use fathom_ct::{ChunkIr, CtProgram};
use fathom_layout::{LaidOutChunk, LaidOutTensor, TensorLayout};

/// Rotate the tensor cyclically by a per-dimension amount.
#[derive(Clone, PartialEq, Debug)]
pub struct TCyclicShift {
    layout: TensorLayout,
    rotate_by: DiffTensorIndex,
}

impl TCyclicShift {
    pub fn new(layout: TensorLayout, rotate_by: DiffTensorIndex) -> Self {
        assert!(*rotate_by.shape() == *layout.shape());
        TCyclicShift { layout, rotate_by }
    }

    pub fn rotate_by(&self) -> &DiffTensorIndex {
        &self.rotate_by
    }

    pub fn layout(&self) -> &TensorLayout {
        &self.layout
    }

    pub fn added_log_scale(&self) -> LogScale {
        LogScale::new(0)
    }

    pub fn backend_mask_depth(&self) -> i64 {
        1
    }

    pub fn amend(&self, program: &mut CtProgram, inputs: &[CtTensor]) -> CtTensor {
        assert!(inputs.len() == 1);
        assert!(*inputs[0].layout() == self.layout);
        let masks = make_translation_masks(&self.layout, &self.layout, |ti| {
            Some(self.rotate_by.cyclic_add(ti))
        });
        LaidOutTensor::new(apply_translation_masks(
            program,
            &inputs[0],
            &masks,
            &self.layout,
        ))
    }
}

/// Shift without wraparound: slots pushed past an edge drop out and the
/// vacated slots fill with zeroes.
#[derive(Clone, PartialEq, Debug)]
pub struct TUnpaddedShift {
    layout: TensorLayout,
    rotate_by: DiffTensorIndex,
    masks: Vec<TranslationMask>,
}

impl TUnpaddedShift {
    pub fn new(layout: TensorLayout, rotate_by: DiffTensorIndex) -> Self {
        assert!(*rotate_by.shape() == *layout.shape());
        let masks = make_translation_masks(&layout, &layout, |ti| rotate_by.non_cyclic_add(ti));
        TUnpaddedShift {
            layout,
            rotate_by,
            masks,
        }
    }

    pub fn rotate_by(&self) -> &DiffTensorIndex {
        &self.rotate_by
    }

    pub fn layout(&self) -> &TensorLayout {
        &self.layout
    }

    pub fn added_log_scale(&self) -> LogScale {
        LogScale::new(0)
    }

    /// Masking can be skipped when every 0 the masks would impose either
    /// sits on an already-invalid slot or, once carried through its
    /// translation, lands on an invalid slot of the output. Garbage
    /// parked on padding is never read; garbage on any valid slot would
    /// corrupt the result and forces the mask.
    pub fn backend_mask_depth(&self) -> i64 {
        let chunk_size = self.layout.chunk_size().value();
        let total_chunks = self.layout.total_chunks();
        for (translation, mask) in &self.masks {
            for (chunk_number, chunk) in mask.chunks().iter().enumerate() {
                let ChunkIr::Direct(values) = chunk.payload() else {
                    continue;
                };
                let offsets = self.layout.chunk_offsets();
                let slots = self.layout.tensor_indices(&offsets[chunk_number]);
                for (i, value) in values.iter().enumerate() {
                    if slots[i].is_none() || value.into_inner() != 0.0 {
                        continue;
                    }
                    // A valid slot this translation leaves behind: find
                    // where its value would land.
                    let dest_chunk =
                        (chunk_number + translation.chunk_number_diff()) % total_chunks;
                    let slot =
                        (i as i64 + translation.chunk_index_diff()).rem_euclid(chunk_size);
                    if self.layout.tensor_indices(&offsets[dest_chunk])[slot as usize]
                        .is_some()
                    {
                        return 1;
                    }
                }
            }
        }
        0
    }

    pub fn amend(&self, program: &mut CtProgram, inputs: &[CtTensor]) -> CtTensor {
        assert!(inputs.len() == 1);
        assert!(*inputs[0].layout() == self.layout);
        let chunks = if self.backend_mask_depth() > 0 {
            apply_translation_masks(program, &inputs[0], &self.masks, &self.layout)
        } else {
            apply_translations_but_not_masks(program, &inputs[0], &self.masks, &self.layout)
        };
        LaidOutTensor::new(chunks)
    }
}

/// Raw slot rotation of a single-chunk tensor.
#[derive(Clone, PartialEq, Debug)]
pub struct TRotate {
    layout: TensorLayout,
    rotate_by: i64,
}

impl TRotate {
    pub fn new(layout: TensorLayout, rotate_by: i64) -> Self {
        assert!(layout.total_chunks() == 1);
        TRotate { layout, rotate_by }
    }

    pub fn rotate_by(&self) -> i64 {
        self.rotate_by
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
        let chunk = &inputs[0].chunks()[0];
        let payload = if program.dag().value(*chunk.payload()).kind().is_zero() {
            *chunk.payload()
        } else {
            program.create_rotate_c(*chunk.payload(), self.rotate_by)
        };
        LaidOutTensor::new(vec![LaidOutChunk::new(
            chunk.layout().clone(),
            *chunk.offset(),
            payload,
        )])
    }
}
