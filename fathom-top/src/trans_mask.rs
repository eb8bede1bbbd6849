use fathom_base::TensorIndex;
use fathom_ct::{ChunkIr, CtProgram};
use fathom_dag::NodeId;
use fathom_layout::{
    translation_src_dest, LaidOutChunk, LaidOutTensor, LaidOutTensorIndex, LaidOutTranslation,
    TensorLayout,
};
use itertools::Itertools;
use tracing::debug;

pub type CtChunk = LaidOutChunk<NodeId>;
pub type CtTensor = LaidOutTensor<NodeId>;

/// One translation vector together with the 0/1 mask that isolates the
/// source slots moving along it.
pub type TranslationMask = (LaidOutTranslation, LaidOutTensor<ChunkIr>);

/// Groups slot-level translations by their (chunk, slot) displacement and
/// synthesizes the per-displacement masks over the input layout.
pub struct TranslationMaskGenerator {
    layout: TensorLayout,
    // Registration order; a vec keeps mask emission deterministic.
    groups: Vec<(LaidOutTranslation, Vec<LaidOutTensorIndex>)>,
}

impl TranslationMaskGenerator {
    pub fn new(layout: TensorLayout) -> Self {
        TranslationMaskGenerator {
            layout,
            groups: Vec::new(),
        }
    }

    pub fn register_translation(&mut self, diff: LaidOutTranslation, src: LaidOutTensorIndex) {
        match self.groups.iter_mut().find(|(key, _)| *key == diff) {
            Some((_, sources)) => sources.push(src),
            None => self.groups.push((diff, vec![src])),
        }
    }

    fn mask_for(&self, sources: &[LaidOutTensorIndex]) -> LaidOutTensor<ChunkIr> {
        let chunk_size = self.layout.chunk_size().value() as usize;
        let mut nonzero: Vec<Option<Vec<f64>>> = vec![None; self.layout.total_chunks()];
        for src in sources {
            let values =
                nonzero[src.chunk_number()].get_or_insert_with(|| vec![0.0; chunk_size]);
            values[src.chunk_index() as usize] = 1.0;
        }
        let chunks = self
            .layout
            .chunk_offsets()
            .iter()
            .zip(nonzero)
            .map(|(offset, values)| {
                let chunk = match values {
                    Some(values) => ChunkIr::direct(values),
                    None => ChunkIr::Zero(self.layout.chunk_size()),
                };
                LaidOutChunk::new(self.layout.clone(), *offset, chunk)
            })
            .collect();
        LaidOutTensor::new(chunks)
    }

    pub fn translation_masks(&self) -> Vec<TranslationMask> {
        self.groups
            .iter()
            .map(|(diff, sources)| (*diff, self.mask_for(sources)))
            .collect()
    }
}

/// Build the translation masks realizing the partial map `src_to_dest`
/// between two equal-chunk-size layouts.
pub fn make_translation_masks(
    input_layout: &TensorLayout,
    output_layout: &TensorLayout,
    src_to_dest: impl Fn(&TensorIndex) -> Option<TensorIndex>,
) -> Vec<TranslationMask> {
    assert!(input_layout.chunk_size() == output_layout.chunk_size());
    let mut generator = TranslationMaskGenerator::new(input_layout.clone());
    for flat in 0..input_layout.shape().value_count() {
        let src_ti = TensorIndex::from_flat(*input_layout.shape(), flat);
        let Some(dest_ti) = src_to_dest(&src_ti) else {
            continue;
        };
        let src = LaidOutTensorIndex::new(input_layout.clone(), src_ti);
        let dest = LaidOutTensorIndex::new(output_layout.clone(), dest_ti);
        generator.register_translation(translation_src_dest(&src, &dest), src);
    }
    let masks = generator.translation_masks();
    debug!(target: "fathom", translations = masks.len(), "built translation masks");
    masks
}

/// The identity translation's mask: 1 on every valid slot, 0 on padding.
pub fn mask_all_invalid_slots(layout: &TensorLayout) -> LaidOutTensor<ChunkIr> {
    let masks = make_translation_masks(layout, layout, |ti| Some(*ti));
    for (translation, mask) in masks {
        if translation.chunk_number_diff() == 0 && translation.chunk_index_diff() == 0 {
            return mask;
        }
    }
    unreachable!("identity translation produced no identity mask");
}

fn is_all_ones(chunk: &ChunkIr) -> bool {
    match chunk {
        ChunkIr::Direct(values) => values.iter().all(|v| v.into_inner() == 1.0),
        _ => false,
    }
}

/// CT x PT multiply each chunk by its mask chunk; chunks whose mask is
/// all-zero short-circuit to the shared zero at the product's level info,
/// and all-ones masks select the chunk unchanged.
pub fn apply_mask(
    program: &mut CtProgram,
    ct: &CtTensor,
    pt: &LaidOutTensor<ChunkIr>,
) -> CtTensor {
    let log_scale = program.context().log_scale();
    let zero_c = program.fetch_zero_as_mul_cp_child_of(*ct.chunks()[0].payload(), log_scale);
    let chunks = ct
        .chunks()
        .iter()
        .zip_eq(pt.chunks())
        .map(|(lhs, rhs)| {
            assert!(lhs.offset() == rhs.offset());
            assert!(lhs.layout() == rhs.layout());
            let chunk = if rhs.payload().is_zero() {
                zero_c
            } else if is_all_ones(rhs.payload()) {
                // Multiplying by an all-ones mask selects everything.
                *lhs.payload()
            } else {
                program.create_mul_cp(*lhs.payload(), rhs.payload().clone(), log_scale)
            };
            LaidOutChunk::new(lhs.layout().clone(), *lhs.offset(), chunk)
        })
        .collect();
    LaidOutTensor::new(chunks)
}

/// The mask-free variant: where the mask chunk is all-zero the ciphertext
/// is replaced by the zero at its own level; nowhere is a MulCP emitted.
pub fn zero_out_where_zero_mask(
    program: &mut CtProgram,
    ct: &CtTensor,
    pt: &LaidOutTensor<ChunkIr>,
) -> CtTensor {
    let zero_c = program.fetch_zero_same_level_as(*ct.chunks()[0].payload());
    let chunks = ct
        .chunks()
        .iter()
        .zip_eq(pt.chunks())
        .map(|(lhs, rhs)| {
            assert!(lhs.offset() == rhs.offset());
            assert!(lhs.layout() == rhs.layout());
            let chunk = if rhs.payload().is_zero() {
                zero_c
            } else {
                *lhs.payload()
            };
            LaidOutChunk::new(lhs.layout().clone(), *lhs.offset(), chunk)
        })
        .collect();
    LaidOutTensor::new(chunks)
}

/// Rotate every non-zero chunk by `rotate_by` slots.
pub fn apply_rotation(program: &mut CtProgram, chunks: &[CtChunk], rotate_by: i64) -> Vec<CtChunk> {
    chunks
        .iter()
        .map(|chunk| {
            if program.dag().value(*chunk.payload()).kind().is_zero() {
                chunk.clone()
            } else {
                let rotated = program.create_rotate_c(*chunk.payload(), rotate_by);
                LaidOutChunk::new(chunk.layout().clone(), *chunk.offset(), rotated)
            }
        })
        .collect()
}

/// Advance the chunk sequence by `chunk_delta` positions with wraparound,
/// padding with zeroes when the output layout has more chunks, then
/// truncate and relabel under the output layout.
pub fn permute_chunks(
    program: &mut CtProgram,
    chunks: &[CtChunk],
    chunk_delta: usize,
    output_layout: &TensorLayout,
) -> Vec<CtChunk> {
    let output_count = output_layout.total_chunks();
    let mut payloads: Vec<NodeId> = chunks.iter().map(|chunk| *chunk.payload()).collect();
    while payloads.len() < output_count {
        let zero = program.fetch_zero_same_level_as(payloads[0]);
        payloads.push(zero);
    }
    payloads.rotate_right(chunk_delta);
    payloads.truncate(output_count);
    payloads
        .into_iter()
        .zip(output_layout.chunk_offsets())
        .map(|(payload, offset)| LaidOutChunk::new(output_layout.clone(), *offset, payload))
        .collect()
}

/// An all-zero laid-out tensor at the level info of `sister`.
pub fn zero_laid_out_tensor(
    program: &mut CtProgram,
    sister: NodeId,
    layout: &TensorLayout,
) -> Vec<CtChunk> {
    let zero = program.fetch_zero_same_level_as(sister);
    layout
        .chunk_offsets()
        .iter()
        .map(|offset| LaidOutChunk::new(layout.clone(), *offset, zero))
        .collect()
}

/// Chunkwise sum with zero short-circuiting.
pub fn sum_cts(program: &mut CtProgram, lhs: &[CtChunk], rhs: &[CtChunk]) -> Vec<CtChunk> {
    lhs.iter()
        .zip_eq(rhs)
        .map(|(a, b)| {
            assert!(a.offset() == b.offset());
            assert!(a.layout() == b.layout());
            if program.dag().value(*a.payload()).kind().is_zero() {
                return b.clone();
            }
            if program.dag().value(*b.payload()).kind().is_zero() {
                return a.clone();
            }
            let sum = program.create_add_cc(*a.payload(), *b.payload());
            LaidOutChunk::new(a.layout().clone(), *a.offset(), sum)
        })
        .collect()
}

fn apply_translations(
    program: &mut CtProgram,
    input: &CtTensor,
    masks: &[TranslationMask],
    output_layout: &TensorLayout,
    with_masking: bool,
) -> Vec<CtChunk> {
    let mut sum = zero_laid_out_tensor(program, *input.chunks()[0].payload(), output_layout);
    for (translation, mask) in masks {
        let selected = if with_masking {
            apply_mask(program, input, mask)
        } else {
            zero_out_where_zero_mask(program, input, mask)
        };
        let shifted = permute_chunks(
            program,
            selected.chunks(),
            translation.chunk_number_diff(),
            output_layout,
        );
        let rotated = apply_rotation(program, &shifted, translation.chunk_index_diff());
        sum = sum_cts(program, &sum, &rotated);
    }
    sum
}

/// Mask, shift, rotate and accumulate every translation group.
pub fn apply_translation_masks(
    program: &mut CtProgram,
    input: &CtTensor,
    masks: &[TranslationMask],
    output_layout: &TensorLayout,
) -> Vec<CtChunk> {
    apply_translations(program, input, masks, output_layout, true)
}

/// Same, relying on already-zero invalid slots instead of masking.
pub fn apply_translations_but_not_masks(
    program: &mut CtProgram,
    input: &CtTensor,
    masks: &[TranslationMask],
    output_layout: &TensorLayout,
) -> Vec<CtChunk> {
    apply_translations(program, input, masks, output_layout, false)
}
