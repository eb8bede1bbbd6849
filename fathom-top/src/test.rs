
use crate::{
    apply_translation_masks, do_raw_shift, make_translation_masks, CtTensor, RawShiftBit, TCyclicShift,
    TDropDim, TInput, TInsertDim, TLayoutConversion, TReduceDim, TReorderDims, TReplicateDim,
    TResizeDim, TStride, TUnpaddedShift,
};
use eval::evaluate;
use fathom_base::{
    Array, DiffTensorIndex, DimensionBit, Level, LevelInfo, LogN, LogScale, Shape, TensorIndex,
};
use fathom_ct::{CtKind, CtProgram, ProgramContext, RamDictionary, Tensor};
use fathom_dag::NodeId;
use fathom_layout::{pack, LaidOutTensor, PtChunk, TensorLayout};
use std::collections::BTreeMap;
use test_log::test;

fn bit(dim: i64, idx: u32) -> Option<DimensionBit> {
    Some(DimensionBit::new(dim, idx))
}

fn layout(dims: &[i64], bits: Vec<Option<DimensionBit>>) -> TensorLayout {
    TensorLayout::new(Shape::from_slice(dims).unwrap(), bits).unwrap()
}

fn program() -> CtProgram {
    CtProgram::new(ProgramContext::new(
        LogN::new(11),
        LogScale::new(30),
        Level::new(10),
    ))
}

fn info() -> LevelInfo {
    LevelInfo::new(Level::new(10), LogScale::new(30))
}

/// Create the input tensor and seed every input chunk from the packed
/// values (invalid slots arrive zero, as the compiler guarantees).
fn load_input(
    program: &mut CtProgram,
    layout: &TensorLayout,
    values: &[f64],
) -> (CtTensor, BTreeMap<NodeId, PtChunk>) {
    let t_input = TInput::new(layout.clone(), "x", LogScale::new(30));
    let tensor = t_input.create_input_tensor(program, info());
    let packed = pack(values, layout);
    let seeds = tensor
        .chunks()
        .iter()
        .zip(packed.chunks())
        .map(|(ct, pt)| (*ct.payload(), pt.payload().clone()))
        .collect();
    (tensor, seeds)
}

fn count_kind(program: &CtProgram, pred: impl Fn(&CtKind) -> bool) -> usize {
    program
        .dag()
        .ids()
        .filter(|id| pred(program.dag().value(*id).kind()))
        .count()
}

fn valid_slot_values(
    output: &CtTensor,
    results: &BTreeMap<NodeId, PtChunk>,
) -> Vec<f64> {
    let layout = output.layout();
    let mut values = vec![0.0; layout.shape().value_count() as usize];
    for chunk in output.chunks() {
        let slots = layout.tensor_indices(chunk.offset());
        let evaluated = &results[chunk.payload()];
        for (slot, ti) in slots.iter().enumerate() {
            if let Some(ti) = ti {
                values[ti.flat() as usize] = evaluated.values()[slot];
            }
        }
    }
    values
}

#[test]
fn test_cyclic_shift_single_chunk_is_one_rotate() {
    let mut p = program();
    let l = layout(&[4], vec![bit(0, 0), bit(0, 1)]);
    let (input, seeds) = load_input(&mut p, &l, &[1.0, 2.0, 3.0, 4.0]);
    let shift = TCyclicShift::new(
        l.clone(),
        DiffTensorIndex::new(*l.shape(), Array::from_slice(&[1])),
    );
    let output = shift.amend(&mut p, &[input]);
    assert_eq!(count_kind(&p, |k| matches!(k, CtKind::Rotate { rotate_by: 1 })), 1);
    assert_eq!(count_kind(&p, |k| matches!(k, CtKind::MulCP { .. })), 0);
    assert_eq!(count_kind(&p, |k| matches!(k, CtKind::AddCC)), 0);
    let tensors = RamDictionary::new();
    let results = evaluate(&p, &tensors, &seeds, 4);
    assert_eq!(
        valid_slot_values(&output, &results),
        vec![4.0, 1.0, 2.0, 3.0]
    );
}

#[test]
fn test_cyclic_shift_across_chunks() {
    let mut p = program();
    // 4x4, one row per chunk; shifting rows crosses chunks.
    let l = layout(&[4, 4], vec![bit(1, 0), bit(1, 1)]);
    let values: Vec<f64> = (1..=16).map(f64::from).collect();
    let (input, seeds) = load_input(&mut p, &l, &values);
    let shift = TCyclicShift::new(
        l.clone(),
        DiffTensorIndex::new(*l.shape(), Array::from_slice(&[1, 0])),
    );
    let output = shift.amend(&mut p, &[input]);
    let tensors = RamDictionary::new();
    let results = evaluate(&p, &tensors, &seeds, 4);
    let mut expected = vec![0.0; 16];
    for row in 0..4usize {
        for col in 0..4usize {
            expected[((row + 1) % 4) * 4 + col] = values[row * 4 + col];
        }
    }
    assert_eq!(valid_slot_values(&output, &results), expected);
}

#[test]
fn test_unpadded_shift_mask_free() {
    let mut p = program();
    let l = layout(&[3], vec![bit(0, 0), bit(0, 1)]);
    let (input, seeds) = load_input(&mut p, &l, &[5.0, 6.0, 7.0]);
    let shift = TUnpaddedShift::new(
        l.clone(),
        DiffTensorIndex::new(*l.shape(), Array::from_slice(&[1])),
    );
    // The only zeroed valid slot's value lands on the invalid slot, so no
    // mask is needed.
    assert_eq!(shift.backend_mask_depth(), 0);
    let output = shift.amend(&mut p, &[input]);
    assert_eq!(count_kind(&p, |k| matches!(k, CtKind::MulCP { .. })), 0);
    assert_eq!(count_kind(&p, |k| matches!(k, CtKind::Rotate { .. })), 1);
    let tensors = RamDictionary::new();
    let results = evaluate(&p, &tensors, &seeds, 4);
    assert_eq!(
        valid_slot_values(&output, &results),
        vec![0.0, 5.0, 6.0]
    );
}

#[test]
fn test_unpadded_shift_backwards_is_also_mask_free() {
    // Shifting backwards drops slot 0; its stray value wraps onto the
    // invalid padding slot, so no mask is needed either.
    let l = layout(&[3], vec![bit(0, 0), bit(0, 1)]);
    let shift = TUnpaddedShift::new(
        l.clone(),
        DiffTensorIndex::new(*l.shape(), Array::from_slice(&[-1])),
    );
    assert_eq!(shift.backend_mask_depth(), 0);
    let mut p = program();
    let (input, seeds) = load_input(&mut p, &l, &[5.0, 6.0, 7.0]);
    let output = shift.amend(&mut p, &[input]);
    assert_eq!(count_kind(&p, |k| matches!(k, CtKind::MulCP { .. })), 0);
    let tensors = RamDictionary::new();
    let results = evaluate(&p, &tensors, &seeds, 4);
    assert_eq!(
        valid_slot_values(&output, &results),
        vec![6.0, 7.0, 0.0]
    );
}

#[test]
fn test_unpadded_shift_needs_mask_when_clobbering() {
    // Shifting by two wraps the dropped tail value onto valid slot 0,
    // which forces masking.
    let l = layout(&[3], vec![bit(0, 0), bit(0, 1)]);
    let shift = TUnpaddedShift::new(
        l.clone(),
        DiffTensorIndex::new(*l.shape(), Array::from_slice(&[2])),
    );
    assert_eq!(shift.backend_mask_depth(), 1);
    let mut p = program();
    let (input, seeds) = load_input(&mut p, &l, &[5.0, 6.0, 7.0]);
    let output = shift.amend(&mut p, &[input]);
    assert!(count_kind(&p, |k| matches!(k, CtKind::MulCP { .. })) > 0);
    let tensors = RamDictionary::new();
    let results = evaluate(&p, &tensors, &seeds, 4);
    assert_eq!(
        valid_slot_values(&output, &results),
        vec![0.0, 0.0, 5.0]
    );
}

#[test]
fn test_translation_mask_completeness() {
    // Oracle: every slot of the input (valid or not) carries a distinct
    // value; the masked lowering must deliver exactly the mapped values
    // and zero everywhere else.
    let l_in = layout(&[4, 4], vec![bit(1, 0), bit(1, 1)]);
    let l_out = layout(&[4, 4], vec![bit(0, 0), bit(0, 1)]);
    let mut p = program();
    let t_input = TInput::new(l_in.clone(), "x", LogScale::new(30));
    let input = t_input.create_input_tensor(&mut p, info());
    let chunk_size = 4usize;
    let mut seeds = BTreeMap::new();
    for (c, chunk) in input.chunks().iter().enumerate() {
        let values: Vec<f64> = (0..chunk_size)
            .map(|i| (c * chunk_size + i + 1) as f64)
            .collect();
        seeds.insert(*chunk.payload(), PtChunk::new(values));
    }
    let masks = make_translation_masks(&l_in, &l_out, |ti| Some(*ti));
    let chunks = apply_translation_masks(&mut p, &input, &masks, &l_out);
    let output = LaidOutTensor::new(chunks);
    let tensors = RamDictionary::new();
    let results = evaluate(&p, &tensors, &seeds, chunk_size);
    // Expected: slot-for-slot image of the identity map on tensor
    // indices; every unmapped output slot must be zero.
    for (out_c, out_chunk) in output.chunks().iter().enumerate() {
        let out_slots = l_out.tensor_indices(out_chunk.offset());
        let evaluated = &results[out_chunk.payload()];
        for (out_i, slot) in out_slots.iter().enumerate() {
            let expected = match slot {
                Some(ti) => {
                    let src_c = l_in.chunk_number_at(ti);
                    let src_i = l_in.chunk_index_at(ti) as usize;
                    (src_c * chunk_size + src_i + 1) as f64
                }
                None => 0.0,
            };
            assert_eq!(
                evaluated.values()[out_i], expected,
                "output chunk {} slot {}",
                out_c, out_i
            );
        }
    }
}

#[test]
fn test_translation_mask_partial_map_zeroes_rest() {
    // A partial map: only even rows survive. Unmapped outputs are zero.
    let l = layout(&[4], vec![bit(0, 0), bit(0, 1)]);
    let mut p = program();
    let (input, seeds) = load_input(&mut p, &l, &[1.0, 2.0, 3.0, 4.0]);
    let shape = *l.shape();
    let masks = make_translation_masks(&l, &l, |ti| {
        if ti[0] % 2 == 0 {
            Some(TensorIndex::from_dims(shape, *ti.dims()))
        } else {
            None
        }
    });
    let chunks = apply_translation_masks(&mut p, &input, &masks, &l);
    let output = LaidOutTensor::new(chunks);
    let tensors = RamDictionary::new();
    let results = evaluate(&p, &tensors, &seeds, 4);
    assert_eq!(
        valid_slot_values(&output, &results),
        vec![1.0, 0.0, 3.0, 0.0]
    );
}

#[test]
fn test_layout_conversion_matches_repack() {
    let l_in = layout(&[4, 4], vec![bit(1, 0), bit(1, 1)]);
    let l_out = layout(&[4, 4], vec![bit(0, 0), bit(1, 0)]);
    let values: Vec<f64> = (1..=16).map(f64::from).collect();
    let mut p = program();
    let (input, seeds) = load_input(&mut p, &l_in, &values);
    let conv = TLayoutConversion::new(l_in.clone(), l_out.clone());
    assert_eq!(conv.mismatching_bit_count(), 2);
    let output = conv.amend(&mut p, &[input]);
    let tensors = RamDictionary::new();
    let results = evaluate(&p, &tensors, &seeds, 4);
    assert_eq!(valid_slot_values(&output, &results), values);
}

#[test]
fn test_reorder_dims_transposes() {
    let l_in = layout(&[2, 4], vec![bit(1, 0), bit(1, 1)]);
    let l_out = layout(&[4, 2], vec![bit(0, 0), bit(0, 1)]);
    let values: Vec<f64> = (1..=8).map(f64::from).collect();
    let mut p = program();
    let (input, seeds) = load_input(&mut p, &l_in, &values);
    let reorder = TReorderDims::new(l_in, l_out, vec![1, 0]);
    let output = reorder.amend(&mut p, &[input]);
    let tensors = RamDictionary::new();
    let results = evaluate(&p, &tensors, &seeds, 4);
    let mut expected = vec![0.0; 8];
    for r in 0..2usize {
        for c in 0..4usize {
            expected[c * 2 + r] = values[r * 4 + c];
        }
    }
    assert_eq!(valid_slot_values(&output, &results), expected);
}

#[test]
fn test_stride_keeps_every_other() {
    let l_in = layout(&[8], vec![bit(0, 0), bit(0, 1), bit(0, 2)]);
    let l_out = layout(&[4], vec![bit(0, 0), bit(0, 1), None]);
    let values: Vec<f64> = (1..=8).map(f64::from).collect();
    let mut p = program();
    let (input, seeds) = load_input(&mut p, &l_in, &values);
    let stride = TStride::new(l_in, l_out, vec![2]);
    let output = stride.amend(&mut p, &[input]);
    let tensors = RamDictionary::new();
    let results = evaluate(&p, &tensors, &seeds, 8);
    assert_eq!(
        valid_slot_values(&output, &results),
        vec![1.0, 3.0, 5.0, 7.0]
    );
}

#[test]
fn test_resize_dim_shrink_and_grow() {
    let l_in = layout(&[4], vec![bit(0, 0), bit(0, 1)]);
    let l_out = layout(&[3], vec![bit(0, 0), bit(0, 1)]);
    let values = vec![1.0, 2.0, 3.0, 4.0];
    let mut p = program();
    let (input, seeds) = load_input(&mut p, &l_in, &values);
    let resize = TResizeDim::new(l_in.clone(), l_out.clone());
    assert_eq!(resize.backend_mask_depth(), 1);
    let output = resize.amend(&mut p, &[input]);
    let tensors = RamDictionary::new();
    let results = evaluate(&p, &tensors, &seeds, 4);
    assert_eq!(
        valid_slot_values(&output, &results),
        vec![1.0, 2.0, 3.0]
    );
    // Same layouts: identity, no ops emitted.
    let identity = TResizeDim::new(l_in.clone(), l_in.clone());
    assert_eq!(identity.backend_mask_depth(), 0);
}

#[test]
fn test_reduce_dim_sums() {
    let l_in = layout(&[4], vec![bit(0, 0), bit(0, 1)]);
    let l_out = layout(&[1], vec![None, None]);
    let values = vec![1.0, 2.0, 3.0, 4.0];
    let mut p = program();
    let (input, seeds) = load_input(&mut p, &l_in, &values);
    let reduce = TReduceDim::new(l_in, l_out, 0);
    let output = reduce.amend(&mut p, &[input]);
    let tensors = RamDictionary::new();
    let results = evaluate(&p, &tensors, &seeds, 4);
    assert_eq!(valid_slot_values(&output, &results), vec![10.0]);
}

#[test]
fn test_reduce_dim_outside_chunk() {
    // Rows live in separate chunks; reduction folds across chunks first.
    let l_in = layout(&[4, 2], vec![bit(1, 0), None]);
    let l_out = layout(&[1, 2], vec![bit(1, 0), None]);
    let values: Vec<f64> = (1..=8).map(f64::from).collect();
    let mut p = program();
    let (input, seeds) = load_input(&mut p, &l_in, &values);
    let reduce = TReduceDim::new(l_in, l_out, 0);
    let output = reduce.amend(&mut p, &[input]);
    let tensors = RamDictionary::new();
    let results = evaluate(&p, &tensors, &seeds, 4);
    // Column sums: 1+3+5+7, 2+4+6+8.
    assert_eq!(
        valid_slot_values(&output, &results),
        vec![16.0, 20.0]
    );
}

#[test]
fn test_replicate_dim_broadcasts() {
    let l_in = layout(&[1], vec![None, None]);
    let l_out = layout(&[4], vec![bit(0, 0), bit(0, 1)]);
    let mut p = program();
    let (input, seeds) = load_input(&mut p, &l_in, &[9.0]);
    let replicate = TReplicateDim::new(l_in, l_out, 0, 4);
    let output = replicate.amend(&mut p, &[input]);
    let tensors = RamDictionary::new();
    let results = evaluate(&p, &tensors, &seeds, 4);
    assert_eq!(
        valid_slot_values(&output, &results),
        vec![9.0, 9.0, 9.0, 9.0]
    );
}

#[test]
fn test_replicate_non_power_of_two_masks() {
    let l_in = layout(&[1], vec![None, None]);
    let l_out = layout(&[3], vec![bit(0, 0), bit(0, 1)]);
    let replicate = TReplicateDim::new(l_in.clone(), l_out.clone(), 0, 3);
    assert!(replicate.backend_mask_depth() >= 1);
    let mut p = program();
    let (input, seeds) = load_input(&mut p, &l_in, &[5.0]);
    let output = replicate.amend(&mut p, &[input]);
    let tensors = RamDictionary::new();
    let results = evaluate(&p, &tensors, &seeds, 4);
    assert_eq!(
        valid_slot_values(&output, &results),
        vec![5.0, 5.0, 5.0]
    );
    // The invalid slot must have been masked back to zero.
    let out_chunk = &output.chunks()[0];
    assert_eq!(results[out_chunk.payload()].values()[3], 0.0);
}

#[test]
fn test_drop_insert_dim_relabel_only() {
    let l_in = layout(&[1, 4], vec![bit(1, 0), bit(1, 1)]);
    let mut p = program();
    let (input, seeds) = load_input(&mut p, &l_in, &[1.0, 2.0, 3.0, 4.0]);
    let nodes_before = p.dag().len();
    let drop = TDropDim::new(l_in.clone(), 0);
    let dropped = drop.amend(&mut p, &[input]);
    assert_eq!(*dropped.layout().shape(), Shape::from_slice(&[4]).unwrap());
    let insert = TInsertDim::new(dropped.layout().clone(), 0);
    let output = insert.amend(&mut p, &[dropped]);
    assert_eq!(p.dag().len(), nodes_before);
    assert_eq!(*output.layout().shape(), *l_in.shape());
    let tensors = RamDictionary::new();
    let results = evaluate(&p, &tensors, &seeds, 4);
    assert_eq!(
        valid_slot_values(&output, &results),
        vec![1.0, 2.0, 3.0, 4.0]
    );
}

#[test]
fn test_raw_shift_of_zero_stays_zero() {
    let mut p = program();
    let l = layout(&[4, 2], vec![bit(1, 0), None]);
    let zero = p.fetch_zero_c(info());
    let chunks = crate::zero_laid_out_tensor(&mut p, zero, &l);
    let mut tensor = LaidOutTensor::new(chunks);
    let nodes_before = p.dag().len();
    for direction in [1, -1] {
        let shift = RawShiftBit::new(DimensionBit::new(0, 0), direction);
        tensor = do_raw_shift(&mut p, &tensor, &shift);
    }
    for chunk in tensor.chunks() {
        assert!(p.dag().value(*chunk.payload()).kind().is_zero());
    }
    assert_eq!(p.dag().len(), nodes_before);
}

#[test]
fn test_merged_mul_chain_relabels_only() {
    use crate::TMergedMulChain;
    let l_in = layout(&[4], vec![bit(0, 0), bit(0, 1)]);
    let l_out = layout(&[2, 2], vec![bit(0, 0), bit(1, 0)]);
    let mut p = program();
    let (input, _) = load_input(&mut p, &l_in, &[1.0, 2.0, 3.0, 4.0]);
    let nodes_before = p.dag().len();
    let merged = TMergedMulChain::new(l_in, l_out.clone());
    let output = merged.amend(&mut p, &[input]);
    assert_eq!(p.dag().len(), nodes_before);
    assert_eq!(output.layout(), &l_out);
}

#[test]
fn test_bootstrap_and_rescale_rewriters() {
    use crate::{TBootstrap, TRescale};
    let l = layout(&[4], vec![bit(0, 0), bit(0, 1)]);
    let mut p = program();
    let (input, _) = load_input(&mut p, &l, &[1.0, 2.0, 3.0, 4.0]);
    let rescaled = TRescale::new(l.clone(), LogScale::new(30)).amend(&mut p, &[input]);
    for chunk in rescaled.chunks() {
        let info = p.level_info(*chunk.payload());
        assert_eq!(info.level, Level::new(9));
        assert_eq!(info.log_scale, LogScale::new(0));
        assert!(matches!(
            p.dag().value(*chunk.payload()).kind(),
            CtKind::Rescale
        ));
    }
    let boosted = TBootstrap::new(l.clone(), Level::new(10)).amend(&mut p, &[rescaled]);
    for chunk in boosted.chunks() {
        let info = p.level_info(*chunk.payload());
        assert_eq!(info.level, Level::new(10));
        assert_eq!(info.log_scale, LogScale::new(0));
    }
}

#[test]
fn test_kernel_attributes_output_shapes() {
    use crate::KernelAttributes;
    // 3x3 kernel, stride 1, pad 1 keeps a 2d extent; stride 2 halves it.
    let kernel = KernelAttributes::new(Shape::from_slice(&[3, 3]).unwrap(), &[], &[1, 1]);
    assert_eq!(
        kernel.spatial_output_shape(&Shape::from_slice(&[8, 8]).unwrap()),
        Shape::from_slice(&[8, 8]).unwrap()
    );
    let strided =
        KernelAttributes::new(Shape::from_slice(&[3, 3]).unwrap(), &[2, 2], &[1, 1]);
    assert_eq!(
        strided.output_shape(&Shape::from_slice(&[16, 8, 8]).unwrap(), 32),
        Shape::from_slice(&[32, 4, 4]).unwrap()
    );
    assert_eq!(strided.strides(), &[2, 2]);
    assert_eq!(strided.begin_pads(), &[1, 1]);
}

#[test]
fn test_mul_cp_resolves_frontend_tensor() {
    let l = layout(&[4], vec![bit(0, 0), bit(0, 1)]);
    let mut p = program();
    let (input, seeds) = load_input(&mut p, &l, &[1.0, 2.0, 3.0, 4.0]);
    let mul = crate::TMulCP::new(l.clone(), "w", LogScale::new(30));
    let output = mul.amend(&mut p, &[input]);
    let mut tensors = RamDictionary::new();
    tensors.record_named(
        "w",
        Tensor::new(Shape::from_slice(&[4]).unwrap(), vec![2.0, 3.0, 4.0, 5.0]),
    );
    let results = evaluate(&p, &tensors, &seeds, 4);
    assert_eq!(
        valid_slot_values(&output, &results),
        vec![2.0, 6.0, 12.0, 20.0]
    );
}
