use crate::{
    ConversionDecomposerPass, DebugInfoArchive, FheBoosterPass, LevelMinimizationPass,
    prune_zero_noops,
};
use fathom_base::{
    DimensionBit, IoSpec, Level, LevelInfo, LogN, LogScale, Shape,
};
use fathom_ct::{ChunkIr, CtKind, CtOp, CtProgram, ProgramContext, ScaledPtVal};
use fathom_dag::{Dag, NodeId};
use fathom_layout::TensorLayout;
use fathom_top::{TInput, TLayoutConversion, TOp};
use test_log::test;

fn bit(dim: i64, idx: u32) -> Option<DimensionBit> {
    Some(DimensionBit::new(dim, idx))
}

fn layout(dims: &[i64], bits: Vec<Option<DimensionBit>>) -> TensorLayout {
    TensorLayout::new(Shape::from_slice(dims).unwrap(), bits).unwrap()
}

fn context() -> ProgramContext {
    ProgramContext::new(LogN::new(11), LogScale::new(30), Level::new(10))
}

fn info(level: i64, scale: i64) -> LevelInfo {
    LevelInfo::new(Level::new(level), LogScale::new(scale))
}

fn conversion_chain(dag: &Dag<TOp>, start: NodeId) -> Vec<TLayoutConversion> {
    let mut result = Vec::new();
    let mut at = start;
    loop {
        match dag.value(at) {
            TOp::LayoutConversion(conv) => result.push(conv.clone()),
            other => panic!("unexpected op in conversion chain: {:?}", other),
        }
        match dag.children(at) {
            [] => break,
            [next] => at = *next,
            _ => panic!("conversion chain fans out"),
        }
    }
    result
}

#[test]
fn test_decomposer_bit_reverse() {
    // Bit-reversed 4x4 layout: all four chunk bits mismatch, 16 tentacles.
    // Budget 4 tentacles = 2 moved bits per piece.
    let l_in = layout(
        &[4, 4],
        vec![bit(0, 0), bit(0, 1), bit(1, 0), bit(1, 1)],
    );
    let l_out = layout(
        &[4, 4],
        vec![bit(1, 1), bit(1, 0), bit(0, 1), bit(0, 0)],
    );
    let mut dag: Dag<TOp> = Dag::new();
    let input = dag.add_node(
        TOp::Input(TInput::new(l_in.clone(), "x", LogScale::new(30))),
        &[],
    );
    let conv = TLayoutConversion::new(l_in.clone(), l_out.clone());
    dag.add_node(TOp::LayoutConversion(conv), &[input]);

    let out = ConversionDecomposerPass::new(4).run(&dag);
    let first = out.children(input)[0];
    let chain = conversion_chain(&out, first);
    assert_eq!(chain.len(), 2);
    assert_eq!(chain[0].input_layout(), &l_in);
    assert_eq!(chain.last().unwrap().output_layout(), &l_out);
    for conv in &chain {
        assert!(conv.input_layout().shape() == l_in.shape());
        assert!(1usize << conv.mismatching_bit_count() <= 4);
        assert_eq!(conv.input_layout().chunk_size(), l_in.chunk_size());
    }
    // Adjacent layouts must agree along the chain.
    for pair in chain.windows(2) {
        assert_eq!(pair[0].output_layout(), pair[1].input_layout());
    }
}

#[test]
fn test_decomposer_handles_unused_bits() {
    // A padded layout: the unused slot bit rotates through the used ones.
    let l_in = layout(&[8], vec![bit(0, 0), bit(0, 1), bit(0, 2), None]);
    let l_out = layout(&[8], vec![None, bit(0, 0), bit(0, 1), bit(0, 2)]);
    let mut dag: Dag<TOp> = Dag::new();
    let input = dag.add_node(
        TOp::Input(TInput::new(l_in.clone(), "x", LogScale::new(30))),
        &[],
    );
    dag.add_node(
        TOp::LayoutConversion(TLayoutConversion::new(l_in.clone(), l_out.clone())),
        &[input],
    );
    let out = ConversionDecomposerPass::new(4).run(&dag);
    let chain = conversion_chain(&out, out.children(input)[0]);
    assert_eq!(chain.len(), 3);
    assert_eq!(chain[0].input_layout(), &l_in);
    assert_eq!(chain.last().unwrap().output_layout(), &l_out);
    for conv in &chain {
        assert!(1usize << conv.mismatching_bit_count() <= 4);
    }
    for pair in chain.windows(2) {
        assert_eq!(pair[0].output_layout(), pair[1].input_layout());
    }
}

// Just enough of an interpreter to execute lowered conversion chains on
// plaintext chunks.
fn evaluate_conversion(
    program: &CtProgram,
    seeds: &std::collections::BTreeMap<NodeId, fathom_layout::PtChunk>,
    chunk_len: usize,
) -> std::collections::BTreeMap<NodeId, fathom_layout::PtChunk> {
    use fathom_layout::PtChunk;
    let dag = program.dag();
    let mut values: std::collections::BTreeMap<NodeId, PtChunk> = Default::default();
    for id in dag.topological_order() {
        let parent = |n: usize| values[&dag.parents(id)[n]].clone();
        let value = match dag.value(id).kind() {
            CtKind::Input { .. } => seeds[&id].clone(),
            CtKind::Zero => PtChunk::zeros(chunk_len),
            CtKind::AddCC => parent(0).add(&parent(1)),
            CtKind::MulCP { handle, .. } => {
                let chunk = program.chunk_ir(handle).unwrap();
                let dict: fathom_ct::RamDictionary<fathom_ct::Tensor> =
                    fathom_ct::RamDictionary::new();
                parent(0).mul(&chunk.resolve(&dict).unwrap())
            }
            CtKind::Rotate { rotate_by } => parent(0).rotate(*rotate_by),
            other => panic!("conversion chains never emit {:?}", other),
        };
        values.insert(id, value);
    }
    values
}

#[test]
fn test_decomposer_equivalence() {
    // Lower the original conversion and its decomposition, run both on
    // the same packed input, and compare slot for slot.
    let l_in = layout(
        &[4, 4],
        vec![bit(0, 0), bit(0, 1), bit(1, 0), bit(1, 1)],
    );
    let l_out = layout(
        &[4, 4],
        vec![bit(1, 1), bit(1, 0), bit(0, 1), bit(0, 0)],
    );
    let values: Vec<f64> = (1..=16).map(f64::from).collect();
    let packed_in = fathom_layout::pack(&values, &l_in);

    let lower = |convs: &[TLayoutConversion]| {
        let mut program = CtProgram::new(context());
        let t_input = TInput::new(l_in.clone(), "x", LogScale::new(30));
        let mut tensor = t_input.create_input_tensor(&mut program, info(10, 30));
        let seeds: std::collections::BTreeMap<_, _> = tensor
            .chunks()
            .iter()
            .zip(packed_in.chunks())
            .map(|(ct, pt)| (*ct.payload(), pt.payload().clone()))
            .collect();
        for conv in convs {
            tensor = conv.amend(&mut program, &[tensor]);
        }
        let results = evaluate_conversion(&program, &seeds, 16);
        let out: Vec<fathom_layout::PtChunk> = tensor
            .chunks()
            .iter()
            .map(|chunk| results[chunk.payload()].clone())
            .collect();
        (tensor.layout().clone(), out)
    };

    let direct = vec![TLayoutConversion::new(l_in.clone(), l_out.clone())];
    let (direct_layout, direct_chunks) = lower(&direct);

    let mut dag: Dag<TOp> = Dag::new();
    let input = dag.add_node(
        TOp::Input(TInput::new(l_in.clone(), "x", LogScale::new(30))),
        &[],
    );
    dag.add_node(
        TOp::LayoutConversion(TLayoutConversion::new(l_in.clone(), l_out.clone())),
        &[input],
    );
    let decomposed = ConversionDecomposerPass::new(4).run(&dag);
    let chain = conversion_chain(&decomposed, decomposed.children(input)[0]);
    let (chain_layout, chain_chunks) = lower(&chain);

    assert_eq!(direct_layout, chain_layout);
    assert_eq!(direct_layout, l_out);
    assert_eq!(direct_chunks, chain_chunks);
    // And both match a straight repack of the input values.
    let repacked = fathom_layout::pack(&values, &l_out);
    for (got, want) in direct_chunks.iter().zip(repacked.chunks()) {
        assert_eq!(got, want.payload());
    }
}

#[test]
fn test_decomposer_leaves_cheap_conversions_alone() {
    let l_in = layout(&[4], vec![bit(0, 0), bit(0, 1)]);
    let l_out = layout(&[4], vec![bit(0, 1), bit(0, 0)]);
    let mut dag: Dag<TOp> = Dag::new();
    let input = dag.add_node(
        TOp::Input(TInput::new(l_in.clone(), "x", LogScale::new(30))),
        &[],
    );
    let conv = dag.add_node(
        TOp::LayoutConversion(TLayoutConversion::new(l_in, l_out)),
        &[input],
    );
    let out = ConversionDecomposerPass::new(4).run(&dag);
    assert_eq!(out.len(), 2);
    assert!(out.contains(conv));
}

#[test]
fn test_level_minimization_monotone() {
    let mut program = CtProgram::new(context());
    let input = program.create_input_c(info(10, 30), IoSpec::new("x", 0));
    let mul = program.create_mul_cp(input, ChunkIr::direct([1.0, 0.0]), LogScale::new(30));
    let rescaled = program.create_rescale_c(info(9, 30), mul);
    let add = program.create_add_cs(rescaled, ScaledPtVal::new(1.0, LogScale::new(30)));
    program.create_output_c(info(9, 30), IoSpec::new("y", 0), add);

    let out = LevelMinimizationPass.run(&program);
    let dag = out.dag();
    // Outputs pin to 1 and levels never increase along an edge.
    for id in dag.ids() {
        if matches!(dag.value(id).kind(), CtKind::Output { .. }) {
            assert_eq!(dag.value(id).level(), Level::new(1));
        }
        for child in dag.children(id) {
            let needed = if matches!(dag.value(*child).kind(), CtKind::Rescale) {
                dag.value(*child).level().value() + 1
            } else {
                dag.value(*child).level().value()
            };
            assert!(dag.value(id).level().value() >= needed);
        }
    }
    // The chain bottoms out at 1 and climbs by exactly the rescale.
    assert_eq!(dag.value(add).level(), Level::new(1));
    assert_eq!(dag.value(rescaled).level(), Level::new(1));
    assert_eq!(dag.value(mul).level(), Level::new(2));
    assert_eq!(dag.value(input).level(), Level::new(2));
    // Scales are untouched.
    for id in dag.ids() {
        assert_eq!(
            dag.value(id).log_scale(),
            program.dag().value(id).log_scale()
        );
    }
}

#[test]
fn test_level_minimization_bootstrap_only_children_floor() {
    let mut program = CtProgram::new(context());
    let input = program.create_input_c(info(10, 30), IoSpec::new("x", 0));
    program.create_bootstrap_c(info(10, 30), input);
    let out = LevelMinimizationPass.run(&program);
    assert_eq!(out.dag().value(input).level(), Level::new(1));
}

#[test]
fn test_booster_places_on_rescale_chain() {
    let mut program = CtProgram::new(ProgramContext::new(
        LogN::new(11),
        LogScale::new(30),
        Level::new(2),
    ));
    let input = program.create_input_c(info(4, 30), IoSpec::new("x", 0));
    let r1 = program.create_rescale_c(info(3, 30), input);
    let r2 = program.create_rescale_c(info(2, 30), r1);
    let r3 = program.create_rescale_c(info(1, 30), r2);

    let boosted = FheBoosterPass::new(Level::new(2)).run(&program);
    let dag = boosted.dag();
    let bootstraps: Vec<NodeId> = dag
        .ids()
        .filter(|id| matches!(dag.value(*id).kind(), CtKind::Bootstrap))
        .collect();
    assert_eq!(bootstraps.len(), 1);
    // The chain runs through the bootstrap: r1 -> boot -> r2.
    let boot = bootstraps[0];
    assert_eq!(dag.parents(boot), &[r1]);
    assert_eq!(dag.parents(r2), &[boot]);
    assert_eq!(dag.value(boot).level(), Level::new(2));
    let _ = r3;
}

#[test]
fn test_booster_no_rescales_no_bootstraps() {
    let mut program = CtProgram::new(context());
    let a = program.create_input_c(info(10, 30), IoSpec::new("x", 0));
    let b = program.create_input_c(info(10, 30), IoSpec::new("y", 0));
    let sum = program.create_add_cc(a, b);
    program.create_output_c(info(10, 30), IoSpec::new("z", 0), sum);
    let boosted = FheBoosterPass::new(Level::new(10)).run(&program);
    assert_eq!(boosted.dag().len(), program.dag().len());
}

#[test]
fn test_prune_zero_noops() {
    let mut program = CtProgram::new(context());
    let input = program.create_input_c(info(10, 30), IoSpec::new("x", 0));
    let zero = program.fetch_zero_c(info(10, 30));
    // Hand-build folds the constructors would have avoided.
    let rot = program.add_node(
        CtOp::new(CtKind::Rotate { rotate_by: 2 }, info(10, 30)),
        &[zero],
    );
    let mul = program.add_node(CtOp::new(CtKind::MulCC, info(10, 60)), &[rot, input]);
    let add = program.add_node(CtOp::new(CtKind::AddCC, info(10, 30)), &[zero, input]);
    prune_zero_noops(&mut program);
    let dag = program.dag();
    assert!(!dag.contains(rot));
    assert!(!dag.contains(mul));
    assert!(dag.contains(add));
    assert_eq!(dag.parents(add), &[input]);
}

#[test]
fn test_debug_info_merge_and_round_trip() {
    let mut first = DebugInfoArchive::new();
    first.add_mapping(10, vec![1, 2]);
    first.add_mapping(11, vec![3]);
    let mut second = DebugInfoArchive::new();
    second.add_mapping(20, vec![10, 11]);
    let merged = DebugInfoArchive::merge_adjacent(&first, &second);
    assert_eq!(merged.mapping(20), &[1, 2, 3]);

    let bytes = merged.to_bytes().unwrap();
    assert_eq!(DebugInfoArchive::from_bytes(&bytes).unwrap(), merged);
}
