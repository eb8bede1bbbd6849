use fathom_base::{ceil_log2, ChunkSize, DimensionBit, Shape};
use fathom_dag::{Dag, NodeId};
use fathom_layout::{break_up, LayoutBit, Permutation, TensorLayout};
use fathom_top::{TLayoutConversion, TOp};
use tracing::debug;

/// Splits layout conversions whose translation fan-out ("tentacle"
/// count, `2^mismatching_bits`) exceeds the budget into a chain of
/// cheaper conversions, by decomposing the slot-bit permutation into
/// pieces that each move only a few bits.
pub struct ConversionDecomposerPass {
    max_tentacles_per_conversion: usize,
}

impl ConversionDecomposerPass {
    pub fn new(max_tentacles_per_conversion: usize) -> Self {
        assert!(max_tentacles_per_conversion >= 2);
        ConversionDecomposerPass {
            max_tentacles_per_conversion,
        }
    }

    pub fn run(&self, dag: &Dag<TOp>) -> Dag<TOp> {
        let mut out = dag.clone_from_ancestor();
        for id in out.topological_order() {
            if self.is_expensive(out.value(id)) {
                decompose_conversion(
                    &mut out,
                    id,
                    ceil_log2(self.max_tentacles_per_conversion as i64) as usize,
                );
            }
        }
        out
    }

    fn is_expensive(&self, op: &TOp) -> bool {
        match op {
            TOp::LayoutConversion(conversion) => {
                (1usize << conversion.mismatching_bit_count())
                    > self.max_tentacles_per_conversion
            }
            _ => false,
        }
    }
}

// Unused slot bits are nameless, so give each side's `None`s synthetic
// bits of a negative dimension before treating the two bit vectors as a
// permutation's source and destination.
fn nullopt_to_negative_dimension(bits: &[LayoutBit]) -> Vec<LayoutBit> {
    let mut fake_idx = 0;
    bits.iter()
        .map(|bit| {
            Some(bit.unwrap_or_else(|| {
                let synthetic = DimensionBit::new(-1, fake_idx);
                fake_idx += 1;
                synthetic
            }))
        })
        .collect()
}

// Line the two sides' synthetic bits up so a synthetic bit names the
// same slot on both sides wherever possible.
fn match_negative_dimensions(lhs: &[LayoutBit], rhs: &mut [LayoutBit]) {
    for idx in 0..lhs.len() {
        let (l, r) = (lhs[idx].unwrap(), rhs[idx].unwrap());
        if l.dimension == -1 && r.dimension == -1 {
            if l.bit_index != r.bit_index && rhs.contains(&lhs[idx]) {
                let swap_idx = rhs.iter().position(|b| *b == lhs[idx]).unwrap();
                rhs[swap_idx] = rhs[idx];
            }
            rhs[idx] = lhs[idx];
        }
    }
}

fn trace_cycle_until_out(in_bits: &[LayoutBit], out_bits: &[LayoutBit], mut idx: usize) -> usize {
    while out_bits.contains(&in_bits[idx]) {
        idx = out_bits.iter().position(|b| *b == in_bits[idx]).unwrap();
    }
    idx
}

// Bits leaving the chunk swap places with bits entering it; extending
// both vectors with the cycle-closing entries makes the relation a
// genuine permutation over one element set.
fn construct_permutable_bits(
    input_layout: &TensorLayout,
    output_layout: &TensorLayout,
) -> (Vec<LayoutBit>, Vec<LayoutBit>) {
    let in_base = nullopt_to_negative_dimension(input_layout.bits());
    let mut out_bits = nullopt_to_negative_dimension(output_layout.bits());
    match_negative_dimensions(&in_base, &mut out_bits);
    let mut in_bits = in_base;
    let width = input_layout.bits().len();
    for idx in 0..width {
        if !in_bits.contains(&out_bits[idx]) {
            in_bits.push(out_bits[idx]);
            let out_idx = trace_cycle_until_out(&in_bits, &out_bits, idx);
            out_bits.push(in_bits[out_idx]);
        }
    }
    assert!(in_bits.len() == out_bits.len());
    (in_bits, out_bits)
}

fn extract_permutation(in_bits: &[LayoutBit], out_bits: &[LayoutBit]) -> Permutation {
    let images = in_bits
        .iter()
        .map(|bit| {
            out_bits
                .iter()
                .position(|out| out == bit)
                .expect("every source bit appears on the destination side")
        })
        .collect();
    Permutation::new(images)
}

// Truncate an extended bit vector back to chunk width, turning synthetic
// bits back into unused slots.
fn clean_up(shape: &Shape, bits: &[LayoutBit], chunk_size: ChunkSize) -> TensorLayout {
    let width = chunk_size.log2().value() as usize;
    let truncated = bits[..width]
        .iter()
        .map(|bit| {
            let bit = bit.unwrap();
            if bit.dimension == -1 {
                None
            } else {
                Some(bit)
            }
        })
        .collect();
    TensorLayout::new(*shape, truncated).expect("permuted layout bits stay valid")
}

fn permutations_to_layouts(
    start_bits: &[LayoutBit],
    permutations: &[Permutation],
    shape: &Shape,
    chunk_size: ChunkSize,
) -> Vec<TensorLayout> {
    let mut bits_sequence = vec![start_bits.to_vec()];
    for permutation in permutations {
        bits_sequence.push(permutation.apply(bits_sequence.last().unwrap()));
    }
    bits_sequence
        .iter()
        .map(|bits| clean_up(shape, bits, chunk_size))
        .collect()
}

fn rebuild_as_chain(dag: &mut Dag<TOp>, id: NodeId, layouts: &[TensorLayout]) {
    assert!(layouts.len() >= 2);
    let parents = dag.parents(id).to_vec();
    let children = dag.children(id).to_vec();
    let conversion = |idx: usize| {
        TOp::LayoutConversion(TLayoutConversion::new(
            layouts[idx].clone(),
            layouts[idx + 1].clone(),
        ))
    };
    let mut tail = dag.add_node(conversion(0), &parents);
    for idx in 1..layouts.len() - 1 {
        tail = dag.add_node(conversion(idx), &[tail]);
    }
    // `children` carries one entry per edge, so double edges re-attach
    // with their multiplicity.
    for child in children {
        dag.add_edge(tail, child);
    }
    dag.remove_node_without_reassigning(id);
}

pub(crate) fn decompose_conversion(dag: &mut Dag<TOp>, id: NodeId, max_moved_bits: usize) {
    let TOp::LayoutConversion(conversion) = dag.value(id).clone() else {
        unreachable!("decomposing a non-conversion node")
    };
    let input_layout = conversion.input_layout().clone();
    let output_layout = conversion.output_layout().clone();
    let (in_bits, out_bits) = construct_permutable_bits(&input_layout, &output_layout);
    let permutation = extract_permutation(&in_bits, &out_bits);
    let permutations = break_up(&permutation, max_moved_bits);
    let layouts = permutations_to_layouts(
        &in_bits,
        &permutations,
        input_layout.shape(),
        input_layout.chunk_size(),
    );
    debug!(
        target: "fathom",
        pieces = permutations.len(),
        "decomposed an expensive layout conversion"
    );
    rebuild_as_chain(dag, id, &layouts);
}
