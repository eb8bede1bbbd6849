use crate::{LaidOutChunk, LaidOutTensor, TensorLayout};
use fathom_base::TensorIndex;

pub type PtVal = f64;

/// A chunk of plaintext slot values. The packer and the test oracles
/// compute with these; the compiled program never does.
#[derive(Clone, PartialEq, Debug)]
pub struct PtChunk {
    values: Vec<PtVal>,
}

impl PtChunk {
    pub fn new(values: Vec<PtVal>) -> Self {
        assert!(values.len().is_power_of_two());
        PtChunk { values }
    }

    pub fn zeros(len: usize) -> Self {
        PtChunk::new(vec![0.0; len])
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[PtVal] {
        &self.values
    }

    pub fn add(&self, other: &PtChunk) -> PtChunk {
        assert!(self.len() == other.len());
        PtChunk::new(
            self.values
                .iter()
                .zip(&other.values)
                .map(|(a, b)| a + b)
                .collect(),
        )
    }

    pub fn mul(&self, other: &PtChunk) -> PtChunk {
        assert!(self.len() == other.len());
        PtChunk::new(
            self.values
                .iter()
                .zip(&other.values)
                .map(|(a, b)| a * b)
                .collect(),
        )
    }

    pub fn add_scalar(&self, scalar: PtVal) -> PtChunk {
        PtChunk::new(self.values.iter().map(|v| v + scalar).collect())
    }

    pub fn mul_scalar(&self, scalar: PtVal) -> PtChunk {
        PtChunk::new(self.values.iter().map(|v| v * scalar).collect())
    }

    /// Cyclic rotation: the slot at `i` moves to `(i + rotate_by) % len`.
    pub fn rotate(&self, rotate_by: i64) -> PtChunk {
        let len = self.values.len() as i64;
        let by = rotate_by.rem_euclid(len) as usize;
        let mut values = self.values.clone();
        values.rotate_right(by);
        PtChunk::new(values)
    }
}

/// Gather a flat row-major value vector into chunks per the layout;
/// invalid slots hold 0.
pub fn pack(values: &[PtVal], layout: &TensorLayout) -> LaidOutTensor<PtChunk> {
    assert!(values.len() as i64 == layout.shape().value_count());
    let chunks = layout
        .chunk_offsets()
        .iter()
        .map(|offset| {
            let slots = layout.tensor_indices(offset);
            let chunk = slots
                .iter()
                .map(|ti| ti.map_or(0.0, |ti| values[ti.flat() as usize]))
                .collect();
            LaidOutChunk::new(layout.clone(), *offset, PtChunk::new(chunk))
        })
        .collect();
    LaidOutTensor::new(chunks)
}

fn value_at(tensor: &LaidOutTensor<PtChunk>, flat: i64) -> PtVal {
    let layout = tensor.layout();
    let ti = TensorIndex::from_flat(*layout.shape(), flat);
    let chunk = tensor.at_offset(&layout.chunk_offset_at(&ti));
    chunk.payload().values()[layout.chunk_index_at(&ti) as usize]
}

/// Inverse of `pack`: scatter chunks back into a flat value vector.
pub fn unpack(tensor: &LaidOutTensor<PtChunk>) -> Vec<PtVal> {
    (0..tensor.layout().shape().value_count())
        .map(|flat| value_at(tensor, flat))
        .collect()
}
