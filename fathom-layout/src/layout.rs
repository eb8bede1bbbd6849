use fathom_base::{
    ceil_log2, err, max_index_mask, Array, ChunkSize, DimensionBit, IndexMask, MaybeTensorIndex,
    Result, Shape, TensorIndex,
};
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex, OnceLock};

/// One slot-bit position of a layout: bound to a tensor dimension bit, or
/// unused.
pub type LayoutBit = Option<DimensionBit>;

// The two derivations below (chunk offsets, per-slot tensor indices) are
// pure in the layout and get asked for constantly by the rewriters, so
// they are memoized inside the layout value. Clones share the memo and it
// is reclaimed with the last handle; nothing survives across runs.
struct Inner {
    shape: Shape,
    bits: Vec<LayoutBit>,
    offsets: OnceLock<Vec<TensorIndex>>,
    slot_indices: Mutex<HashMap<i64, Arc<Vec<MaybeTensorIndex>>>>,
}

/// How a tensor is packed into ciphertext chunks: each of the `k` slot
/// bits of a `2^k`-slot chunk is either bound to one bit of one tensor
/// dimension or left unused. Dimension bits not bound in a chunk index
/// the set of chunks instead.
#[derive(Clone)]
pub struct TensorLayout {
    inner: Arc<Inner>,
}

impl PartialEq for TensorLayout {
    fn eq(&self, other: &Self) -> bool {
        self.inner.shape == other.inner.shape && self.inner.bits == other.inner.bits
    }
}
impl Eq for TensorLayout {}

impl Hash for TensorLayout {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.shape.hash(state);
        self.inner.bits.hash(state);
    }
}

impl std::fmt::Debug for TensorLayout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TensorLayout")
            .field("shape", &self.inner.shape)
            .field("bits", &self.inner.bits)
            .finish()
    }
}

impl TensorLayout {
    pub fn new(shape: Shape, bits: Vec<LayoutBit>) -> Result<Self> {
        for (i, bit) in bits.iter().enumerate() {
            let Some(bit) = bit else { continue };
            if bits[i + 1..].contains(&Some(*bit)) {
                return Err(err("layout binds the same dimension bit twice"));
            }
            if bit.dimension < 0 || bit.dimension as usize >= shape.rank() {
                return Err(err("layout bit names a dimension outside the shape"));
            }
            if bit.bit_index >= ceil_log2(shape[bit.dimension as usize]) {
                return Err(err("layout bit exceeds its dimension's bit width"));
            }
        }
        Ok(TensorLayout {
            inner: Arc::new(Inner {
                shape,
                bits,
                offsets: OnceLock::new(),
                slot_indices: Mutex::new(HashMap::new()),
            }),
        })
    }

    pub fn shape(&self) -> &Shape {
        &self.inner.shape
    }

    pub fn bits(&self) -> &[LayoutBit] {
        &self.inner.bits
    }

    pub fn chunk_size(&self) -> ChunkSize {
        ChunkSize::new(1i64 << self.inner.bits.len())
    }

    pub fn total_chunks(&self) -> usize {
        self.chunk_offsets().len()
    }

    /// Which slot bits are bound to some tensor bit.
    pub fn mask_of_chunk(&self) -> IndexMask {
        let mut mask = IndexMask::default();
        for (i, bit) in self.inner.bits.iter().enumerate() {
            mask.set(i as u32, bit.is_some());
        }
        mask
    }

    /// Which bits of `dimension` are bound inside the chunk.
    pub fn mask_of_dimension(&self, dimension: usize) -> IndexMask {
        let mut mask = IndexMask::default();
        for bit in self.inner.bits.iter().flatten() {
            if bit.dimension == dimension as i64 {
                mask.set(bit.bit_index, true);
            }
        }
        mask
    }

    /// The dimension bits that index the set of chunks: every bit of every
    /// dimension that is not bound inside the chunk. Collected from the
    /// highest dimension down so ascending subset order enumerates chunk
    /// offsets in ascending flat order.
    pub fn tensor_offset_bits(&self) -> Vec<DimensionBit> {
        let mut result = Vec::new();
        for dim in (0..self.inner.shape.rank()).rev() {
            let full = max_index_mask(self.inner.shape[dim]);
            let in_chunk = self.mask_of_dimension(dim);
            let in_offset = full & !in_chunk;
            for bit_i in in_offset.masked_indices() {
                result.push(DimensionBit::new(dim as i64, bit_i));
            }
        }
        result
    }

    /// The base tensor index of each chunk, ascending. One entry per
    /// chunk; every combination of offset bits that stays inside the
    /// shape survives.
    pub fn chunk_offsets(&self) -> &[TensorIndex] {
        self.inner.offsets.get_or_init(|| {
            let offset_bits = self.tensor_offset_bits();
            let count = 1usize << offset_bits.len();
            let mut offsets = Vec::with_capacity(count);
            for subset in 0..count {
                let mut dims = Array::zeros(self.inner.shape.rank());
                for j in IndexMask::new(subset as u32).masked_indices() {
                    let bit = offset_bits[j as usize];
                    let dim = bit.dimension as usize;
                    dims.set(dim, dims[dim] + (1i64 << bit.bit_index));
                }
                if self.inner.shape.contains(&dims) {
                    offsets.push(TensorIndex::from_dims(self.inner.shape, dims));
                }
            }
            offsets
        })
    }

    /// The chunk base index holding `ti`: keep exactly the offset-bit part
    /// of each dimension index.
    pub fn chunk_offset_at(&self, ti: &TensorIndex) -> TensorIndex {
        assert!(*ti.shape() == self.inner.shape);
        let mut dims = Array::zeros(self.inner.shape.rank());
        for bit in self.tensor_offset_bits() {
            let dim = bit.dimension as usize;
            if ti[dim] & (1i64 << bit.bit_index) != 0 {
                dims.set(dim, dims[dim] + (1i64 << bit.bit_index));
            }
        }
        TensorIndex::from_dims(self.inner.shape, dims)
    }

    /// Position of `ti`'s chunk in `chunk_offsets()`.
    pub fn chunk_number_at(&self, ti: &TensorIndex) -> usize {
        let flat = self.chunk_offset_at(ti).flat();
        self.chunk_offsets()
            .binary_search_by_key(&flat, |offset| offset.flat())
            .expect("tensor index maps to a chunk offset the layout does not enumerate")
    }

    /// Slot of `ti` inside its chunk: each bound slot bit contributes its
    /// power of two when the corresponding dimension bit is set.
    pub fn chunk_index_at(&self, ti: &TensorIndex) -> i64 {
        assert!(*ti.shape() == self.inner.shape);
        let mut slot = 0;
        for (pos, bit) in self.inner.bits.iter().enumerate() {
            let Some(bit) = bit else { continue };
            if ti[bit.dimension as usize] & (1i64 << bit.bit_index) != 0 {
                slot += 1i64 << pos;
            }
        }
        slot
    }

    /// The tensor index a slot denotes before any chunk offset is added,
    /// or `None` when the slot touches an unused bit or overflows a
    /// dimension.
    fn tensor_index_at(&self, slot: i64) -> MaybeTensorIndex {
        let mut dims = Array::zeros(self.inner.shape.rank());
        for pos in IndexMask::new(slot as u32).masked_indices() {
            let bit = self.inner.bits[pos as usize]?;
            let dim = bit.dimension as usize;
            dims.set(dim, dims[dim] + (1i64 << bit.bit_index));
        }
        if !self.inner.shape.contains(&dims) {
            return None;
        }
        Some(TensorIndex::from_dims(self.inner.shape, dims))
    }

    /// For every slot of the chunk at `offset`, the tensor index occupying
    /// it (`None` for invalid slots). Memoized per offset.
    pub fn tensor_indices(&self, offset: &TensorIndex) -> Arc<Vec<MaybeTensorIndex>> {
        assert!(*offset.shape() == self.inner.shape);
        let mut cache = self.inner.slot_indices.lock().unwrap();
        if let Some(hit) = cache.get(&offset.flat()) {
            return hit.clone();
        }
        let mut result = Vec::with_capacity(self.chunk_size().value() as usize);
        for slot in 0..self.chunk_size().value() {
            result.push(self.tensor_index_at(slot).and_then(|ti| {
                let dims = ti.dims().zip_map(offset.dims(), |a, b| a + b);
                if self.inner.shape.contains(&dims) {
                    Some(TensorIndex::from_dims(self.inner.shape, dims))
                } else {
                    None
                }
            }));
        }
        let result = Arc::new(result);
        cache.insert(offset.flat(), result.clone());
        result
    }
}
