use crate::{Array, Shape};

/// A position inside a tensor: per-dimension indices plus the row-major
/// flat offset, kept consistent by construction.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub struct TensorIndex {
    shape: Shape,
    flat: i64,
    dims: Array,
}

fn flat_of(shape: &Shape, dims: &Array) -> i64 {
    assert!(shape.contains(dims));
    let mut flat = 0;
    for i in 0..dims.len() {
        flat *= shape[i];
        flat += dims[i];
    }
    flat
}

impl TensorIndex {
    pub fn from_dims(shape: Shape, dims: Array) -> Self {
        let flat = flat_of(&shape, &dims);
        TensorIndex { shape, flat, dims }
    }

    pub fn from_flat(shape: Shape, flat: i64) -> Self {
        assert!(flat >= 0 && flat < shape.value_count());
        let mut dims = Array::zeros(shape.rank());
        let mut rest = flat;
        for i in (0..shape.rank()).rev() {
            dims.set(i, rest % shape[i]);
            rest /= shape[i];
        }
        TensorIndex { shape, flat, dims }
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn flat(&self) -> i64 {
        self.flat
    }

    pub fn dims(&self) -> &Array {
        &self.dims
    }

    pub fn rank(&self) -> usize {
        self.shape.rank()
    }
}

impl std::ops::Index<usize> for TensorIndex {
    type Output = i64;
    fn index(&self, idx: usize) -> &i64 {
        &self.dims[idx]
    }
}

impl PartialOrd for TensorIndex {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TensorIndex {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.shape, self.flat).cmp(&(other.shape, other.flat))
    }
}

pub type MaybeTensorIndex = Option<TensorIndex>;

/// Flat offsets of a slot->index assignment, `None` for invalid slots.
pub fn flat_indices(slots: &[MaybeTensorIndex]) -> Vec<Option<i64>> {
    slots.iter().map(|ti| ti.map(|ti| ti.flat())).collect()
}

/// A signed per-dimension delta, each component bounded by the dimension
/// size.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub struct DiffTensorIndex {
    shape: Shape,
    diffs: Array,
}

impl DiffTensorIndex {
    pub fn new(shape: Shape, diffs: Array) -> Self {
        assert!(diffs.len() == shape.rank());
        for i in 0..diffs.len() {
            assert!(diffs[i].abs() <= shape[i]);
        }
        DiffTensorIndex { shape, diffs }
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn diffs(&self) -> &Array {
        &self.diffs
    }

    /// Add the delta, wrapping each dimension modulo its size.
    pub fn cyclic_add(&self, ti: &TensorIndex) -> TensorIndex {
        assert!(self.shape == *ti.shape());
        let mut out = Array::zeros(self.shape.rank());
        for dim in 0..self.shape.rank() {
            out.set(dim, (ti[dim] + self.diffs[dim]).rem_euclid(self.shape[dim]));
        }
        TensorIndex::from_dims(self.shape, out)
    }

    /// Add the delta; `None` if any dimension leaves its range.
    pub fn non_cyclic_add(&self, ti: &TensorIndex) -> Option<TensorIndex> {
        assert!(self.shape == *ti.shape());
        let mut out = Array::zeros(self.shape.rank());
        for dim in 0..self.shape.rank() {
            let idx = ti[dim] + self.diffs[dim];
            if idx < 0 || idx >= self.shape[dim] {
                return None;
            }
            out.set(dim, idx);
        }
        Some(TensorIndex::from_dims(self.shape, out))
    }
}

impl std::ops::Index<usize> for DiffTensorIndex {
    type Output = i64;
    fn index(&self, idx: usize) -> &i64 {
        &self.diffs[idx]
    }
}
