use crate::dict::Dictionary;
use fathom_base::{err, ChunkSize, Result, Shape};
use fathom_layout::{PtChunk, PtVal};
use ordered_float::OrderedFloat;

/// A plain frontend tensor: a shape and its row-major values. These live
/// in an externally-supplied dictionary keyed by tensor name; the
/// compiled program only ever refers to them indirectly.
#[derive(Clone, PartialEq, Debug)]
pub struct Tensor {
    shape: Shape,
    values: Vec<PtVal>,
}

impl Tensor {
    pub fn new(shape: Shape, values: Vec<PtVal>) -> Self {
        assert!(shape.value_count() as usize == values.len());
        Tensor { shape, values }
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn values(&self) -> &[PtVal] {
        &self.values
    }
}

/// A recipe for one plaintext chunk. Values are deferred: a mask is
/// stored directly, a frontend-tensor chunk as per-slot flat indices into
/// the named tensor. Zero chunks exist only in flight and are never
/// recorded in the chunk dictionary.
#[derive(Clone, PartialEq, Eq, Debug, Hash)]
pub enum ChunkIr {
    Zero(ChunkSize),
    Direct(Vec<OrderedFloat<f64>>),
    Indirect {
        tensor_name: String,
        flat_indices: Vec<Option<i64>>,
    },
}

impl ChunkIr {
    pub fn direct(values: impl IntoIterator<Item = f64>) -> Self {
        ChunkIr::Direct(values.into_iter().map(OrderedFloat).collect())
    }

    pub fn is_zero(&self) -> bool {
        matches!(self, ChunkIr::Zero(_))
    }

    pub fn len(&self) -> usize {
        match self {
            ChunkIr::Zero(size) => size.value() as usize,
            ChunkIr::Direct(values) => values.len(),
            ChunkIr::Indirect { flat_indices, .. } => flat_indices.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Materialize the chunk against the frontend tensors; empty slots
    /// resolve to 0.
    pub fn resolve(&self, frontend_tensors: &dyn Dictionary<Tensor>) -> Result<PtChunk> {
        match self {
            ChunkIr::Zero(size) => Ok(PtChunk::zeros(size.value() as usize)),
            ChunkIr::Direct(values) => {
                Ok(PtChunk::new(values.iter().map(|v| v.into_inner()).collect()))
            }
            ChunkIr::Indirect {
                tensor_name,
                flat_indices,
            } => {
                let tensor = frontend_tensors
                    .at(tensor_name)
                    .ok_or_else(|| err("unknown frontend tensor name"))?;
                Ok(PtChunk::new(
                    flat_indices
                        .iter()
                        .map(|idx| idx.map_or(0.0, |idx| tensor.values()[idx as usize]))
                        .collect(),
                ))
            }
        }
    }

    /// Stable byte image for content hashing in the chunk dictionary.
    pub fn content_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        match self {
            ChunkIr::Zero(size) => {
                bytes.push(0);
                bytes.extend(size.value().to_le_bytes());
            }
            ChunkIr::Direct(values) => {
                bytes.push(1);
                for v in values {
                    bytes.extend(v.into_inner().to_le_bytes());
                }
            }
            ChunkIr::Indirect {
                tensor_name,
                flat_indices,
            } => {
                bytes.push(2);
                bytes.extend(tensor_name.as_bytes());
                bytes.push(0);
                for idx in flat_indices {
                    bytes.extend(idx.unwrap_or(-1).to_le_bytes());
                }
            }
        }
        bytes
    }
}
