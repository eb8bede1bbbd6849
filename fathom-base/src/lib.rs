
mod bits;
mod error;
mod index;
mod io_spec;
mod level;
mod shape;

pub use bits::{ceil_log2, is_power_of_two, max_index_mask, DimensionBit, IndexMask};
pub use error::{err, Error, Result};
pub use index::{flat_indices, DiffTensorIndex, MaybeTensorIndex, TensorIndex};
pub use io_spec::IoSpec;
pub use level::{ChunkSize, Level, LevelInfo, LogChunkSize, LogN, LogScale};
pub use shape::{Array, Shape, MAX_RANK};
