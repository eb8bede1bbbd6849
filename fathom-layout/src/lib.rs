#[cfg(test)]
mod test;

mod chunk;
mod laid_out;
mod layout;
mod perm;

pub use chunk::{pack, unpack, PtChunk, PtVal};
pub use laid_out::{
    translation_src_dest, LaidOutChunk, LaidOutTensor, LaidOutTensorIndex, LaidOutTranslation,
};
pub use layout::{LayoutBit, TensorLayout};
pub use perm::{break_up, compose, compose_all, Permutation, PermutationCycle};
