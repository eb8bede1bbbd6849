#[cfg(test)]
mod test;

mod kernel;
mod op;
pub mod ops;
mod raw_shift;
mod trans_mask;

pub use kernel::KernelAttributes;
pub use op::TOp;
pub use ops::arith::{TAddCC, TAddCP, TAddCSI, TMulCC, TMulCP, TMulCSI};
pub use ops::convert::{TLayoutConversion, TMergedMulChain};
pub use ops::dims::{
    drop_dim_layout, drop_dim_shape, insert_dim_layout, insert_dim_shape, reorder_dims_shape,
    stride_shape, TDropDim, TInsertDim, TReorderDims, TResizeDim, TStride,
};
pub use ops::io::{TInput, TOutput};
pub use ops::reduce::{reduce_dim_shape, replicate_dim_shape, TReduceDim, TReplicateDim};
pub use ops::scale::{TBootstrap, TRescale};
pub use ops::shift::{TCyclicShift, TRotate, TUnpaddedShift};
pub use raw_shift::{do_raw_shift, wraps_around, RawShiftBit};
pub use trans_mask::{
    apply_mask, apply_rotation, apply_translation_masks, apply_translations_but_not_masks,
    make_translation_masks, mask_all_invalid_slots, permute_chunks, sum_cts, zero_laid_out_tensor,
    zero_out_where_zero_mask, CtChunk, CtTensor, TranslationMask, TranslationMaskGenerator,
};
