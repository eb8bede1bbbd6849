use crate::ops::arith::{TAddCC, TAddCP, TAddCSI, TMulCC, TMulCP, TMulCSI};
use crate::ops::convert::{TLayoutConversion, TMergedMulChain};
use crate::ops::dims::{TDropDim, TInsertDim, TReorderDims, TResizeDim, TStride};
use crate::ops::io::{TInput, TOutput};
use crate::ops::reduce::{TReduceDim, TReplicateDim};
use crate::ops::scale::{TBootstrap, TRescale};
use crate::ops::shift::{TCyclicShift, TRotate, TUnpaddedShift};
use crate::trans_mask::CtTensor;
use fathom_base::LogScale;
use fathom_ct::CtProgram;
use fathom_layout::TensorLayout;

/// The closed set of tensor-level operations. Each one knows its layouts,
/// its cost contributions, and how to rewrite itself into ciphertext ops.
#[derive(Clone, PartialEq, Debug)]
pub enum TOp {
    CyclicShift(TCyclicShift),
    UnpaddedShift(TUnpaddedShift),
    Rotate(TRotate),
    ReorderDims(TReorderDims),
    Stride(TStride),
    ResizeDim(TResizeDim),
    DropDim(TDropDim),
    InsertDim(TInsertDim),
    ReduceDim(TReduceDim),
    ReplicateDim(TReplicateDim),
    LayoutConversion(TLayoutConversion),
    MergedMulChain(TMergedMulChain),
    MulCC(TMulCC),
    AddCC(TAddCC),
    MulCP(TMulCP),
    AddCP(TAddCP),
    MulCSI(TMulCSI),
    AddCSI(TAddCSI),
    Bootstrap(TBootstrap),
    Rescale(TRescale),
    Input(TInput),
    Output(TOutput),
}

macro_rules! dispatch {
    ($self:expr, $inner:ident => $body:expr) => {
        match $self {
            TOp::CyclicShift($inner) => $body,
            TOp::UnpaddedShift($inner) => $body,
            TOp::Rotate($inner) => $body,
            TOp::ReorderDims($inner) => $body,
            TOp::Stride($inner) => $body,
            TOp::ResizeDim($inner) => $body,
            TOp::DropDim($inner) => $body,
            TOp::InsertDim($inner) => $body,
            TOp::ReduceDim($inner) => $body,
            TOp::ReplicateDim($inner) => $body,
            TOp::LayoutConversion($inner) => $body,
            TOp::MergedMulChain($inner) => $body,
            TOp::MulCC($inner) => $body,
            TOp::AddCC($inner) => $body,
            TOp::MulCP($inner) => $body,
            TOp::AddCP($inner) => $body,
            TOp::MulCSI($inner) => $body,
            TOp::AddCSI($inner) => $body,
            TOp::Bootstrap($inner) => $body,
            TOp::Rescale($inner) => $body,
            TOp::Input($inner) => $body,
            TOp::Output($inner) => $body,
        }
    };
}

impl TOp {
    pub fn input_layout(&self) -> &TensorLayout {
        match self {
            TOp::ReorderDims(op) => op.input_layout(),
            TOp::Stride(op) => op.input_layout(),
            TOp::ResizeDim(op) => op.input_layout(),
            TOp::DropDim(op) => op.input_layout(),
            TOp::InsertDim(op) => op.input_layout(),
            TOp::ReduceDim(op) => op.input_layout(),
            TOp::ReplicateDim(op) => op.input_layout(),
            TOp::LayoutConversion(op) => op.input_layout(),
            TOp::MergedMulChain(op) => op.input_layout(),
            _ => self.same_layout(),
        }
    }

    pub fn output_layout(&self) -> &TensorLayout {
        match self {
            TOp::ReorderDims(op) => op.output_layout(),
            TOp::Stride(op) => op.output_layout(),
            TOp::ResizeDim(op) => op.output_layout(),
            TOp::DropDim(op) => op.output_layout(),
            TOp::InsertDim(op) => op.output_layout(),
            TOp::ReduceDim(op) => op.output_layout(),
            TOp::ReplicateDim(op) => op.output_layout(),
            TOp::LayoutConversion(op) => op.output_layout(),
            TOp::MergedMulChain(op) => op.output_layout(),
            _ => self.same_layout(),
        }
    }

    fn same_layout(&self) -> &TensorLayout {
        match self {
            TOp::CyclicShift(op) => op.layout(),
            TOp::UnpaddedShift(op) => op.layout(),
            TOp::Rotate(op) => op.layout(),
            TOp::MulCC(op) => op.layout(),
            TOp::AddCC(op) => op.layout(),
            TOp::MulCP(op) => op.layout(),
            TOp::AddCP(op) => op.layout(),
            TOp::MulCSI(op) => op.layout(),
            TOp::AddCSI(op) => op.layout(),
            TOp::Bootstrap(op) => op.layout(),
            TOp::Rescale(op) => op.layout(),
            TOp::Input(op) => op.layout(),
            TOp::Output(op) => op.layout(),
            _ => unreachable!("layout-changing op has distinct input/output layouts"),
        }
    }

    /// Scale this op's own constants contribute to its result.
    pub fn added_log_scale(&self) -> LogScale {
        dispatch!(self, op => op.added_log_scale())
    }

    /// Multiplicative depth spent on backend-generated masks.
    pub fn backend_mask_depth(&self) -> i64 {
        dispatch!(self, op => op.backend_mask_depth())
    }

    /// Rewrite into ciphertext ops appended to `program`.
    pub fn amend(&self, program: &mut CtProgram, inputs: &[CtTensor]) -> CtTensor {
        dispatch!(self, op => op.amend(program, inputs))
    }
}
