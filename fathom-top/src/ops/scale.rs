use crate::trans_mask::CtTensor;
use fathom_base::{Level, LevelInfo, LogScale};
use fathom_ct::CtProgram;
use fathom_layout::{LaidOutChunk, LaidOutTensor, TensorLayout};

/// Bootstrap every chunk back up to the full usable level count.
#[derive(Clone, PartialEq, Debug)]
pub struct TBootstrap {
    layout: TensorLayout,
    usable_levels: Level,
}

impl TBootstrap {
    pub fn new(layout: TensorLayout, usable_levels: Level) -> Self {
        TBootstrap {
            layout,
            usable_levels,
        }
    }

    pub fn usable_levels(&self) -> Level {
        self.usable_levels
    }

    pub fn layout(&self) -> &TensorLayout {
        &self.layout
    }

    pub fn added_log_scale(&self) -> LogScale {
        LogScale::new(0)
    }

    pub fn backend_mask_depth(&self) -> i64 {
        0
    }

    pub fn amend(&self, program: &mut CtProgram, inputs: &[CtTensor]) -> CtTensor {
        assert!(inputs.len() == 1);
        assert!(*inputs[0].layout() == self.layout);
        let chunks = inputs[0]
            .chunks()
            .iter()
            .map(|chunk| {
                let log_scale = program.level_info(*chunk.payload()).log_scale;
                let node = program.create_bootstrap_c(
                    LevelInfo::new(self.usable_levels, log_scale),
                    *chunk.payload(),
                );
                LaidOutChunk::new(chunk.layout().clone(), *chunk.offset(), node)
            })
            .collect();
        LaidOutTensor::new(chunks)
    }
}

/// Rescale every chunk: one level down, `amount` off the scale.
#[derive(Clone, PartialEq, Debug)]
pub struct TRescale {
    layout: TensorLayout,
    amount: LogScale,
}

impl TRescale {
    pub fn new(layout: TensorLayout, amount: LogScale) -> Self {
        TRescale { layout, amount }
    }

    pub fn amount(&self) -> LogScale {
        self.amount
    }

    pub fn layout(&self) -> &TensorLayout {
        &self.layout
    }

    pub fn added_log_scale(&self) -> LogScale {
        LogScale::new(0)
    }

    pub fn backend_mask_depth(&self) -> i64 {
        0
    }

    pub fn amend(&self, program: &mut CtProgram, inputs: &[CtTensor]) -> CtTensor {
        assert!(inputs.len() == 1);
        assert!(*inputs[0].layout() == self.layout);
        let old = program.level_info(*inputs[0].chunks()[0].payload());
        let level_info = LevelInfo::new(
            Level::new(old.level.value() - 1),
            old.log_scale - self.amount,
        );
        let chunks = inputs[0]
            .chunks()
            .iter()
            .map(|chunk| {
                let node = program.create_rescale_c(level_info, *chunk.payload());
                LaidOutChunk::new(chunk.layout().clone(), *chunk.offset(), node)
            })
            .collect();
        LaidOutTensor::new(chunks)
    }
}
