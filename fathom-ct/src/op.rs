use crate::dict::KeyType;
use fathom_base::{IoSpec, LevelInfo, LogScale};
use ordered_float::OrderedFloat;

/// A plaintext scalar together with the scale it is encoded at.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub struct ScaledPtVal {
    pub value: OrderedFloat<f64>,
    pub log_scale: LogScale,
}

impl ScaledPtVal {
    pub fn new(value: f64, log_scale: LogScale) -> Self {
        ScaledPtVal {
            value: OrderedFloat(value),
            log_scale,
        }
    }
}

/// The closed set of ciphertext operations. The two key-switch-hint kinds
/// are pseudo-ops that only ever appear in the schedulable clone of a
/// dag, never in a compiled program.
#[derive(Clone, PartialEq, Debug)]
pub enum CtKind {
    Input { io_spec: IoSpec },
    Output { io_spec: IoSpec },
    Zero,
    AddCC,
    AddCP { handle: KeyType, pt_log_scale: LogScale },
    AddCS { scalar: ScaledPtVal },
    MulCC,
    MulCP { handle: KeyType, pt_log_scale: LogScale },
    MulCS { scalar: ScaledPtVal },
    Rotate { rotate_by: i64 },
    Rescale,
    Bootstrap,
    MulKsh,
    RotateKsh { rotate_by: i64 },
}

impl CtKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            CtKind::Input { .. } => "InputC",
            CtKind::Output { .. } => "OutputC",
            CtKind::Zero => "ZeroC",
            CtKind::AddCC => "AddCC",
            CtKind::AddCP { .. } => "AddCP",
            CtKind::AddCS { .. } => "AddCS",
            CtKind::MulCC => "MulCC",
            CtKind::MulCP { .. } => "MulCP",
            CtKind::MulCS { .. } => "MulCS",
            CtKind::Rotate { .. } => "RotateC",
            CtKind::Rescale => "RescaleC",
            CtKind::Bootstrap => "BootstrapC",
            CtKind::MulKsh => "SchedulableMulKsh",
            CtKind::RotateKsh { .. } => "SchedulableRotateKsh",
        }
    }

    /// MulCC and RotateC consume a key-switch hint at execution time.
    pub fn requires_keyswitching(&self) -> bool {
        matches!(self, CtKind::MulCC | CtKind::Rotate { .. })
    }

    pub fn is_zero(&self) -> bool {
        matches!(self, CtKind::Zero)
    }

    pub fn io_spec(&self) -> Option<&IoSpec> {
        match self {
            CtKind::Input { io_spec } | CtKind::Output { io_spec } => Some(io_spec),
            _ => None,
        }
    }
}

/// One ciphertext operation: the op kind plus its cost-model tag.
#[derive(Clone, PartialEq, Debug)]
pub struct CtOp {
    kind: CtKind,
    level_info: LevelInfo,
}

impl CtOp {
    pub fn new(kind: CtKind, level_info: LevelInfo) -> Self {
        CtOp { kind, level_info }
    }

    pub fn kind(&self) -> &CtKind {
        &self.kind
    }

    pub fn level_info(&self) -> LevelInfo {
        self.level_info
    }

    pub fn level(&self) -> fathom_base::Level {
        self.level_info.level
    }

    pub fn log_scale(&self) -> LogScale {
        self.level_info.log_scale
    }

    pub fn set_level_info(&mut self, level_info: LevelInfo) {
        self.level_info = level_info;
    }
}
