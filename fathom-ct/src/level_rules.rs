use crate::program::ProgramContext;
use fathom_base::{Level, LevelInfo, LogScale};

// Planning-time cost rules: what level/scale a freshly emitted op would
// settle at once waterline rescaling has run. The node constructors in
// `program.rs` record the raw pre-rescale values; these helpers are what
// plan-level cost queries use.

/// Drop levels until the scale falls below the waterline: each step takes
/// one level and `log_eva_s_f` off the scale.
pub fn waterline_rescale(
    log_eva_s_w: LogScale,
    log_eva_s_f: LogScale,
    level_info: LevelInfo,
) -> LevelInfo {
    let mut level = level_info.level;
    let mut log_scale = level_info.log_scale;
    while log_scale >= log_eva_s_w + log_eva_s_f {
        log_scale = log_scale - log_eva_s_f;
        level = Level::new(level.value() - 1);
    }
    LevelInfo::new(level, log_scale)
}

pub fn level_info_for_add_cc(
    context: &ProgramContext,
    parent_1: LevelInfo,
    parent_2: LevelInfo,
) -> LevelInfo {
    let level = parent_1.level.min(parent_2.level);
    let log_scale = parent_1.log_scale.max(parent_2.log_scale);
    waterline_rescale(
        context.log_scale(),
        context.log_scale(),
        LevelInfo::new(level, log_scale),
    )
}

pub fn level_info_for_mul_cc(
    context: &ProgramContext,
    parent_1: LevelInfo,
    parent_2: LevelInfo,
) -> LevelInfo {
    let level = parent_1.level.min(parent_2.level);
    let log_scale = parent_1.log_scale + parent_2.log_scale;
    waterline_rescale(
        context.log_scale(),
        context.log_scale(),
        LevelInfo::new(level, log_scale),
    )
}

// The plaintext operand is assumed to sit at the ciphertext's scale.
pub fn level_info_for_mul_cp(context: &ProgramContext, parent: LevelInfo) -> LevelInfo {
    waterline_rescale(
        context.log_scale(),
        context.log_scale(),
        LevelInfo::new(parent.level, parent.log_scale + parent.log_scale),
    )
}

pub fn level_info_for_add_cp(_context: &ProgramContext, parent: LevelInfo) -> LevelInfo {
    parent
}

pub fn level_info_for_mul_cs(context: &ProgramContext, parent: LevelInfo) -> LevelInfo {
    level_info_for_mul_cp(context, parent)
}

pub fn level_info_for_add_cs(context: &ProgramContext, parent: LevelInfo) -> LevelInfo {
    level_info_for_add_cp(context, parent)
}

pub fn level_info_for_rotate_c(_context: &ProgramContext, parent: LevelInfo) -> LevelInfo {
    parent
}

// Backend masks are all ones and zeroes but are encoded at the program
// scale anyway.
pub fn level_info_for_backend_mask(context: &ProgramContext, parent: LevelInfo) -> LevelInfo {
    level_info_for_mul_cp(context, parent)
}
