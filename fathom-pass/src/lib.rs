#[cfg(test)]
mod test;

mod booster;
mod debug_info;
mod decompose;
mod level_min;
mod prune;

pub use booster::FheBoosterPass;
pub use debug_info::DebugInfoArchive;
pub use decompose::ConversionDecomposerPass;
pub use level_min::LevelMinimizationPass;
pub use prune::prune_zero_noops;
