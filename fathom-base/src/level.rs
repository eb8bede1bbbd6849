use crate::{err, Result};

// CKKS cost-model scalars. These are all small ints, wrapped so a level
// can never be confused with a scale or a chunk size at a call site.

/// Remaining modulus-chain depth of a ciphertext. Always in [1, 100).
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash, PartialOrd, Ord)]
pub struct Level(i64);

impl Level {
    pub fn new(value: i64) -> Self {
        assert!((1..100).contains(&value));
        Level(value)
    }

    pub fn parse(value: i64) -> Result<Self> {
        if !(1..100).contains(&value) {
            return Err(err("level out of range"));
        }
        Ok(Level(value))
    }

    pub fn value(&self) -> i64 {
        self.0
    }
}

/// log2 of the scaling factor of a ciphertext encoding. Always in [0, 200).
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash, PartialOrd, Ord)]
pub struct LogScale(i64);

impl LogScale {
    pub fn new(value: i64) -> Self {
        assert!((0..200).contains(&value));
        LogScale(value)
    }

    pub fn parse(value: i64) -> Result<Self> {
        if !(0..200).contains(&value) {
            return Err(err("log scale out of range"));
        }
        Ok(LogScale(value))
    }

    pub fn value(&self) -> i64 {
        self.0
    }
}

impl std::ops::Add for LogScale {
    type Output = LogScale;
    fn add(self, rhs: LogScale) -> LogScale {
        LogScale::new(self.0 + rhs.0)
    }
}

impl std::ops::Sub for LogScale {
    type Output = LogScale;
    fn sub(self, rhs: LogScale) -> LogScale {
        LogScale::new(self.0 - rhs.0)
    }
}

/// The cost-model tag on every ciphertext-op node.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub struct LevelInfo {
    pub level: Level,
    pub log_scale: LogScale,
}

impl LevelInfo {
    pub fn new(level: Level, log_scale: LogScale) -> Self {
        LevelInfo { level, log_scale }
    }
}

/// Number of plaintext slots in one ciphertext; always a power of two.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash, PartialOrd, Ord)]
pub struct ChunkSize(i64);

impl ChunkSize {
    pub fn new(value: i64) -> Self {
        assert!(value >= 1 && (value as u64).is_power_of_two());
        ChunkSize(value)
    }

    pub fn value(&self) -> i64 {
        self.0
    }

    pub fn log2(&self) -> LogChunkSize {
        LogChunkSize::new(self.0.trailing_zeros() as i64)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash, PartialOrd, Ord)]
pub struct LogChunkSize(i64);

impl LogChunkSize {
    pub fn new(value: i64) -> Self {
        assert!((0..32).contains(&value));
        LogChunkSize(value)
    }

    pub fn value(&self) -> i64 {
        self.0
    }

    pub fn chunk_size(&self) -> ChunkSize {
        ChunkSize::new(1i64 << self.0)
    }
}

/// log2 of the ring degree; a chunk packs N/2 slots.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash, PartialOrd, Ord)]
pub struct LogN(i64);

impl LogN {
    pub fn new(value: i64) -> Self {
        assert!((1..33).contains(&value));
        LogN(value)
    }

    pub fn value(&self) -> i64 {
        self.0
    }

    pub fn log_chunk_size(&self) -> LogChunkSize {
        LogChunkSize::new(self.0 - 1)
    }
}
