use crate::{err, Result};

/// Names one ciphertext of a frontend tensor: the tensor name plus the
/// flat offset of the chunk inside it.
#[derive(Clone, PartialEq, Eq, Debug, Hash, PartialOrd, Ord)]
pub struct IoSpec {
    pub name: String,
    pub offset: i64,
}

impl IoSpec {
    pub fn new(name: impl Into<String>, offset: i64) -> Self {
        IoSpec {
            name: name.into(),
            offset,
        }
    }

    pub fn to_filename(&self) -> String {
        format!("{}_{}", self.name, self.offset)
    }

    /// Inverse of `to_filename`; the offset is everything after the last
    /// underscore.
    pub fn from_filename(filename: &str) -> Result<Self> {
        let delim = filename
            .rfind('_')
            .ok_or_else(|| err("io spec filename has no underscore"))?;
        let offset = filename[delim + 1..]
            .parse::<i64>()
            .map_err(|_| err("io spec filename has non-numeric offset"))?;
        Ok(IoSpec::new(&filename[..delim], offset))
    }
}
