use serde::{Deserialize, Serialize};

use crate::error::{ConvoError, Result};

const MIB: u64 = 1024 * 1024;

/// Size limits applied before ingestion and when attaching artifacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    /// Largest single input file or artifact, in bytes.
    pub max_file_bytes: u64,
    /// Largest combined artifact payload per conversation, in bytes.
    pub max_batch_bytes: u64,
    pub max_artifacts: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_file_bytes: 10 * MIB,
            max_batch_bytes: 50 * MIB,
            max_artifacts: 100,
        }
    }
}

impl Limits {
    pub fn check_input_size(&self, len: usize) -> Result<()> {
        if len as u64 > self.max_file_bytes {
            return Err(ConvoError::validation(format!(
                "input is {} bytes, limit is {} bytes",
                len, self.max_file_bytes
            )));
        }
        Ok(())
    }

    pub fn check_artifact_size(&self, name: &str, size: u64) -> Result<()> {
        if size > self.max_file_bytes {
            return Err(ConvoError::validation(format!(
                "artifact '{}' is {} bytes, limit is {} bytes",
                name, size, self.max_file_bytes
            )));
        }
        Ok(())
    }

    /// Check a whole batch of artifact sizes (count and combined bytes).
    pub fn check_batch<I>(&self, sizes: I) -> Result<()>
    where
        I: IntoIterator<Item = u64>,
    {
        let mut count = 0usize;
        let mut total = 0u64;
        for size in sizes {
            count += 1;
            total = total.saturating_add(size);
        }
        if count > self.max_artifacts {
            return Err(ConvoError::validation(format!(
                "{} artifacts exceed the limit of {}",
                count, self.max_artifacts
            )));
        }
        if total > self.max_batch_bytes {
            return Err(ConvoError::validation(format!(
                "artifacts total {} bytes, limit is {} bytes",
                total, self.max_batch_bytes
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_size_limit() {
        let limits = Limits {
            max_file_bytes: 10,
            ..Limits::default()
        };
        assert!(limits.check_input_size(10).is_ok());
        let err = limits.check_input_size(11).unwrap_err();
        assert!(matches!(err, ConvoError::Validation { .. }));
    }

    #[test]
    fn test_batch_limits() {
        let limits = Limits {
            max_file_bytes: 100,
            max_batch_bytes: 150,
            max_artifacts: 2,
        };
        assert!(limits.check_batch([100, 50]).is_ok());
        assert!(limits.check_batch([100, 51]).is_err());
        assert!(limits.check_batch([1, 1, 1]).is_err());
    }
}
