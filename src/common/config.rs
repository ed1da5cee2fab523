//! Configuration for buffer pool instances.

use super::{Error, Result};

/// Size of a page in bytes (4KB).
///
/// Matches the OS page size on most systems, so page-aligned buffers can be
/// handed to the file system without copying.
pub const PAGE_SIZE: usize = 4096;

/// Frame count used by [`BufferPoolConfig::default`].
pub const DEFAULT_POOL_SIZE: usize = 64;

/// Shape of one pool instance and its place among its sibling shards.
///
/// A standalone pool is a single shard: `num_instances = 1`,
/// `instance_index = 0`.
///
/// # Example
/// ```
/// use shardpool::BufferPoolConfig;
///
/// let config = BufferPoolConfig::new(16)
///     .with_num_instances(4)
///     .with_instance_index(3);
/// assert!(config.validate().is_ok());
///
/// let bad = BufferPoolConfig::new(16).with_instance_index(1);
/// assert!(bad.validate().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferPoolConfig {
    /// Number of frames in the instance.
    pub pool_size: usize,
    /// Number of shards the page-id space is striped across (>= 1).
    pub num_instances: u32,
    /// This instance's shard (< `num_instances`).
    pub instance_index: u32,
}

impl BufferPoolConfig {
    /// Single-shard config with `pool_size` frames.
    pub fn new(pool_size: usize) -> Self {
        Self {
            pool_size,
            num_instances: 1,
            instance_index: 0,
        }
    }

    pub fn with_num_instances(mut self, num_instances: u32) -> Self {
        self.num_instances = num_instances;
        self
    }

    pub fn with_instance_index(mut self, instance_index: u32) -> Self {
        self.instance_index = instance_index;
        self
    }

    /// Check that the config describes a usable instance.
    pub fn validate(&self) -> Result<()> {
        if self.pool_size == 0 {
            return Err(Error::InvalidConfig("pool_size must be > 0".into()));
        }
        if self.num_instances == 0 {
            return Err(Error::InvalidConfig("num_instances must be >= 1".into()));
        }
        if self.instance_index >= self.num_instances {
            return Err(Error::InvalidConfig(format!(
                "instance_index {} out of range for {} instances",
                self.instance_index, self.num_instances
            )));
        }
        if i32::try_from(self.num_instances).is_err() {
            return Err(Error::InvalidConfig(format!(
                "num_instances {} exceeds the page id range",
                self.num_instances
            )));
        }
        Ok(())
    }
}

impl Default for BufferPoolConfig {
    fn default() -> Self {
        Self::new(DEFAULT_POOL_SIZE)
    }
}
