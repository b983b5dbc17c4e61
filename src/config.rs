//! Runtime configuration for tiered-read-cache.
//!
//! Configuration can be loaded from a JSON file or constructed
//! programmatically. All cache sizing knobs (block budget, segment tuning
//! fractions, block size) live here, along with the capacity derivation the
//! cache constructor validates.

use std::path::PathBuf;

use clap::Parser;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Command-line arguments.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "tiered-read-cache",
    about = "Read a byte range of a file through the tiered block cache"
)]
pub struct Cli {
    /// Path to configuration file (JSON).
    #[arg(short, long, default_value = "config.json")]
    pub config: PathBuf,

    /// Backing-store root directory the virtual namespace maps onto.
    #[arg(long)]
    pub root: PathBuf,

    /// Virtual path of the file to read, relative to the root.
    pub path: String,

    /// Byte offset to start reading at.
    #[arg(long, default_value_t = 0)]
    pub offset: i64,

    /// Number of bytes to read (defaults to the rest of the file).
    #[arg(long)]
    pub length: Option<usize>,

    /// Log the cache table after the read.
    #[arg(long)]
    pub stats: bool,

    /// Enable verbose logging.
    #[arg(short, long)]
    pub verbose: bool,
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Cache sizing and tuning.
    pub cache: CacheConfig,
}

/// Cache sizing knobs, fixed for the lifetime of a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Total block budget across all three segments.
    pub total_blocks: u32,

    /// Tuning ratio for the `old` segment: `old_max = total_blocks /
    /// old_fraction`. Must be greater than 1.
    pub old_fraction: f64,

    /// Tuning ratio for the `new` segment: `new_max = total_blocks /
    /// new_fraction`. Must be greater than 1.
    pub new_fraction: f64,

    /// Bytes per cached block.
    pub block_size: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            total_blocks: 1024,
            old_fraction: 5.0,
            new_fraction: 2.0,
            block_size: 4096,
        }
    }
}

/// Configuration errors. Fatal at construction, never re-checked per
/// cache operation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("block_size must be greater than zero")]
    ZeroBlockSize,

    #[error("total_blocks must be greater than zero")]
    ZeroTotalBlocks,

    #[error("{name} must be greater than 1 (got {value})")]
    InvalidFraction { name: &'static str, value: f64 },

    #[error("{segment} segment capacity is zero with total_blocks={total_blocks}")]
    EmptySegment {
        segment: &'static str,
        total_blocks: u32,
    },

    #[error(
        "segment fractions leave no room: new_max={new_max} + old_max={old_max} \
         exceeds total_blocks={total_blocks}"
    )]
    MidUnderflow {
        new_max: usize,
        old_max: usize,
        total_blocks: u32,
    },
}

/// Derived per-segment block budgets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentCapacities {
    pub new_max: usize,
    pub mid_max: usize,
    pub old_max: usize,
}

impl CacheConfig {
    /// Derive the per-segment capacities, validating the configuration.
    ///
    /// Division truncates, matching the original derivation:
    /// `new_max = total / new_fraction`, `old_max = total / old_fraction`,
    /// `mid_max = total - new_max - old_max`. A zero `mid_max` is legal
    /// (the caller logs it); a zero `new_max` or `old_max` is not, since
    /// insertion and eviction both require at least one slot there.
    pub fn segment_capacities(&self) -> Result<SegmentCapacities, ConfigError> {
        if self.block_size == 0 {
            return Err(ConfigError::ZeroBlockSize);
        }
        if self.total_blocks == 0 {
            return Err(ConfigError::ZeroTotalBlocks);
        }
        // NaN fails both comparisons and is rejected with the rest.
        if self.new_fraction.is_nan() || self.new_fraction <= 1.0 {
            return Err(ConfigError::InvalidFraction {
                name: "new_fraction",
                value: self.new_fraction,
            });
        }
        if self.old_fraction.is_nan() || self.old_fraction <= 1.0 {
            return Err(ConfigError::InvalidFraction {
                name: "old_fraction",
                value: self.old_fraction,
            });
        }

        let total = self.total_blocks;
        let new_max = (f64::from(total) / self.new_fraction) as usize;
        let old_max = (f64::from(total) / self.old_fraction) as usize;

        if new_max == 0 {
            return Err(ConfigError::EmptySegment {
                segment: "new",
                total_blocks: total,
            });
        }
        if old_max == 0 {
            return Err(ConfigError::EmptySegment {
                segment: "old",
                total_blocks: total,
            });
        }

        let mid_max = (total as usize)
            .checked_sub(new_max + old_max)
            .ok_or(ConfigError::MidUnderflow {
                new_max,
                old_max,
                total_blocks: total,
            })?;

        Ok(SegmentCapacities {
            new_max,
            mid_max,
            old_max,
        })
    }
}

impl Config {
    /// Load configuration from a JSON file, falling back to defaults when
    /// the file does not exist.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        if path.exists() {
            let data = std::fs::read_to_string(path)?;
            let config: Config = serde_json::from_str(&data)?;
            Ok(config)
        } else {
            tracing::warn!("Config file not found at {:?}, using defaults", path);
            Ok(Config::default())
        }
    }
}
