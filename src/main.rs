//! tiered-read-cache CLI: read a byte range of a file through the cache.
//!
//! Exercises the full read path (path mapping, open, block-decomposed
//! cached reads, stats) against a backing root directory. The payload goes
//! to stdout; logs and diagnostics go to stderr.

use std::io::Write;

use clap::Parser;
use tracing::info;

use tiered_read_cache::config::{Cli, Config};
use tiered_read_cache::fs::session::FsSession;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "tiered_read_cache=debug"
    } else {
        "tiered_read_cache=info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| filter.into()),
        )
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    info!("tiered-read-cache v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::load(&cli.config)?;
    info!(
        total_blocks = config.cache.total_blocks,
        block_size = config.cache.block_size,
        old_fraction = config.cache.old_fraction,
        new_fraction = config.cache.new_fraction,
        "Configuration loaded"
    );

    let mut session = FsSession::new(&cli.root, &config.cache)?;
    let handle = session.open(&cli.path)?;

    let mut stdout = std::io::stdout().lock();
    let mut offset = cli.offset;
    let mut remaining = cli.length;
    let mut total = 0usize;
    let chunk_len = config.cache.block_size.max(1) * 16;
    let mut chunk = vec![0u8; chunk_len];

    loop {
        let want = match remaining {
            Some(r) => r.min(chunk.len()),
            None => chunk.len(),
        };
        if want == 0 {
            break;
        }
        let n = session.read(handle, offset, &mut chunk[..want])?;
        stdout.write_all(&chunk[..n])?;
        total += n;
        offset += n as i64;
        if let Some(r) = remaining.as_mut() {
            *r -= n;
        }
        // Short read means end-of-file.
        if n < want {
            break;
        }
    }
    stdout.flush()?;

    let stats = session.cache_stats();
    info!(
        bytes_read = total,
        hits = stats.hits,
        misses = stats.misses,
        insertions = stats.insertions,
        evictions = stats.evictions,
        "Read complete"
    );

    if cli.stats {
        for entry in session.cache_snapshot() {
            info!(
                segment = %entry.segment,
                file = %entry.file,
                index = entry.index,
                usage = entry.usage_count,
                len = entry.payload_len,
                "cache entry"
            );
        }
    }

    session.release(handle)?;
    Ok(())
}
