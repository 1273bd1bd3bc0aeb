//! Progress reporting for the sharded export
//!
//! One indicatif bar per shard, incremented by the owning exporter after
//! every row. Purely observational: nothing here may affect correctness,
//! and the whole layer is absent in quiet mode and in tests.

use console::style;
use humansize::{format_size, BINARY};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::time::Duration;

/// Multi-bar display for a running export
pub struct ExportProgress {
    multi: MultiProgress,
}

impl ExportProgress {
    /// Create an empty multi-bar display
    pub fn new() -> Self {
        Self {
            multi: MultiProgress::new(),
        }
    }

    /// Add a bar for one shard
    pub fn add_shard(&self, label: &str, rows_total: u64) -> ShardBar {
        let bar = self.multi.add(ProgressBar::new(rows_total));
        bar.set_style(
            ProgressStyle::with_template(
                "{prefix:>9} [{elapsed_precise}] {wide_bar:.green} {pos}/{len} ({per_sec})",
            )
            .expect("Invalid progress template")
            .progress_chars("=> "),
        );
        bar.set_prefix(label.to_string());
        ShardBar { bar }
    }
}

impl Default for ExportProgress {
    fn default() -> Self {
        Self::new()
    }
}

/// Progress bar owned by one shard exporter
pub struct ShardBar {
    bar: ProgressBar,
}

impl ShardBar {
    /// Record one processed row
    pub fn row_processed(&self) {
        self.bar.inc(1);
    }

    /// Mark the shard's bar complete
    pub fn finish(&self) {
        self.bar.finish();
    }
}

/// Format a number with thousands separators
fn format_number(n: u64) -> String {
    let s = n.to_string();
    let bytes: Vec<_> = s.bytes().rev().collect();

    let chunks: Vec<String> = bytes
        .chunks(3)
        .map(|chunk| chunk.iter().rev().map(|&b| b as char).collect::<String>())
        .collect();

    chunks.into_iter().rev().collect::<Vec<_>>().join(",")
}

/// Print a header at the start of the export
pub fn print_header(table: &str, total_rows: u64, shards: usize, output: &str) {
    println!();
    println!(
        "{} {}",
        style("csvherd").cyan().bold(),
        env!("CARGO_PKG_VERSION")
    );
    println!("{}", style("─".repeat(50)).dim());
    println!("  {} {}", style("Table:").bold(), table);
    println!("  {} {}", style("Rows:").bold(), format_number(total_rows));
    println!("  {} {}", style("Shards:").bold(), shards);
    println!("  {} {}", style("Output:").bold(), output);
    println!();
}

/// Print a summary of the export results
pub fn print_summary(
    rows: u64,
    shards: usize,
    degraded: bool,
    duration: Duration,
    output: &str,
    output_size: Option<u64>,
) {
    let duration_secs = duration.as_secs_f64();
    let rate = if duration_secs > 0.0 {
        rows as f64 / duration_secs
    } else {
        0.0
    };

    println!();
    println!("{}", style("Export Complete").green().bold());
    println!("{}", style("─".repeat(50)).dim());
    println!("  {} {}", style("Rows:").bold(), format_number(rows));
    if degraded {
        println!(
            "  {} {} {}",
            style("Shards:").bold(),
            shards,
            style("(degraded: pagination unsupported)").yellow()
        );
    } else {
        println!("  {} {}", style("Shards:").bold(), shards);
    }
    println!(
        "  {} {:.1}s ({:.0} rows/sec)",
        style("Duration:").bold(),
        duration_secs,
        rate
    );
    if let Some(size) = output_size {
        println!(
            "  {} {} ({})",
            style("Output:").bold(),
            output,
            format_size(size, BINARY)
        );
    } else {
        println!("  {} {}", style("Output:").bold(), output);
    }
    println!();
}
