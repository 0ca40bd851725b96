//! Progress reporter implementation
//!
//! Uses indicatif for progress bars with:
//! - Item progress (rows submitted, records deleted, files uploaded)
//! - Byte transfer progress for uploads
//! - A status line naming the current item

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Progress reporter for bulk operations
pub struct ProgressReporter {
    /// Multi-progress container
    multi: MultiProgress,
    /// Item count progress bar
    items_bar: ProgressBar,
    /// Byte progress bar (uploads)
    bytes_bar: ProgressBar,
    /// Current status message
    status: ProgressBar,
    /// Start time
    start_time: Instant,
    total_items: AtomicU64,
    items_done: AtomicU64,
    total_bytes: AtomicU64,
    bytes_done: AtomicU64,
    /// Is progress enabled
    enabled: AtomicBool,
}

fn style(template: &str) -> ProgressStyle {
    ProgressStyle::default_bar()
        .template(template)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ")
}

impl ProgressReporter {
    /// Create a new progress reporter
    pub fn new() -> Self {
        let multi = MultiProgress::new();

        let status = multi.add(ProgressBar::new_spinner());
        status.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );

        let items_bar = multi.add(ProgressBar::new(0));
        items_bar.set_style(style(
            "{prefix:.bold.dim} [{bar:40.cyan/blue}] {pos}/{len} ({percent}%)",
        ));
        items_bar.set_prefix("Items");

        let bytes_bar = multi.add(ProgressBar::new(0));
        bytes_bar.set_style(style(
            "{prefix:.bold.dim} [{bar:40.green/white}] {bytes}/{total_bytes} ({bytes_per_sec}, ETA {eta})",
        ));
        bytes_bar.set_prefix("Data ");

        Self {
            multi,
            items_bar,
            bytes_bar,
            status,
            start_time: Instant::now(),
            total_items: AtomicU64::new(0),
            items_done: AtomicU64::new(0),
            total_bytes: AtomicU64::new(0),
            bytes_done: AtomicU64::new(0),
            enabled: AtomicBool::new(true),
        }
    }

    /// Create a disabled progress reporter (for quiet mode)
    pub fn disabled() -> Self {
        let reporter = Self::new();
        reporter.enabled.store(false, Ordering::SeqCst);
        reporter.multi.set_draw_target(ProgressDrawTarget::hidden());
        reporter
    }

    /// Set total items to process
    pub fn set_total_items(&self, total: u64) {
        self.total_items.store(total, Ordering::Relaxed);
        self.items_bar.set_length(total);
    }

    /// Increment processed items
    pub fn increment_items(&self, count: u64) {
        self.items_done.fetch_add(count, Ordering::Relaxed);
        self.items_bar.inc(count);
    }

    /// Add to the total bytes to transfer
    pub fn add_total_bytes(&self, bytes: u64) {
        let total = self.total_bytes.fetch_add(bytes, Ordering::Relaxed) + bytes;
        self.bytes_bar.set_length(total);
    }

    /// Increment bytes transferred
    pub fn increment_bytes(&self, bytes: u64) {
        self.bytes_done.fetch_add(bytes, Ordering::Relaxed);
        self.bytes_bar.inc(bytes);
    }

    /// Take back bytes counted for an attempt that failed
    pub fn rewind_bytes(&self, bytes: u64) {
        let previous = self
            .bytes_done
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |done| Some(done.saturating_sub(bytes)))
            .unwrap_or(0);
        self.bytes_bar.set_position(previous.saturating_sub(bytes));
    }

    /// Set current status message
    pub fn set_status(&self, msg: &str) {
        self.status.set_message(msg.to_string());
    }

    /// Name the item being processed
    pub fn set_current_item(&self, item: &str) {
        let display = if item.chars().count() > 60 {
            let tail: String = item.chars().rev().take(57).collect::<Vec<_>>().into_iter().rev().collect();
            format!("...{}", tail)
        } else {
            item.to_string()
        };
        self.status.set_message(display);
    }

    /// Get elapsed time
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Current throughput in bytes/second
    pub fn throughput(&self) -> f64 {
        let bytes = self.bytes_done.load(Ordering::Relaxed);
        let elapsed = self.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            bytes as f64 / elapsed
        } else {
            0.0
        }
    }

    /// Finish progress with success message
    pub fn finish_success(&self, message: &str) {
        self.status.finish_with_message(format!("✓ {}", message));
        self.items_bar.finish();
        self.bytes_bar.finish();
    }

    /// Finish progress with error message
    pub fn finish_error(&self, message: &str) {
        self.status.finish_with_message(format!("✗ {}", message));
        self.items_bar.abandon();
        self.bytes_bar.abandon();
    }

    /// Check if progress is enabled
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// Get progress summary
    pub fn summary(&self) -> ProgressSummary {
        ProgressSummary {
            total_items: self.total_items.load(Ordering::Relaxed),
            items_done: self.items_done.load(Ordering::Relaxed),
            total_bytes: self.total_bytes.load(Ordering::Relaxed),
            bytes_done: self.bytes_done.load(Ordering::Relaxed),
            elapsed: self.elapsed(),
            throughput: self.throughput(),
        }
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

/// Progress summary
#[derive(Debug, Clone)]
pub struct ProgressSummary {
    /// Items to process
    pub total_items: u64,
    /// Items processed so far
    pub items_done: u64,
    /// Bytes to transfer
    pub total_bytes: u64,
    /// Bytes transferred so far
    pub bytes_done: u64,
    /// Elapsed time
    pub elapsed: Duration,
    /// Throughput in bytes/second
    pub throughput: f64,
}

impl ProgressSummary {
    /// Item completion percentage
    pub fn percentage(&self) -> f64 {
        if self.total_items == 0 {
            0.0
        } else {
            (self.items_done as f64 / self.total_items as f64) * 100.0
        }
    }

    /// Print summary to console
    pub fn print(&self) {
        println!("Progress: {:.1}%", self.percentage());
        println!("Items:    {}/{}", self.items_done, self.total_items);
        if self.total_bytes > 0 {
            println!(
                "Bytes:    {}/{}",
                humansize::format_size(self.bytes_done, humansize::BINARY),
                humansize::format_size(self.total_bytes, humansize::BINARY)
            );
            println!("Speed:    {}/s", humansize::format_size(self.throughput as u64, humansize::BINARY));
        }
        println!("Elapsed:  {:.1?}", self.elapsed);
    }
}
