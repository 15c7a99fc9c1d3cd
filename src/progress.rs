//! Progress reporting and display
//!
//! The importer reports through [`ProgressReporter`] so the pipeline stays
//! independent of how (or whether) progress is shown.

use std::sync::Arc;

/// Status of a single CSV row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowStatus {
    /// Downloading the featured image
    FetchingMedia,
    /// Writing the item, its terms and metadata
    Writing,
    /// Item created
    Created,
    /// Existing item updated
    Updated,
    /// Row failed with error
    Failed(String),
}

impl RowStatus {
    fn is_finished(&self) -> bool {
        matches!(self, Self::Created | Self::Updated | Self::Failed(_))
    }
}

/// Phase of the overall import.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportPhase {
    /// Parsing the CSV file
    ReadingCsv,
    /// Mapping category labels to content types
    ResolvingCategories,
    /// Downloading featured images
    FetchingMedia,
    /// Creating and updating items
    WritingItems,
    /// Completed successfully
    Completed,
    /// Aborted with error
    Failed(String),
}

/// Progress reporter trait - implement this for different display backends.
pub trait ProgressReporter: Send + Sync {
    /// Set the overall import phase.
    fn set_phase(&self, phase: ImportPhase);

    /// Register the number of data rows (call before processing starts).
    fn register_rows(&self, count: usize);

    /// Update the status of a row (1-based).
    fn update_row(&self, row: usize, status: RowStatus);

    /// Update media download progress. `done` of `total` image URLs were
    /// attempted, `fetched` of them succeeded.
    fn set_media_progress(&self, done: usize, total: usize, fetched: usize);

    /// Log a warning message.
    fn log_warn(&self, message: &str);

    /// Finish and clean up the display.
    fn finish(&self);
}

/// A no-op reporter for when progress display is disabled.
pub struct NullReporter;

impl ProgressReporter for NullReporter {
    fn set_phase(&self, _phase: ImportPhase) {}
    fn register_rows(&self, _count: usize) {}
    fn update_row(&self, _row: usize, _status: RowStatus) {}
    fn set_media_progress(&self, _done: usize, _total: usize, _fetched: usize) {}
    fn log_warn(&self, _message: &str) {}
    fn finish(&self) {}
}

/// Statistics collected during processing.
#[derive(Debug, Default)]
struct Stats {
    total_rows: usize,
    created: usize,
    updated: usize,
    failed: usize,
    media_count: usize,
    start_time: Option<std::time::Instant>,
}

impl Stats {
    fn started() -> Self {
        Self {
            start_time: Some(std::time::Instant::now()),
            ..Default::default()
        }
    }

    fn record(&mut self, status: &RowStatus) {
        match status {
            RowStatus::Created => self.created += 1,
            RowStatus::Updated => self.updated += 1,
            RowStatus::Failed(_) => self.failed += 1,
            _ => {}
        }
    }

    fn print_summary(&self) {
        let duration = self.start_time.map(|t| t.elapsed()).unwrap_or_default();

        eprintln!();
        eprintln!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        eprintln!("📊 Summary");
        eprintln!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        eprintln!("   📄 Rows:       {} total", self.total_rows);
        eprintln!("   ✨ Created:    {}", self.created);
        eprintln!("   🔁 Updated:    {}", self.updated);
        if self.failed > 0 {
            eprintln!("   ❌ Failed:     {}", self.failed);
        }
        if self.media_count > 0 {
            eprintln!("   🖼️  Images:     {}", self.media_count);
        }
        eprintln!("   ⏱️  Duration:   {:.2}s", duration.as_secs_f64());
        eprintln!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    }
}

fn phase_message(phase: &ImportPhase) -> Option<&'static str> {
    Some(match phase {
        ImportPhase::ReadingCsv => "📄 Reading CSV...",
        ImportPhase::ResolvingCategories => "🗂️  Resolving categories...",
        ImportPhase::FetchingMedia => "🖼️  Fetching images...",
        ImportPhase::WritingItems => "🗄️  Writing items...",
        ImportPhase::Completed => "✅ Completed!",
        ImportPhase::Failed(_) => return None,
    })
}

/// A simple reporter that just prints to stderr (for non-TTY).
pub struct SimpleReporter {
    stats: std::sync::RwLock<Stats>,
}

impl SimpleReporter {
    pub fn new() -> Self {
        Self {
            stats: std::sync::RwLock::new(Stats::started()),
        }
    }
}

impl Default for SimpleReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressReporter for SimpleReporter {
    fn set_phase(&self, phase: ImportPhase) {
        match phase_message(&phase) {
            Some(msg) => eprintln!("{msg}"),
            None => {
                if let ImportPhase::Failed(e) = phase {
                    eprintln!("❌ Failed: {e}");
                }
            }
        }
    }

    fn register_rows(&self, count: usize) {
        self.stats.write().unwrap().total_rows = count;
        eprintln!("   Found {count} rows");
    }

    fn update_row(&self, row: usize, status: RowStatus) {
        self.stats.write().unwrap().record(&status);
        match status {
            RowStatus::Created => eprintln!("   ✓ row {row}: created"),
            RowStatus::Updated => eprintln!("   ✓ row {row}: updated"),
            RowStatus::Failed(ref e) => eprintln!("   ✗ row {row}: {e}"),
            _ => {}
        }
    }

    fn set_media_progress(&self, done: usize, total: usize, fetched: usize) {
        self.stats.write().unwrap().media_count = fetched;
        if done == total {
            eprintln!("   Fetched {fetched} of {total} images");
        }
    }

    fn log_warn(&self, message: &str) {
        eprintln!("⚠️  {message}");
    }

    fn finish(&self) {
        self.stats.read().unwrap().print_summary();
    }
}

/// Interactive reporter with progress bars (for TTY).
pub struct FancyReporter {
    multi: indicatif::MultiProgress,
    phase_bar: indicatif::ProgressBar,
    rows: std::sync::RwLock<Option<indicatif::ProgressBar>>,
    stats: std::sync::RwLock<Stats>,
}

impl FancyReporter {
    pub fn new() -> Self {
        let multi = indicatif::MultiProgress::new();
        let phase_bar = multi.add(indicatif::ProgressBar::new_spinner());
        phase_bar.set_style(
            indicatif::ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg}")
                .unwrap(),
        );
        phase_bar.enable_steady_tick(std::time::Duration::from_millis(100));

        Self {
            multi,
            phase_bar,
            rows: std::sync::RwLock::new(None),
            stats: std::sync::RwLock::new(Stats::started()),
        }
    }
}

impl Default for FancyReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressReporter for FancyReporter {
    fn set_phase(&self, phase: ImportPhase) {
        let Some(msg) = phase_message(&phase) else {
            if let ImportPhase::Failed(e) = phase {
                self.phase_bar
                    .finish_with_message(format!("❌ Failed: {e}"));
            }
            return;
        };
        self.phase_bar.set_message(msg.to_string());

        if matches!(phase, ImportPhase::Completed) {
            self.phase_bar.finish_with_message(msg.to_string());
        }
    }

    fn register_rows(&self, count: usize) {
        self.stats.write().unwrap().total_rows = count;

        let bar = self.multi.add(indicatif::ProgressBar::new(count as u64));
        bar.set_style(
            indicatif::ProgressStyle::default_bar()
                .template("   {bar:40.cyan/blue} {pos}/{len} rows")
                .unwrap()
                .progress_chars("█▓▒░  "),
        );
        *self.rows.write().unwrap() = Some(bar);
    }

    fn update_row(&self, row: usize, status: RowStatus) {
        if !status.is_finished() {
            return;
        }
        self.stats.write().unwrap().record(&status);
        if let RowStatus::Failed(ref e) = status {
            self.multi.println(format!("❌ row {row}: {e}")).ok();
        }
        if let Some(ref bar) = *self.rows.read().unwrap() {
            bar.inc(1);
        }
    }

    fn set_media_progress(&self, done: usize, total: usize, fetched: usize) {
        self.phase_bar
            .set_message(format!("🖼️  Fetching images... ({done}/{total})"));
        self.stats.write().unwrap().media_count = fetched;
    }

    fn log_warn(&self, message: &str) {
        self.multi.println(format!("⚠️  {message}")).ok();
    }

    fn finish(&self) {
        if let Some(ref bar) = *self.rows.read().unwrap() {
            bar.finish_and_clear();
        }
        self.phase_bar.finish_and_clear();
        self.stats.read().unwrap().print_summary();
    }
}

/// Create an appropriate reporter based on terminal capabilities.
pub fn create_reporter() -> Arc<dyn ProgressReporter> {
    if console::Term::stderr().is_term() {
        Arc::new(FancyReporter::new())
    } else {
        Arc::new(SimpleReporter::new())
    }
}
