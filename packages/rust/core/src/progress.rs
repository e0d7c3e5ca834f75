//! Progress callbacks for stage runs.

use almanac_shared::StageReport;

/// Progress callback for reporting stage status.
pub trait StageProgress: Send + Sync {
    /// Called when entering a new phase (e.g. a season's index page).
    fn phase(&self, name: &str);
    /// Called before each item (metric or file) is processed.
    fn item(&self, name: &str, current: usize, total: usize);
    /// Called once the stage report is final.
    fn done(&self, report: &StageReport);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl StageProgress for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn item(&self, _name: &str, _current: usize, _total: usize) {}
    fn done(&self, _report: &StageReport) {}
}
