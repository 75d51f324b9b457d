//! Progress callbacks for batch loops.

/// Progress callback for reporting batch status.
pub trait BatchProgress: Send + Sync {
    /// Called when entering a new phase (`Fetching listing`, `Updating`).
    fn phase(&self, name: &str);
    /// Called before each item is processed; `current` is 1-based.
    fn item(&self, label: &str, current: usize, total: usize);
    /// Called once when the batch completes.
    fn finish(&self, summary: &str);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl BatchProgress for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn item(&self, _label: &str, _current: usize, _total: usize) {}
    fn finish(&self, _summary: &str) {}
}
