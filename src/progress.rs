//! Progress event sink — spec.md §5: "Long operations emit progress events
//! to an injectable sink (`on_progress(phase, current, total)`)".
//!
//! Kept as a plain trait rather than tying the core to `indicatif` directly,
//! the same decoupling the teacher achieves informally by confining all
//! `ProgressBar` construction to `cli.rs` — here it's made explicit so tests
//! can supply [`NoopProgress`] instead of a terminal.

/// A phase of a long-running indexer operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Walking,
    Extracting,
    Embedding,
    Storing,
}

impl Phase {
    pub fn label(&self) -> &'static str {
        match self {
            Phase::Walking => "walking",
            Phase::Extracting => "extracting",
            Phase::Embedding => "embedding",
            Phase::Storing => "storing",
        }
    }
}

/// Receives progress updates during `build`/`update`. `current`/`total` are
/// in whatever unit the phase counts in (files for walking/extracting,
/// blocks for embedding/storing); `total` may be `0` if not yet known.
pub trait ProgressSink: Send + Sync {
    fn on_progress(&self, phase: Phase, current: usize, total: usize);
}

/// A sink that discards every event — the default for library callers and
/// tests that don't care about progress reporting.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopProgress;

impl ProgressSink for NoopProgress {
    fn on_progress(&self, _phase: Phase, _current: usize, _total: usize) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingProgress {
        calls: AtomicUsize,
    }

    impl ProgressSink for CountingProgress {
        fn on_progress(&self, _phase: Phase, _current: usize, _total: usize) {
            self.calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_progress_accepts_any_call() {
        let sink = NoopProgress;
        sink.on_progress(Phase::Walking, 1, 10);
    }

    #[test]
    fn custom_sink_counts_calls() {
        let sink = CountingProgress { calls: AtomicUsize::new(0) };
        sink.on_progress(Phase::Embedding, 0, 5);
        sink.on_progress(Phase::Embedding, 5, 5);
        assert_eq!(sink.calls.load(Ordering::SeqCst), 2);
    }
}
