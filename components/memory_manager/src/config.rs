//! Collector tuning and counters.

/// Default collection threshold and the floor it never shrinks below.
pub const DEFAULT_THRESHOLD: usize = 512 << 10;

/// Unproductive cycles in a row before the threshold doubles.
pub const DEFAULT_UNCOLLECTED_LIMIT: u32 = 4;

/// Productive cycles in a row before the threshold halves.
pub const DEFAULT_COLLECTED_LIMIT: u32 = 8;

/// Configuration for the collector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GcConfig {
    /// Allocation total that triggers a collection
    pub threshold: usize,
    /// Lowest value the adaptive threshold may take
    pub baseline: usize,
    /// Cycles freeing nothing before the threshold doubles
    pub uncollected_limit: u32,
    /// Cycles freeing something before the threshold halves
    pub collected_limit: u32,
    /// Print one line per cycle to stderr
    pub trace: bool,
}

impl Default for GcConfig {
    fn default() -> Self {
        GcConfig {
            threshold: DEFAULT_THRESHOLD,
            baseline: DEFAULT_THRESHOLD,
            uncollected_limit: DEFAULT_UNCOLLECTED_LIMIT,
            collected_limit: DEFAULT_COLLECTED_LIMIT,
            trace: false,
        }
    }
}

impl GcConfig {
    /// Default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the initial threshold; the baseline follows it down.
    pub fn with_threshold(mut self, threshold: usize) -> Self {
        self.threshold = threshold;
        self.baseline = self.baseline.min(threshold);
        self
    }

    /// Sets the threshold floor.
    pub fn with_baseline(mut self, baseline: usize) -> Self {
        self.baseline = baseline;
        self
    }

    /// Sets both adaptation limits.
    pub fn with_limits(mut self, uncollected: u32, collected: u32) -> Self {
        self.uncollected_limit = uncollected.max(1);
        self.collected_limit = collected.max(1);
        self
    }

    /// Enables per-cycle tracing.
    pub fn with_trace(mut self, trace: bool) -> Self {
        self.trace = trace;
        self
    }
}

/// Running totals kept by the collector.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct GcStats {
    /// Completed cycles
    pub cycles: u64,
    /// Collections skipped because another cycle was running
    pub skipped: u64,
    /// Blocks allocated since start
    pub allocations: u64,
    /// Bytes freed since start
    pub bytes_freed: u64,
    /// Blocks freed since start
    pub blocks_freed: u64,
    /// Bytes allocated and not yet freed
    pub live_bytes: usize,
    /// Current threshold
    pub threshold: usize,
    /// Allocations served from a pool
    pub pool_hits: u64,
    /// Allocations that needed a fresh buffer
    pub pool_misses: u64,
    /// Times the threshold doubled
    pub threshold_raises: u64,
    /// Times the threshold halved
    pub threshold_drops: u64,
}

/// Outcome of one collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleReport {
    /// 1-based cycle number
    pub cycle: u64,
    /// Blocks that survived
    pub marked: usize,
    /// Blocks freed
    pub freed_blocks: usize,
    /// Bytes freed
    pub freed_bytes: usize,
    /// Bytes live after the sweep
    pub live_bytes: usize,
    /// Threshold after adaptation
    pub threshold: usize,
}
