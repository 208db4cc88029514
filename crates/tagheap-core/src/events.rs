//! Structured lifecycle events.
//!
//! The heap records its own decision trail as typed records owned by the
//! instance rather than writing to a process-global logger; callers
//! inspect or drain the trail when they want observability. Usage
//! violations (double release, foreign offsets) and validator failures
//! surface here as warnings and errors.

/// Event severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

/// One structured heap lifecycle record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeapEvent {
    /// Monotonic decision/event id.
    pub decision_id: u64,
    /// Correlation id for this record.
    pub trace_id: String,
    /// Severity level.
    pub level: EventLevel,
    /// Request operation (`allocate`, `release`, `resize`,
    /// `zero_allocate`, `init`, `grow`, `check`).
    pub symbol: &'static str,
    /// Event kind (`alloc`, `double_release`, `region_extended`, ...).
    pub event: &'static str,
    /// Region offset involved in the event.
    pub offset: Option<usize>,
    /// Size value involved in the event.
    pub size: Option<usize>,
    /// Size class involved in the event.
    pub class: Option<usize>,
    /// Machine-readable outcome label.
    pub outcome: &'static str,
    /// Free-form details for debugging.
    pub details: String,
    /// Snapshot: blocks currently allocated.
    pub active_count: usize,
    /// Snapshot: usable payload bytes currently allocated.
    pub total_allocated: usize,
}
