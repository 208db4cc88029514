//! Trace execution engine.
//!
//! Each case replays against its own fresh heap. Every live payload is
//! filled with a deterministic per-id byte pattern; the pattern is
//! verified immediately before the binding is consumed and once more at
//! the end of the trace, so any cross-block corruption surfaces as a
//! failed case. The heap's own consistency checker runs after every
//! operation.

use std::collections::HashMap;

use serde::Serialize;
use tagheap_core::{Heap, HeapConfig};

use crate::error::HarnessError;
use crate::fixtures::{TraceCase, TraceOp, TraceSet};

/// Outcome of replaying one trace case.
#[derive(Debug, Clone, Serialize)]
pub struct VerificationResult {
    /// Case identifier from the fixture.
    pub case_name: String,
    /// Whether the whole trace replayed without a violation.
    pub passed: bool,
    /// Operations executed before the trace ended or failed.
    pub ops_executed: usize,
    /// First failure description, if any.
    pub failure: Option<String>,
}

/// Replays trace fixtures against fresh heap instances.
pub struct TraceRunner {
    campaign: String,
    config: HeapConfig,
}

impl TraceRunner {
    /// Creates a runner labeled with a campaign name.
    #[must_use]
    pub fn new(campaign: impl Into<String>) -> Self {
        Self {
            campaign: campaign.into(),
            config: HeapConfig::default(),
        }
    }

    /// Overrides the heap configuration used for each replay.
    #[must_use]
    pub fn with_heap_config(mut self, config: HeapConfig) -> Self {
        self.config = config;
        self
    }

    /// Campaign label for reports.
    #[must_use]
    pub fn campaign(&self) -> &str {
        &self.campaign
    }

    /// Runs every case in a set, each against its own fresh heap.
    pub fn run(&self, set: &TraceSet) -> Result<Vec<VerificationResult>, HarnessError> {
        set.cases.iter().map(|case| self.replay(case)).collect()
    }

    /// Replays one case and reports the first violation, if any.
    pub fn replay(&self, case: &TraceCase) -> Result<VerificationResult, HarnessError> {
        let mut heap = Heap::with_config(self.config);
        // id -> (payload offset, requested size)
        let mut live: HashMap<u32, (usize, usize)> = HashMap::new();
        let mut failure: Option<String> = None;
        let mut executed = 0;

        for op in &case.ops {
            match op {
                TraceOp::Malloc { id, size } => {
                    if live.contains_key(id) {
                        return Err(HarnessError::DuplicateId {
                            case: case.name.clone(),
                            id: *id,
                        });
                    }
                    match heap.allocate(*size) {
                        Some(ptr) => {
                            fill(&mut heap, ptr, *size, pattern(*id));
                            live.insert(*id, (ptr, *size));
                        }
                        None if *size == 0 => {}
                        None => {
                            failure = Some(format!("op {executed}: malloc({size}) failed"));
                        }
                    }
                }
                TraceOp::Free { id } => {
                    let Some((ptr, size)) = live.remove(id) else {
                        return Err(HarnessError::UnknownId {
                            case: case.name.clone(),
                            id: *id,
                        });
                    };
                    if verify(&heap, ptr, size, pattern(*id)) {
                        heap.release(ptr);
                    } else {
                        failure =
                            Some(format!("op {executed}: payload {id} corrupted before free"));
                    }
                }
                TraceOp::Realloc { id, size } if *size == 0 => {
                    let Some((ptr, _)) = live.remove(id) else {
                        return Err(HarnessError::UnknownId {
                            case: case.name.clone(),
                            id: *id,
                        });
                    };
                    if heap.resize(ptr, 0).is_some() {
                        failure = Some(format!(
                            "op {executed}: zero-size realloc returned a block for id {id}"
                        ));
                    }
                }
                TraceOp::Realloc { id, size } => {
                    let Some(&(ptr, old)) = live.get(id) else {
                        return Err(HarnessError::UnknownId {
                            case: case.name.clone(),
                            id: *id,
                        });
                    };
                    if !verify(&heap, ptr, old, pattern(*id)) {
                        failure =
                            Some(format!("op {executed}: payload {id} corrupted before realloc"));
                    } else {
                        match heap.resize(ptr, *size) {
                            Some(new_ptr) => {
                                let kept = old.min(*size);
                                if verify(&heap, new_ptr, kept, pattern(*id)) {
                                    fill(&mut heap, new_ptr, *size, pattern(*id));
                                    live.insert(*id, (new_ptr, *size));
                                } else {
                                    failure = Some(format!(
                                        "op {executed}: realloc dropped preserved prefix of id {id}"
                                    ));
                                }
                            }
                            None => {
                                failure = Some(format!(
                                    "op {executed}: realloc({size}) failed for id {id}"
                                ));
                            }
                        }
                    }
                }
                TraceOp::Calloc { id, count, size } => {
                    if live.contains_key(id) {
                        return Err(HarnessError::DuplicateId {
                            case: case.name.clone(),
                            id: *id,
                        });
                    }
                    let total = count.checked_mul(*size);
                    match heap.zero_allocate(*count, *size) {
                        Some(ptr) => {
                            let total = total.unwrap_or_default();
                            if verify(&heap, ptr, total, 0) {
                                fill(&mut heap, ptr, total, pattern(*id));
                                live.insert(*id, (ptr, total));
                            } else {
                                failure = Some(format!(
                                    "op {executed}: calloc payload {id} not zero-filled"
                                ));
                            }
                        }
                        // Overflowing products are expected to fail.
                        None if total.is_none() || total == Some(0) => {}
                        None => {
                            failure = Some(format!(
                                "op {executed}: calloc({count}, {size}) failed"
                            ));
                        }
                    }
                }
            }
            executed += 1;
            if failure.is_none() && !heap.check() {
                failure = Some(format!("op {}: heap check failed", executed - 1));
            }
            if failure.is_some() {
                break;
            }
        }

        if failure.is_none() {
            for (id, (ptr, size)) in &live {
                if !verify(&heap, *ptr, *size, pattern(*id)) {
                    failure = Some(format!("outstanding payload {id} corrupted"));
                    break;
                }
            }
        }

        Ok(VerificationResult {
            case_name: case.name.clone(),
            passed: failure.is_none(),
            ops_executed: executed,
            failure,
        })
    }
}

/// Deterministic fill byte for a trace id.
fn pattern(id: u32) -> u8 {
    (id as u8).wrapping_mul(0x9D).wrapping_add(0x2F)
}

fn fill(heap: &mut Heap, ptr: usize, len: usize, byte: u8) {
    heap.payload_mut(ptr).expect("live block")[..len].fill(byte);
}

fn verify(heap: &Heap, ptr: usize, len: usize, byte: u8) -> bool {
    heap.payload(ptr)
        .is_some_and(|payload| payload[..len].iter().all(|&b| b == byte))
}
