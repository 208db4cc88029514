//! Benchmark-only crate; the targets live in `benches/`.
