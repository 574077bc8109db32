//! Tooling primitives for behavior tree interpreters.
//!
//! This crate is intentionally lightweight and engine-agnostic. It only defines the event model
//! the interpreter emits while it drives its stacks; rendering those events (timelines,
//! inspectors, editor overlays) belongs in adapter crates.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![forbid(unsafe_code)]

pub mod trace;

pub use trace::{NullTraceSink, SharedTraceLog, TraceEvent, TraceLog, TraceSink, VecTraceSink};
