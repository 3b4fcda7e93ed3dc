//! `skytrack-perception` – Fusion engine.
//!
//! Merges concurrent per-source observations (vision, thermal, audio) into a
//! single estimate with a quality status.
//!
//! # Modules
//!
//! - [`fusion`] – [`fuse`][fusion::fuse]: confidence-weighted merge of up to
//!   three per-sensor [`Observation`][skytrack_types::Observation]s, plus the
//!   legacy two-source [`fuse_pair`][fusion::fuse_pair] variant.
//! - [`batch`] – [`fuse_run`][batch::fuse_run]: offline pass over a run's
//!   per-source logs in monotonic order, with the cross-source staleness
//!   window that live polling does not need.
//! - [`tailer`] – [`FusionTailer`][tailer::FusionTailer]: live tailer that
//!   polls each per-source log on a fixed interval, retains the latest value
//!   per source, and emits merged records on its own timer.

pub mod batch;
pub mod fusion;
pub mod tailer;

pub use batch::{BatchFusionConfig, fuse_run};
pub use fusion::{fuse, fuse_pair, weight};
pub use tailer::{FusionTailer, LogTail, TailerConfig};
