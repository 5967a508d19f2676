/// Deglitching engine: per-band anomaly votes reduced to record deletions.
///
/// Architecture:
/// ```text
///   TimeSeries (one channel, one shutter state)
///        │
///        ▼  for every band inside the spectral range (parallel)
///   ┌──────────┐   ┌─────────────────────────────┐   ┌───────────┐
///   │  window   │──▶│ detect: stationary / rolling │   │ threshold │
///   └──────────┘   └─────────────────────────────┘   └───────────┘
///        │               pass1, pass2                    pass3
///        ▼
///   ┌──────────┐
///   │   vote    │  OR every band into one bad index
///   └──────────┘
///        │
///        ▼
///   ┌───────────┐
///   │ eliminate  │  drop flagged records from every column
///   └───────────┘
/// ```
/// [`pipeline`] drives the above over every group of a capture.

pub mod detect;
pub mod eliminate;
pub mod pipeline;
pub mod stats;
pub mod threshold;
pub mod vote;
pub mod window;

pub use pipeline::{deglitch_capture, GroupReport, RunReport};
pub use vote::{vote_series, BandDiagnostics, Vote, VoteOutcome};
