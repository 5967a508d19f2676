/// Data layer: core types, loading, and writing.
///
/// Architecture:
/// ```text
///  .parquet / .json / .csv
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  parse file → Capture
///   └──────────┘
///        │
///        ▼
///   ┌──────────────┐
///   │   Capture     │  DatasetGroup per (channel, shutter)
///   └──────────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  writer   │  cleaned capture / diagnostics → .csv
///   └──────────┘
/// ```

pub mod loader;
pub mod model;
pub mod writer;
