/// Data layer: core types, loading, and filtering.
///
/// Architecture:
/// ```text
///  .xlsx / .csv / .json / .parquet
///        │
///        ▼
///   ┌──────────┐
///   │  loader  │  parse file → SignalTable
///   └──────────┘
///        │
///        ▼
///   ┌─────────────┐
///   │ SignalTable │  rows × columns, kinds, unique values
///   └─────────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  filter  │  stage A → stage B (row indices) + probabilities
///   └──────────┘
/// ```

pub mod loader;
pub mod model;
pub mod filter;
