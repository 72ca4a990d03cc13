/// Data layer: core types, loading, and filtering.
///
/// Architecture:
/// ```text
///  remote table store / .json / .csv / .parquet
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  fetch or parse → Table (schema checked)
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  Table    │  Vec<Record>, ordered column list
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  filter   │  apply criteria → FilterResult (borrowed rows)
///   └──────────┘
/// ```

pub mod filter;
pub mod loader;
pub mod model;
pub mod remote;
