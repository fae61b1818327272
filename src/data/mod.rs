/// Data layer: tabular model and loading.
///
/// Architecture:
/// ```text
///  .csv / .tsv / .json / .parquet / .xlsx
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  parse file → Table
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  Table    │  named columns, typed cells
///   └──────────┘
///        │
///        ├──▶ charts   (plot viewer)
///        └──▶ convert  (table → JSON)
/// ```

pub mod loader;
pub mod model;
