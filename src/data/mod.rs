/// Data layer: core types, loading, writing and the buffer transform.
///
/// Architecture:
/// ```text
///  conID,tstID,poiID,x,y  (.csv, no header)
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  parse file → PointDataset (+ con/tst/poi)
///   └──────────┘
///        │
///        ▼
///   ┌──────────────┐
///   │ PointDataset  │  Vec<Record>, Cardinalities
///   └──────────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  buffer   │  5× offset copies per point → new dataset file
///   └──────────┘
/// ```

pub mod buffer;
pub mod loader;
pub mod model;
