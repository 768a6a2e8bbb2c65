use std::collections::BTreeSet;
use std::fmt;

// ---------------------------------------------------------------------------
// Record – one row of a point-configuration dataset
// ---------------------------------------------------------------------------

/// One tracked point at one timestamp of one configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Record {
    /// Configuration (trial) identifier.
    pub con: i64,
    /// Timestamp identifier within the configuration.
    pub tst: i64,
    /// Point (object) identifier.
    pub poi: i64,
    pub x: f64,
    pub y: f64,
}

impl Record {
    pub fn new(con: i64, tst: i64, poi: i64, x: f64, y: f64) -> Self {
        Self { con, tst, poi, x, y }
    }
}

// ---------------------------------------------------------------------------
// Cardinalities – con / tst / poi
// ---------------------------------------------------------------------------

/// Counts of configurations, timestamps and points, each inferred as
/// `max(id) + 1` over its column.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Cardinalities {
    pub con: usize,
    pub tst: usize,
    pub poi: usize,
}

impl Cardinalities {
    /// Infer cardinalities from the identifier columns.
    ///
    /// Identifiers are trusted to be dense and zero-based; an empty slice
    /// yields all zeros.
    pub fn infer(records: &[Record]) -> Self {
        fn count(ids: impl Iterator<Item = i64>) -> usize {
            ids.max()
                .map(|max| usize::try_from(max.saturating_add(1)).unwrap_or(0))
                .unwrap_or(0)
        }
        Self {
            con: count(records.iter().map(|r| r.con)),
            tst: count(records.iter().map(|r| r.tst)),
            poi: count(records.iter().map(|r| r.poi)),
        }
    }
}

impl fmt::Display for Cardinalities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "configurations: {}, timestamps: {}, points: {}",
            self.con, self.tst, self.poi
        )
    }
}

// ---------------------------------------------------------------------------
// IdAnomaly – identifier columns that break the dense/zero-based assumption
// ---------------------------------------------------------------------------

/// An identifier column whose distinct values are not exactly `0..max+1`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdAnomaly {
    pub column: &'static str,
    pub min: i64,
    pub distinct: usize,
    pub inferred: usize,
}

impl fmt::Display for IdAnomaly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ids are not dense and zero-based (min {}, {} distinct, inferred count {})",
            self.column, self.min, self.distinct, self.inferred
        )
    }
}

// ---------------------------------------------------------------------------
// PointDataset – the complete loaded dataset
// ---------------------------------------------------------------------------

/// A loaded dataset with its inferred cardinalities.
///
/// Built fresh on every load and never mutated afterwards; transforms
/// produce a new dataset instead.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointDataset {
    /// All records, in file order.
    pub records: Vec<Record>,
    pub cardinalities: Cardinalities,
}

impl PointDataset {
    pub fn from_records(records: Vec<Record>) -> Self {
        let cardinalities = Cardinalities::infer(&records);
        Self {
            records,
            cardinalities,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Report identifier columns whose values are sparse or not zero-based.
    ///
    /// Cardinalities are left as inferred; this only flags the assumption.
    pub fn id_anomalies(&self) -> Vec<IdAnomaly> {
        let columns: [(&'static str, fn(&Record) -> i64, usize); 3] = [
            ("configuration", |r: &Record| r.con, self.cardinalities.con),
            ("timestamp", |r: &Record| r.tst, self.cardinalities.tst),
            ("point", |r: &Record| r.poi, self.cardinalities.poi),
        ];

        columns
            .into_iter()
            .filter_map(|(column, id, inferred)| {
                let distinct: BTreeSet<i64> = self.records.iter().map(id).collect();
                let min = *distinct.first()?;
                (min != 0 || distinct.len() != inferred).then_some(IdAnomaly {
                    column,
                    min,
                    distinct: distinct.len(),
                    inferred,
                })
            })
            .collect()
    }
}
