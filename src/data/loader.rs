use std::path::Path;

use csv::{ByteRecord, ReaderBuilder, Trim, WriterBuilder};

use super::model::{PointDataset, Record};
use crate::error::{PipelineError, Result};

/// Number of columns in every dataset row: `conID, tstID, poiID, x, y`.
pub const COLUMNS: usize = 5;

// ---------------------------------------------------------------------------
// Public entry-points
// ---------------------------------------------------------------------------

/// Load a headerless 5-column point-configuration CSV.
///
/// Fails fast: a single row with the wrong column count or a non-numeric
/// cell rejects the whole file. Row order is preserved.
pub fn load_dataset(path: &Path) -> Result<PointDataset> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .from_path(path)
        .map_err(|e| PipelineError::csv(path, e))?;

    let mut records = Vec::new();
    for (row_no, result) in reader.byte_records().enumerate() {
        let row = result.map_err(|e| PipelineError::csv(path, e))?;
        if row.len() != COLUMNS {
            return Err(PipelineError::ColumnCount {
                path: path.to_path_buf(),
                found: row.len(),
            });
        }
        records.push(parse_record(path, row_no, &row)?);
    }

    let dataset = PointDataset::from_records(records);
    for anomaly in dataset.id_anomalies() {
        log::warn!("{}: {anomaly}", path.display());
    }
    log::debug!(
        "Loaded {} records from {} ({})",
        dataset.len(),
        path.display(),
        dataset.cardinalities
    );
    Ok(dataset)
}

/// Write records in the same headerless 5-column layout, replacing any
/// existing file.
pub fn write_dataset(path: &Path, records: &[Record]) -> Result<()> {
    let mut writer = WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .map_err(|e| PipelineError::csv(path, e))?;

    for r in records {
        writer
            .write_record([
                r.con.to_string(),
                r.tst.to_string(),
                r.poi.to_string(),
                format_coord(r.x),
                format_coord(r.y),
            ])
            .map_err(|e| PipelineError::csv(path, e))?;
    }
    writer.flush().map_err(|e| PipelineError::io(path, e))
}

// ---------------------------------------------------------------------------
// Cell parsing
// ---------------------------------------------------------------------------

/// Largest magnitude at which every integer is exactly representable as `f64`.
const MAX_EXACT_FLOAT_ID: f64 = 9_007_199_254_740_992.0;

/// Parse the first five cells of `row` into a [`Record`].
///
/// Cells are decoded individually, so a cell that is not valid UTF-8 is
/// reported as non-numeric like any other unreadable value.
pub(crate) fn parse_record(path: &Path, row_no: usize, row: &ByteRecord) -> Result<Record> {
    let text = |column: usize| -> Result<&str> {
        let raw = row.get(column).unwrap_or(b"");
        std::str::from_utf8(raw)
            .map_err(|_| not_numeric(path, row_no, column, &String::from_utf8_lossy(raw)))
    };
    let cell = |column: usize| -> Result<f64> {
        let text = text(column)?;
        text.parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| not_numeric(path, row_no, column, text))
    };
    let id = |column: usize| -> Result<i64> {
        let text = text(column)?;
        if let Ok(v) = text.parse::<i64>() {
            return Ok(v);
        }
        // Identifiers may be written as integral floats ("3.0"), but only
        // where the float still names exactly one integer.
        match text.parse::<f64>() {
            Ok(v) if v.fract() == 0.0 && v.abs() <= MAX_EXACT_FLOAT_ID => Ok(v as i64),
            _ => Err(not_numeric(path, row_no, column, text)),
        }
    };

    Ok(Record {
        con: id(0)?,
        tst: id(1)?,
        poi: id(2)?,
        x: cell(3)?,
        y: cell(4)?,
    })
}

fn not_numeric(path: &Path, row: usize, column: usize, value: &str) -> PipelineError {
    PipelineError::NotNumeric {
        path: path.to_path_buf(),
        row,
        column,
        value: value.to_string(),
    }
}

/// Shortest round-trip text, keeping a trailing `.0` on integral values.
fn format_coord(v: f64) -> String {
    if v.is_finite() && v.fract() == 0.0 {
        format!("{v:.1}")
    } else {
        format!("{v}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::Cardinalities;

    fn write_tmp(dir: &tempfile::TempDir, name: &str, body: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn loads_records_in_order_with_cardinalities() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_tmp(
            &dir,
            "ds.csv",
            "0,0,0,1.5,2.5\n0,0,1,3,4\n0,1,0,5,6\n1,2,1,7.25,8\n",
        );

        let ds = load_dataset(&path).unwrap();
        assert_eq!(ds.len(), 4);
        assert_eq!(ds.records[0], Record::new(0, 0, 0, 1.5, 2.5));
        assert_eq!(ds.records[3], Record::new(1, 2, 1, 7.25, 8.0));
        assert_eq!(
            ds.cardinalities,
            Cardinalities {
                con: 2,
                tst: 3,
                poi: 2
            }
        );
    }

    #[test]
    fn empty_file_yields_zero_cardinalities() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_tmp(&dir, "empty.csv", "");

        let ds = load_dataset(&path).unwrap();
        assert!(ds.is_empty());
        assert_eq!(ds.cardinalities, Cardinalities::default());
    }

    #[test]
    fn wrong_column_count_is_a_format_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_tmp(&dir, "four.csv", "0,0,0,1.0\n");

        let err = load_dataset(&path).unwrap_err();
        assert!(err.is_format());
        match err {
            PipelineError::ColumnCount { path: p, found } => {
                assert_eq!(p, path);
                assert_eq!(found, 4);
            }
            other => panic!("expected ColumnCount, got {other:?}"),
        }
    }

    #[test]
    fn six_columns_is_also_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_tmp(&dir, "six.csv", "0,0,0,1.0,2.0\n0,0,1,1.0,2.0,9\n");

        let err = load_dataset(&path).unwrap_err();
        assert!(matches!(err, PipelineError::ColumnCount { found: 6, .. }));
    }

    #[test]
    fn non_numeric_cell_is_a_format_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_tmp(&dir, "bad.csv", "0,0,0,1.0,2.0\n0,0,1,abc,2.0\n");

        let err = load_dataset(&path).unwrap_err();
        assert!(err.is_format());
        match err {
            PipelineError::NotNumeric {
                row, column, value, ..
            } => {
                assert_eq!(row, 1);
                assert_eq!(column, 3);
                assert_eq!(value, "abc");
            }
            other => panic!("expected NotNumeric, got {other:?}"),
        }
    }

    #[test]
    fn header_row_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_tmp(&dir, "hdr.csv", "conID,tstID,poiID,x,y\n0,0,0,1,2\n");

        assert!(load_dataset(&path).unwrap_err().is_format());
    }

    #[test]
    fn float_encoded_ids_are_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_tmp(&dir, "f.csv", "0,1,10.0,1.0,2.0\n");

        let ds = load_dataset(&path).unwrap();
        assert_eq!(ds.records[0].poi, 10);
        assert_eq!(ds.cardinalities.poi, 11);
    }

    #[test]
    fn fractional_id_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_tmp(&dir, "frac.csv", "0,0,2.5,1.0,2.0\n");

        let err = load_dataset(&path).unwrap_err();
        assert!(matches!(err, PipelineError::NotNumeric { column: 2, .. }));
    }

    #[test]
    fn large_integer_ids_are_kept_exactly() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_tmp(&dir, "big.csv", "0,0,9007199254740993,1.0,1.0\n");

        let ds = load_dataset(&path).unwrap();
        assert_eq!(ds.records[0].poi, 9_007_199_254_740_993);
    }

    #[test]
    fn float_ids_beyond_exact_range_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_tmp(&dir, "huge.csv", "0,0,9223372036854775808.0,1.0,1.0\n");

        let err = load_dataset(&path).unwrap_err();
        assert!(matches!(err, PipelineError::NotNumeric { column: 2, .. }));

        let path = write_tmp(&dir, "inexact.csv", "0,0,9007199254740994.0,1.0,1.0\n");
        assert!(load_dataset(&path).unwrap_err().is_format());
    }

    #[test]
    fn invalid_utf8_cell_is_a_format_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bytes.csv");
        std::fs::write(&path, b"0,0,0,1.0,2.0\n0,0,1,\xff\xfe,2.0\n").unwrap();

        let err = load_dataset(&path).unwrap_err();
        assert!(err.is_format());
        assert!(matches!(
            err,
            PipelineError::NotNumeric {
                row: 1,
                column: 3,
                ..
            }
        ));
    }

    #[test]
    fn missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.csv");

        let err = load_dataset(&path).unwrap_err();
        assert!(matches!(err, PipelineError::NotFound { .. }));
    }

    #[test]
    fn written_dataset_loads_back_identically() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let records = vec![
            Record::new(0, 0, 0, 8.0, 20.0),
            Record::new(0, 0, 1, 12.35, -0.5),
        ];

        write_dataset(&path, &records).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "0,0,0,8.0,20.0\n0,0,1,12.35,-0.5\n");
        assert_eq!(load_dataset(&path).unwrap().records, records);
    }
}
