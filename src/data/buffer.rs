//! Buffer transform: surround every tracked point with four offset copies.
//!
//! Each input record `(c, t, p, x, y)` expands into five records that share
//! `(c, t)` and carry point ids `p*5 + k`:
//!
//! | k | x            | y            |
//! |---|--------------|--------------|
//! | 0 | `x - buf_x`  | `y`          |
//! | 1 | `x + buf_x`  | `y`          |
//! | 2 | `x`          | `y`          |
//! | 3 | `x`          | `y - buf_y`  |
//! | 4 | `x`          | `y + buf_y`  |
//!
//! Coordinates are rounded to two decimals (ties to even), and the point
//! cardinality of the output is five times that of the input.

use std::path::Path;
use std::time::Instant;

use csv::{ReaderBuilder, Trim};

use super::loader::{parse_record, write_dataset, COLUMNS};
use super::model::Record;
use crate::error::{PipelineError, Result};

/// Copies emitted per input point.
pub const FAN_OUT: i64 = 5;

/// The record whose point id cannot be re-derived without overflowing.
#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
#[error("record {index}: point id {poi} is too large to buffer")]
pub struct IdOverflow {
    /// Position of the record in the input slice.
    pub index: usize,
    pub poi: i64,
}

/// Expand every record into its five buffered copies.
///
/// # Errors
///
/// Fails on the first record whose `poi * 5 + 4` does not fit in an `i64`.
pub fn buffer_transform(
    records: &[Record],
    buffer_x: f64,
    buffer_y: f64,
) -> Result<Vec<Record>, IdOverflow> {
    let mut out = Vec::with_capacity(records.len() * FAN_OUT as usize);
    for (index, r) in records.iter().enumerate() {
        let base = r
            .poi
            .checked_mul(FAN_OUT)
            .filter(|b| b.checked_add(FAN_OUT - 1).is_some())
            .ok_or(IdOverflow { index, poi: r.poi })?;
        let offsets = [
            (-buffer_x, 0.0),
            (buffer_x, 0.0),
            (0.0, 0.0),
            (0.0, -buffer_y),
            (0.0, buffer_y),
        ];
        for (k, (dx, dy)) in (0..FAN_OUT).zip(offsets) {
            out.push(Record {
                con: r.con,
                tst: r.tst,
                poi: base + k,
                x: round2(r.x + dx),
                y: round2(r.y + dy),
            });
        }
    }
    Ok(out)
}


/// Read `input`, buffer it and write the result to `output` (full rewrite).
///
/// Rows with fewer than five fields are skipped; anything past the fifth
/// field is ignored. Returns the number of records written.
pub fn buffer_file(input: &Path, output: &Path, buffer_x: f64, buffer_y: f64) -> Result<usize> {
    let started = Instant::now();
    log::info!("Buffer transformation: buffer_x={buffer_x}, buffer_y={buffer_y}");
    log::info!("Reading dataset: {}", input.display());

    if !input.exists() {
        return Err(PipelineError::NotFound {
            path: input.to_path_buf(),
        });
    }

    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .from_path(input)
        .map_err(|e| PipelineError::csv(input, e))?;

    let mut source = Vec::new();
    let mut rows = Vec::new();
    for (row_no, result) in reader.byte_records().enumerate() {
        let row = result.map_err(|e| PipelineError::csv(input, e))?;
        if row.len() < COLUMNS {
            log::debug!("{}: skipping short row {row_no}", input.display());
            continue;
        }
        source.push(parse_record(input, row_no, &row)?);
        rows.push(row_no);
    }

    let buffered = buffer_transform(&source, buffer_x, buffer_y).map_err(|e| {
        PipelineError::IdOverflow {
            path: input.to_path_buf(),
            row: rows.get(e.index).copied().unwrap_or(e.index),
            poi: e.poi,
        }
    })?;
    log::info!("Saving buffer dataset to: {}", output.display());
    write_dataset(output, &buffered)?;

    log::info!(
        "Buffer transformation wrote {} records in {:.3} sec",
        buffered.len(),
        started.elapsed().as_secs_f64()
    );
    Ok(buffered.len())
}

/// Two-decimal rounding with ties to even.
pub fn round2(v: f64) -> f64 {
    (v * 100.0).round_ties_even() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::loader::load_dataset;

    #[test]
    fn single_row_expands_in_fixed_order() {
        let out = buffer_transform(&[Record::new(0, 0, 0, 10.0, 20.0)], 2.0, 3.0).unwrap();
        assert_eq!(
            out,
            vec![
                Record::new(0, 0, 0, 8.0, 20.0),
                Record::new(0, 0, 1, 12.0, 20.0),
                Record::new(0, 0, 2, 10.0, 20.0),
                Record::new(0, 0, 3, 10.0, 17.0),
                Record::new(0, 0, 4, 10.0, 23.0),
            ]
        );
    }

    #[test]
    fn point_ids_are_rederived_and_context_kept() {
        let out = buffer_transform(&[Record::new(3, 7, 2, 0.0, 0.0)], 1.0, 1.0).unwrap();
        let ids: Vec<i64> = out.iter().map(|r| r.poi).collect();
        assert_eq!(ids, vec![10, 11, 12, 13, 14]);
        assert!(out.iter().all(|r| r.con == 3 && r.tst == 7));
    }

    #[test]
    fn coordinates_round_to_two_decimals() {
        let out =
            buffer_transform(&[Record::new(0, 0, 0, 1.234_56, 9.876_54)], 0.001, 0.001).unwrap();
        assert_eq!(out[2].x, 1.23);
        assert_eq!(out[2].y, 9.88);
        assert_eq!(out[0].x, 1.23);
        assert_eq!(out[4].y, 9.88);
    }

    #[test]
    fn exact_ties_round_to_even() {
        let out = buffer_transform(&[Record::new(0, 0, 0, 10.125, 0.125)], 0.0, 0.0).unwrap();
        assert_eq!(out[2].x, 10.12);
        assert_eq!(out[2].y, 0.12);
        assert_eq!(round2(0.375), 0.38);
    }

    #[test]
    fn oversized_point_id_is_reported_not_wrapped() {
        let input = [
            Record::new(0, 0, 1, 1.0, 1.0),
            Record::new(0, 0, 2_000_000_000_000_000_000, 1.0, 1.0),
        ];
        let err = buffer_transform(&input, 1.0, 1.0).unwrap_err();
        assert_eq!(err.index, 1);
        assert_eq!(err.poi, 2_000_000_000_000_000_000);

        let edge = (i64::MAX - 4) / FAN_OUT;
        let out = buffer_transform(&[Record::new(0, 0, edge, 0.0, 0.0)], 1.0, 1.0).unwrap();
        assert_eq!(out[4].poi, edge * FAN_OUT + 4);
    }

    #[test]
    fn file_transform_names_the_overflowing_row() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.csv");
        std::fs::write(&input, "0,0,0,1.0,1.0\n0,0\n0,0,2000000000000000000,1.0,1.0\n").unwrap();

        let err = buffer_file(&input, &dir.path().join("out.csv"), 1.0, 1.0).unwrap_err();
        assert!(!err.is_format());
        match err {
            PipelineError::IdOverflow { row, poi, .. } => {
                assert_eq!(row, 2);
                assert_eq!(poi, 2_000_000_000_000_000_000);
            }
            other => panic!("expected IdOverflow, got {other:?}"),
        }
    }

    #[test]
    fn poi_cardinality_quintuples() {
        let input: Vec<Record> = (0..3)
            .map(|p| Record::new(0, 0, p, p as f64, p as f64))
            .collect();
        let out = crate::data::model::PointDataset::from_records(
            buffer_transform(&input, 1.0, 1.0).unwrap(),
        );
        assert_eq!(out.len(), 15);
        assert_eq!(out.cardinalities.poi, 15);
    }

    #[test]
    fn empty_input_gives_empty_output() {
        assert!(buffer_transform(&[], 5.0, 5.0).unwrap().is_empty());
    }

    #[test]
    fn file_transform_skips_short_rows_and_is_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.csv");
        std::fs::write(&input, "0,0,0,10.0,20.0\n0,0\n0,1,1,3.5,4.5\n").unwrap();

        let first = dir.path().join("a.csv");
        let second = dir.path().join("b.csv");
        assert_eq!(buffer_file(&input, &first, 2.0, 3.0).unwrap(), 10);
        assert_eq!(buffer_file(&input, &second, 2.0, 3.0).unwrap(), 10);

        let a = std::fs::read(&first).unwrap();
        let b = std::fs::read(&second).unwrap();
        assert_eq!(a, b);

        let ds = load_dataset(&first).unwrap();
        assert_eq!(ds.records[0], Record::new(0, 0, 0, 8.0, 20.0));
        assert_eq!(ds.cardinalities.poi, 10);
    }

    #[test]
    fn output_is_rewritten_not_appended() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.csv");
        let output = dir.path().join("out.csv");
        std::fs::write(&input, "0,0,0,1.0,1.0\n").unwrap();
        std::fs::write(&output, "garbage\n".repeat(100)).unwrap();

        buffer_file(&input, &output, 1.0, 1.0).unwrap();
        assert_eq!(load_dataset(&output).unwrap().len(), 5);
    }

    #[test]
    fn missing_input_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = buffer_file(
            &dir.path().join("nope.csv"),
            &dir.path().join("out.csv"),
            1.0,
            1.0,
        )
        .unwrap_err();
        assert!(matches!(err, PipelineError::NotFound { .. }));
    }
}
