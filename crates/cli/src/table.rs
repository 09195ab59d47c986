//! Comma-separated point tables
//!
//! Input rows are `x,y,value` (points) or `x,y[,...]` (targets). A header is
//! accepted as the first non-comment line when its first field is not a
//! number. Lines starting with `#` and blank lines are skipped.

use anyhow::{bail, Context, Result};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use geokrige_algorithms::interpolation::{Prediction, SamplePoint};

/// Numeric rows of a table, with their 1-based line numbers
fn parse_rows<R: BufRead>(reader: R, min_fields: usize) -> Result<Vec<(usize, Vec<f64>)>> {
    let mut rows = Vec::new();
    let mut seen_content = false;

    for (idx, line) in reader.lines().enumerate() {
        let line_no = idx + 1;
        let line = line.with_context(|| format!("Failed to read line {}", line_no))?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let fields: Vec<&str> = trimmed.split(',').map(str::trim).collect();
        let first_content = !seen_content;
        seen_content = true;
        if first_content && fields[0].parse::<f64>().is_err() {
            continue;
        }

        if fields.len() < min_fields {
            bail!(
                "Line {}: expected at least {} fields, got {}",
                line_no,
                min_fields,
                fields.len()
            );
        }
        let values = fields[..min_fields]
            .iter()
            .map(|f| {
                f.parse::<f64>()
                    .with_context(|| format!("Line {}: invalid number '{}'", line_no, f))
            })
            .collect::<Result<Vec<f64>>>()?;
        rows.push((line_no, values));
    }

    Ok(rows)
}

pub fn parse_points<R: BufRead>(reader: R) -> Result<Vec<SamplePoint>> {
    Ok(parse_rows(reader, 3)?
        .into_iter()
        .map(|(_, v)| SamplePoint::new(v[0], v[1], v[2]))
        .collect())
}

pub fn parse_targets<R: BufRead>(reader: R) -> Result<Vec<(f64, f64)>> {
    Ok(parse_rows(reader, 2)?
        .into_iter()
        .map(|(_, v)| (v[0], v[1]))
        .collect())
}

pub fn read_points(path: &Path) -> Result<Vec<SamplePoint>> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    parse_points(BufReader::new(file))
        .with_context(|| format!("Failed to parse points from {}", path.display()))
}

pub fn read_targets(path: &Path) -> Result<Vec<(f64, f64)>> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    parse_targets(BufReader::new(file))
        .with_context(|| format!("Failed to parse targets from {}", path.display()))
}

pub fn write_predictions<W: Write>(mut writer: W, predictions: &[Prediction]) -> Result<()> {
    writeln!(writer, "x,y,prediction,variance")?;
    for p in predictions {
        writeln!(writer, "{},{},{},{}", p.x, p.y, p.value, p.variance)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn save_predictions(path: &Path, predictions: &[Prediction]) -> Result<()> {
    let file =
        File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    write_predictions(BufWriter::new(file), predictions)
}
