//! CSV export of layer summaries.

use std::io::Write;
use std::path::Path;

use crate::summary::LayerSummary;

use super::ExportError;

/// Writes summary rows as `label,band,years_bp,mean,q1,median,q3`.
pub fn write_summary_csv<W: Write>(writer: W, rows: &[LayerSummary]) -> Result<(), ExportError> {
    let mut out = csv::Writer::from_writer(writer);
    for row in rows {
        out.serialize(row)?;
    }
    out.flush()?;
    Ok(())
}

/// Writes summary rows to a file.
pub fn export_summary_csv(path: &Path, rows: &[LayerSummary]) -> Result<(), ExportError> {
    let file = std::fs::File::create(path)?;
    write_summary_csv(std::io::BufWriter::new(file), rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_csv_layout() {
        let rows = vec![LayerSummary {
            label: "rice".into(),
            band: "central",
            years_bp: 4000.0,
            mean: 12.5,
            q1: 0.0,
            median: 10.0,
            q3: 25.0,
        }];
        let mut buf = Vec::new();
        write_summary_csv(&mut buf, &rows).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("label,band,years_bp,mean,q1,median,q3"));
        assert_eq!(lines.next(), Some("rice,central,4000.0,12.5,0.0,10.0,25.0"));
    }
}
