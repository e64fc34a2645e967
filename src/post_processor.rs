use std::{
    fs::OpenOptions,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use tracing::debug;

use crate::{datatypes::OutputRow, error::FoilgenError};

/// Column names of the output table for a given station count
///
/// # Arguments
/// * `point_count` - Cosine-spaced stations including both endpoints
///
/// # Returns
/// `10 + 2 * (point_count - 2)` column names
pub fn header(point_count: usize) -> Vec<String> {
    let stations = point_count.saturating_sub(2);
    let mut columns: Vec<String> = ["FoilID", "m", "p", "t", "Alpha", "M", "Re", "CL", "CD", "Cm"]
        .iter()
        .map(|c| c.to_string())
        .collect();
    columns.extend((1..=stations).map(|k| format!("yU{k}")));
    columns.extend((1..=stations).map(|k| format!("yL{k}")));
    columns
}

/// Floats use `{:?}` so whole numbers keep their decimal point (`-2.0`, not `-2`)
fn format_row(row: &OutputRow) -> String {
    let mut line = format!(
        "{},{},{},{},{:?},{:?},{},{:?},{:?},{:?}",
        row.foil_id,
        row.max_camber,
        row.camber_location,
        row.thickness,
        row.alpha,
        row.mach,
        row.reynolds,
        row.cl,
        row.cd,
        row.cm
    );
    for y in &row.geometry {
        line.push(',');
        line.push_str(&format!("{y:?}"));
    }
    line.push('\n');
    line
}

/// Append-only CSV sink for the sweep results
#[derive(Debug)]
pub struct OutputTable {
    path: PathBuf,
    columns: usize,
    rows_written: usize,
    batches_written: usize,
}

impl OutputTable {
    /// Creates (or truncates) the table and writes its header
    pub fn create(path: &Path, point_count: usize) -> Result<OutputTable, FoilgenError> {
        let columns = header(point_count);

        let mut file = match std::fs::File::create(path) {
            Ok(f) => f,
            Err(err) => {
                return Err(FoilgenError::Output(format!(
                    "Failed to create {}: {err}",
                    path.display()
                )));
            }
        };
        writeln!(file, "{}", columns.join(",")).map_err(|err| {
            FoilgenError::Output(format!("Failed to write header to {}: {err}", path.display()))
        })?;

        debug!(path = %path.display(), columns = columns.len(), "wrote table header");

        Ok(OutputTable {
            path: path.to_path_buf(),
            columns: columns.len(),
            rows_written: 0,
            batches_written: 0,
        })
    }

    /// Appends a batch of rows
    ///
    /// Every row must have as many fields as the header has columns;
    /// nothing is written if any row does not.
    pub fn append(&mut self, rows: &[OutputRow]) -> Result<(), FoilgenError> {
        if rows.is_empty() {
            return Ok(());
        }
        if let Some(bad) = rows.iter().find(|r| r.field_count() != self.columns) {
            return Err(FoilgenError::Output(format!(
                "Row for {} has {} fields, table has {} columns",
                bad.foil_id,
                bad.field_count(),
                self.columns
            )));
        }

        let file = match OpenOptions::new().append(true).open(&self.path) {
            Ok(f) => f,
            Err(err) => {
                return Err(FoilgenError::Output(format!(
                    "Failed to open {}: {err}",
                    self.path.display()
                )));
            }
        };

        let mut writer = BufWriter::new(file);
        for row in rows {
            writer
                .write_all(format_row(row).as_bytes())
                .map_err(|err| FoilgenError::Output(format!("Failed to write row: {err}")))?;
        }
        writer
            .flush()
            .map_err(|err| FoilgenError::Output(format!("Failed to flush table: {err}")))?;

        self.rows_written += rows.len();
        self.batches_written += 1;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    pub fn rows_written(&self) -> usize {
        self.rows_written
    }

    /// Non-empty batches appended so far
    pub fn batches_written(&self) -> usize {
        self.batches_written
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::scratch_dir;

    fn row(geometry: Vec<f64>) -> OutputRow {
        OutputRow {
            foil_id: "NACA2412".to_owned(),
            max_camber: 2,
            camber_location: 40,
            thickness: 12,
            alpha: -1.5,
            mach: 0.2,
            reynolds: 100000,
            cl: 0.25,
            cd: 0.0071,
            cm: -0.05,
            geometry,
        }
    }

    #[test]
    fn header_width_tracks_point_count() {
        for n in [3, 5, 101] {
            assert_eq!(header(n).len(), 10 + 2 * (n - 2));
        }
        let columns = header(5);
        assert_eq!(columns[0], "FoilID");
        assert_eq!(columns[9], "Cm");
        assert_eq!(&columns[10..], &["yU1", "yU2", "yU3", "yL1", "yL2", "yL3"]);
    }

    #[test]
    fn appends_rows_after_header() {
        let dir = scratch_dir("table");
        let path = dir.join("table.csv");
        let mut table = OutputTable::create(&path, 4).unwrap();

        table.append(&[row(vec![0.1, 0.2, -0.1, -0.2])]).unwrap();
        table.append(&[]).unwrap();
        table.append(&[row(vec![0.3, 0.4, -0.3, -0.4])]).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "FoilID,m,p,t,Alpha,M,Re,CL,CD,Cm,yU1,yU2,yL1,yL2");
        assert_eq!(
            lines[1],
            "NACA2412,2,40,12,-1.5,0.2,100000,0.25,0.0071,-0.05,0.1,0.2,-0.1,-0.2"
        );
        assert_eq!(table.rows_written(), 2);
        assert_eq!(table.batches_written(), 2);
    }

    #[test]
    fn whole_number_floats_keep_a_decimal_point() {
        let dir = scratch_dir("table-floats");
        let path = dir.join("table.csv");
        let mut table = OutputTable::create(&path, 4).unwrap();

        let mut whole = row(vec![0.0, 1.0, -0.0, -1.0]);
        whole.alpha = -2.0;
        whole.mach = 1.0;
        whole.cl = 0.0;
        whole.cd = 1.0;
        whole.cm = -1.0;
        table.append(&[whole]).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let fields: Vec<&str> = contents.lines().nth(1).unwrap().split(',').collect();
        assert_eq!(&fields[..4], &["NACA2412", "2", "40", "12"]);
        assert_eq!(fields[6], "100000");
        assert_eq!(&fields[4..6], &["-2.0", "1.0"]);
        assert_eq!(&fields[7..], &["0.0", "1.0", "-1.0", "0.0", "1.0", "-0.0", "-1.0"]);
    }

    #[test]
    fn rejects_row_with_wrong_width() {
        let dir = scratch_dir("table-width");
        let path = dir.join("table.csv");
        let mut table = OutputTable::create(&path, 4).unwrap();

        let result = table.append(&[row(vec![0.1, 0.2, -0.1, -0.2]), row(vec![0.1])]);
        assert!(matches!(result, Err(FoilgenError::Output(_))));
        assert_eq!(std::fs::read_to_string(&path).unwrap().lines().count(), 1);
    }

    #[test]
    fn unwritable_path_is_an_output_error() {
        let dir = scratch_dir("table-missing");
        let result = OutputTable::create(&dir.join("no/such/dir/table.csv"), 5);
        assert!(matches!(result, Err(FoilgenError::Output(_))));
    }
}
