//! CSV reading and writing for [`RawTable`].

use crate::dataset::{DatasetError, RawTable};
use csv::{ReaderBuilder, WriterBuilder};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// Load a headed CSV file into a [`RawTable`].
///
/// All cells are kept as text; numeric interpretation happens later in the
/// [`TypeNormalizer`](crate::preprocessing::TypeNormalizer).
///
/// # Errors
/// - [`DatasetError::Io`] if the file is absent or unreadable
/// - [`DatasetError::Csv`] for ragged records or invalid UTF-8
/// - [`DatasetError::EmptyData`] if there is no header or no data row
pub fn load_csv<P: AsRef<Path>>(path: P) -> Result<RawTable, DatasetError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| DatasetError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    read_csv(BufReader::new(file))
}

/// Parse CSV from any reader. The first record is the header.
pub fn read_csv<R: Read>(reader: R) -> Result<RawTable, DatasetError> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(false)
        .from_reader(reader);

    let headers: Vec<String> = rdr.headers()?.iter().map(str::to_string).collect();
    if headers.is_empty() || headers.iter().all(String::is_empty) {
        return Err(DatasetError::EmptyData("CSV has no header".to_string()));
    }

    let mut rows = Vec::new();
    for result in rdr.records() {
        let record = result?;
        rows.push(record.iter().map(str::to_string).collect());
    }

    if rows.is_empty() {
        return Err(DatasetError::EmptyData("CSV has no data rows".to_string()));
    }

    RawTable::new(headers, rows)
}

impl RawTable {
    /// Write the table as a headed CSV file.
    pub fn write_csv<P: AsRef<Path>>(&self, path: P) -> Result<(), DatasetError> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|source| DatasetError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut writer = WriterBuilder::new().from_writer(file);
        writer.write_record(self.headers())?;
        for row in self.rows() {
            writer.write_record(row)?;
        }
        writer.flush().map_err(|source| DatasetError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_read_csv_keeps_text() {
        let data = "X,user_name,roll_belt,classe\n1,carlitos,1.41,A\n2,pedro,#DIV/0!,B\n";
        let table = read_csv(data.as_bytes()).unwrap();
        assert_eq!(table.n_rows(), 2);
        assert_eq!(table.headers()[3], "classe");
        assert_eq!(table.rows()[1][2], "#DIV/0!");
    }

    #[test]
    fn test_read_csv_quoted_empty_cells() {
        let data = "a,b\n\"\",\"2\"\n";
        let table = read_csv(data.as_bytes()).unwrap();
        assert_eq!(table.rows()[0], vec!["".to_string(), "2".to_string()]);
    }

    #[test]
    fn test_read_csv_rejects_ragged() {
        let data = "a,b,c\n1,2,3\n4,5\n";
        assert!(matches!(
            read_csv(data.as_bytes()),
            Err(DatasetError::Csv(_))
        ));
    }

    #[test]
    fn test_read_csv_rejects_header_only() {
        let data = "a,b,classe\n";
        assert!(matches!(
            read_csv(data.as_bytes()),
            Err(DatasetError::EmptyData(_))
        ));
    }

    #[test]
    fn test_load_csv_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_csv(dir.path().join("absent.csv"));
        assert!(matches!(result, Err(DatasetError::Io { .. })));
    }

    #[test]
    fn test_write_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("table.csv");
        let table = RawTable::new(
            vec!["a".to_string(), "classe".to_string()],
            vec![
                vec!["1.5".to_string(), "A".to_string()],
                vec!["".to_string(), "B".to_string()],
            ],
        )
        .unwrap();
        table.write_csv(&path).unwrap();
        assert_eq!(load_csv(&path).unwrap(), table);
    }

    #[test]
    fn test_load_csv_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "x,classe").unwrap();
        writeln!(file, "3,C").unwrap();
        let table = load_csv(file.path()).unwrap();
        assert_eq!(table.n_rows(), 1);
        assert_eq!(table.n_cols(), 2);
    }
}
