//! Typed CSV output.

use std::io::{self, Write};

use dw::{OutputTarget, PipelineError};
use tracing::{debug, info};

use crate::dialect::Dialect;
use crate::error::Result;
use crate::metadata::FieldTypes;
use crate::reader::Row;

/// Writes rows in a fixed field order, serializing typed fields.
pub struct TypedWriter {
    target: OutputTarget,
    writer: csv::Writer<Box<dyn Write>>,
    fieldnames: Vec<String>,
    types: FieldTypes,
    written: usize,
    closed: bool,
}

fn is_broken_pipe(err: &csv::Error) -> bool {
    matches!(err.kind(), csv::ErrorKind::Io(e) if e.kind() == io::ErrorKind::BrokenPipe)
}

impl TypedWriter {
    pub fn open(target: &OutputTarget, dialect: &Dialect, fieldnames: Vec<String>, types: FieldTypes) -> Result<Self> {
        let writer = dialect.writer_builder().from_writer(target.open()?);
        Ok(Self {
            target: target.clone(),
            writer,
            fieldnames,
            types,
            written: 0,
            closed: false,
        })
    }

    pub fn fieldnames(&self) -> &[String] {
        &self.fieldnames
    }

    pub fn write_header(&mut self) -> Result<()> {
        debug!("Writing header fieldnames=={:?}", self.fieldnames);
        let header = self.fieldnames.clone();
        self.write_raw(&header)
    }

    /// Write `row` in field order; fields it lacks are left empty.
    pub fn write_row(&mut self, row: &Row) -> Result<()> {
        let mut cells = Vec::with_capacity(self.fieldnames.len());
        for field in &self.fieldnames {
            let cell = match (row.get(field), self.types.get(field)) {
                (None, _) => String::new(),
                (Some(value), Some(kind)) => kind.serialize(field, value)?,
                (Some(value), None) => value.to_string(),
            };
            cells.push(cell);
        }
        self.write_record(&cells)
    }

    /// Write raw cells, bypassing field order and types.
    pub fn write_record<I, S>(&mut self, cells: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<[u8]>,
    {
        self.write_raw(cells)?;
        self.written += 1;
        Ok(())
    }

    // A closed stdout reader (`cw csv to-csv big.csv | head`) ends output quietly.
    fn write_raw<I, S>(&mut self, cells: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<[u8]>,
    {
        if self.closed {
            return Ok(());
        }
        match self.writer.write_record(cells) {
            Ok(()) => Ok(()),
            Err(err) if self.target.is_stdout() && is_broken_pipe(&err) => {
                debug!(written = self.written, "stdout closed by reader");
                self.closed = true;
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Flush the output and return the number of records written after the header.
    pub fn finish(mut self) -> Result<usize> {
        if self.closed {
            return Ok(self.written);
        }
        if let Err(err) = self.writer.flush() {
            if self.target.is_stdout() && err.kind() == io::ErrorKind::BrokenPipe {
                debug!(written = self.written, "stdout closed by reader");
                return Ok(self.written);
            }
            return Err(PipelineError::io(self.target.to_string(), err).into());
        }
        if !self.target.is_stdout() {
            info!("Closing output_file=='{}'", self.target);
        }
        Ok(self.written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::Quoting;
    use crate::metadata::{FieldType, IntFormat};
    use crate::value::Value;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_writes_typed_rows() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/out.csv");
        let mut types = FieldTypes::new();
        types.insert("id".to_string(), FieldType::Int(IntFormat::Hex));
        let fieldnames = vec!["id".to_string(), "name".to_string(), "score".to_string()];
        let mut writer =
            TypedWriter::open(&OutputTarget::from(path.as_path()), &Dialect::default(), fieldnames, types).unwrap();
        writer.write_header().unwrap();
        let mut row = Row::new();
        row.insert("name".to_string(), Value::from("a, b"));
        row.insert("id".to_string(), Value::Int(255));
        row.insert("score".to_string(), Value::Float(2.0));
        writer.write_row(&row).unwrap();
        let mut sparse = Row::new();
        sparse.insert("name".to_string(), Value::from("c"));
        writer.write_row(&sparse).unwrap();
        assert_eq!(writer.finish().unwrap(), 2);
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "id,name,score\n0xff,\"a, b\",2.0\n,c,\n"
        );
    }

    #[test]
    fn test_output_dialect() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.csv");
        let dialect = Dialect {
            output_delimiter: b'\t',
            output_quoting: Quoting::NonNumeric,
            ..Dialect::default()
        };
        let mut writer =
            TypedWriter::open(&OutputTarget::from(path.as_path()), &dialect, vec![], FieldTypes::new()).unwrap();
        writer.write_record(["a", "1"]).unwrap();
        writer.finish().unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "\"a\"\t1\n");
    }
}
