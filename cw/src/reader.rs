//! Typed CSV rows keyed by header field names.

use std::io::BufRead;

use csv::ByteRecord;
use dw::InputSource;
use dw::text::{TextErrors, decode_bytes};
use indexmap::IndexMap;
use tracing::{debug, info};

use crate::dialect::Dialect;
use crate::error::Result;
use crate::metadata::FieldTypes;
use crate::value::Value;

/// One CSV row in header order.
pub type Row = IndexMap<String, Value>;

/// Reads the header of `source`, then yields typed rows.
///
/// Cells of fields declared in the metadata are deserialized unless empty;
/// all other cells stay strings. A row shorter than the header gets `Null`
/// for the missing fields.
pub struct TypedReader {
    name: String,
    is_stdin: bool,
    reader: csv::Reader<Box<dyn BufRead>>,
    fieldnames: Vec<String>,
    types: FieldTypes,
    errors: TextErrors,
    record: ByteRecord,
}

/// Decode every cell of a raw record.
pub(crate) fn decode_record(record: &ByteRecord, errors: TextErrors) -> Result<Vec<String>> {
    let line = record.position().map_or(0, |pos| pos.line() as usize);
    let mut cells = Vec::with_capacity(record.len());
    for cell in record.iter() {
        cells.push(decode_bytes(cell.to_vec(), errors, line)?);
    }
    Ok(cells)
}

impl TypedReader {
    pub fn open(source: &InputSource, dialect: &Dialect, types: FieldTypes, errors: TextErrors) -> Result<Self> {
        source.validate()?;
        let mut reader = dialect.reader_builder().from_reader(source.open()?);
        let fieldnames = decode_record(reader.byte_headers()?, errors)?;
        debug!("Found fieldnames=={:?} in input_file=='{}'", fieldnames, source);
        Ok(Self {
            name: source.to_string(),
            is_stdin: source.is_stdin(),
            reader,
            fieldnames,
            types,
            errors,
            record: ByteRecord::new(),
        })
    }

    pub fn fieldnames(&self) -> &[String] {
        &self.fieldnames
    }

    pub fn field_types(&self) -> &FieldTypes {
        &self.types
    }

    fn row(&self) -> Result<Row> {
        let mut cells = decode_record(&self.record, self.errors)?.into_iter();
        let mut row = Row::with_capacity(self.fieldnames.len());
        for field in &self.fieldnames {
            let value = match (cells.next(), self.types.get(field)) {
                (None, _) => Value::Null,
                (Some(cell), Some(kind)) if !cell.is_empty() => kind.deserialize(field, &cell)?,
                (Some(cell), _) => Value::Str(cell),
            };
            row.insert(field.clone(), value);
        }
        Ok(row)
    }
}

impl Iterator for TypedReader {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.reader.read_byte_record(&mut self.record) {
            Ok(true) => Some(self.row()),
            Ok(false) => None,
            Err(err) => Some(Err(err.into())),
        }
    }
}

impl Drop for TypedReader {
    fn drop(&mut self) {
        if !self.is_stdin {
            info!("Closing input_file=='{}'", self.name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{FieldType, IntFormat};
    use std::io::Write;
    use std::path::PathBuf;
    use tempfile::NamedTempFile;

    fn fixture(name: &str) -> InputSource {
        InputSource::from(PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("specs").join(name))
    }

    #[test]
    fn test_reads_plain_rows() {
        let reader = TypedReader::open(&fixture("sales.csv"), &Dialect::default(), FieldTypes::new(), TextErrors::Strict)
            .unwrap();
        assert_eq!(reader.fieldnames(), ["region", "product", "qty", "price"]);
        let rows: Vec<Row> = reader.collect::<Result<_>>().unwrap();
        assert_eq!(rows.len(), 5);
        assert_eq!(rows[0]["qty"], Value::from("3"));
        assert_eq!(rows[4]["qty"], Value::from(""));
    }

    #[test]
    fn test_deserializes_typed_fields() {
        let mut types = FieldTypes::new();
        types.insert("qty".to_string(), FieldType::Int(IntFormat::Auto));
        types.insert("price".to_string(), FieldType::Float);
        let reader = TypedReader::open(&fixture("sales.csv"), &Dialect::default(), types, TextErrors::Strict).unwrap();
        let rows: Vec<Row> = reader.collect::<Result<_>>().unwrap();
        assert_eq!(rows[0]["qty"], Value::Int(3));
        assert_eq!(rows[0]["price"], Value::Float(1.5));
        // empty cells are left alone
        assert_eq!(rows[4]["qty"], Value::from(""));
    }

    #[test]
    fn test_short_rows_and_dialect() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "a;b;c\n1;'x;y'\n").unwrap();
        let dialect = Dialect {
            input_delimiter: b';',
            input_quotechar: b'\'',
            ..Dialect::default()
        };
        let source = InputSource::from(file.path());
        let rows: Vec<Row> = TypedReader::open(&source, &dialect, FieldTypes::new(), TextErrors::Strict)
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["b"], Value::from("x;y"));
        assert_eq!(rows[0]["c"], Value::Null);
    }

    #[test]
    fn test_bad_typed_cell_is_an_error() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "n\nten\n").unwrap();
        let mut types = FieldTypes::new();
        types.insert("n".to_string(), FieldType::Int(IntFormat::Auto));
        let mut reader =
            TypedReader::open(&InputSource::from(file.path()), &Dialect::default(), types, TextErrors::Strict).unwrap();
        let err = reader.next().unwrap().unwrap_err();
        assert_eq!(err.to_string(), "cannot read 'ten' as int in field 'n'");
    }

    #[test]
    fn test_invalid_utf8_follows_policy() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"name\nab\xffc\n").unwrap();
        let source = InputSource::from(file.path());
        let mut strict = TypedReader::open(&source, &Dialect::default(), FieldTypes::new(), TextErrors::Strict).unwrap();
        assert!(strict.next().unwrap().is_err());
        let mut ignore = TypedReader::open(&source, &Dialect::default(), FieldTypes::new(), TextErrors::Ignore).unwrap();
        assert_eq!(ignore.next().unwrap().unwrap()["name"], Value::from("abc"));
    }

    #[test]
    fn test_missing_input() {
        let source = InputSource::from("/nonexistent/in.csv");
        assert!(TypedReader::open(&source, &Dialect::default(), FieldTypes::new(), TextErrors::Strict).is_err());
    }
}
