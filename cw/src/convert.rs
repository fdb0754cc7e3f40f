//! Dialect conversion, plain or typed.

use csv::ByteRecord;
use dw::text::TextErrors;
use dw::{InputSource, OutputTarget};
use tracing::info;

use crate::dialect::Dialect;
use crate::error::Result;
use crate::metadata::FieldTypes;
use crate::reader::{TypedReader, decode_record};
use crate::writer::TypedWriter;

/// Copy every record of `input` to `output`, switching from the input to the
/// output dialect. The header is an ordinary record here.
///
/// Returns the number of records written.
pub fn to_csv(input: &InputSource, output: &OutputTarget, dialect: &Dialect, errors: TextErrors) -> Result<usize> {
    input.validate()?;
    let mut builder = dialect.reader_builder();
    builder.has_headers(false);
    let mut reader = builder.from_reader(input.open()?);
    let mut writer = TypedWriter::open(output, dialect, Vec::new(), FieldTypes::new())?;
    let mut record = ByteRecord::new();
    while reader.read_byte_record(&mut record)? {
        writer.write_record(decode_record(&record, errors)?)?;
    }
    drop(reader);
    if !input.is_stdin() {
        info!("Closing input_file=='{}'", input);
    }
    writer.finish()
}

/// Like [`to_csv`], but reads the header and round-trips typed fields
/// through their declared formats, so a malformed cell is an error.
///
/// Returns the number of data rows written.
pub fn to_typed_csv(
    input: &InputSource,
    output: &OutputTarget,
    dialect: &Dialect,
    errors: TextErrors,
    types: FieldTypes,
) -> Result<usize> {
    let reader = TypedReader::open(input, dialect, types.clone(), errors)?;
    let mut writer = TypedWriter::open(output, dialect, reader.fieldnames().to_vec(), types)?;
    writer.write_header()?;
    for row in reader {
        writer.write_row(&row?)?;
    }
    writer.finish()
}
