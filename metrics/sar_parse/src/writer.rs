use std::io::Write;
use std::path::Path;

use crate::parser::{SarParseError, SarReader};
use crate::record::{UtilizationRecord, CSV_HEADERS};

/// Writes [`UtilizationRecord`]s as CSV with a fixed header row.
pub struct CsvRecordWriter;

impl CsvRecordWriter {
    /// Writes the header followed by one row per record, in the given order.
    ///
    /// The header is written even if there are no records.
    pub fn write<W>(writer: W, records: &[UtilizationRecord]) -> Result<(), SarParseError>
    where
        W: Write,
    {
        let mut csv_writer = csv::WriterBuilder::new()
            .has_headers(false)
            .terminator(csv::Terminator::CRLF)
            .from_writer(writer);
        csv_writer.write_record(CSV_HEADERS)?;
        for record in records {
            csv_writer.serialize(record)?;
        }
        csv_writer.flush()?;

        Ok(())
    }

    /// Writes the records to the file at `path`, replacing any existing file.
    pub fn write_to_file<P>(path: P, records: &[UtilizationRecord]) -> Result<(), SarParseError>
    where
        P: AsRef<Path>,
    {
        let file = std::fs::File::create(path)?;
        Self::write(file, records)
    }
}

/// Parses the `sar` log at `input` and writes the records to `output` as CSV.
///
/// Returns the number of records written. If the log can't be parsed, an existing file at
/// `output` is removed so it can't be mistaken for the result of this log.
pub fn convert_file(input: &Path, output: &Path) -> Result<usize, SarParseError> {
    debug!("Parsing sar log: {}", input.display());
    let report = match SarReader::read_from_file(input) {
        Ok(report) => report,
        Err(e) => {
            remove_stale_output(output);
            return Err(e);
        }
    };
    if report.unparsable_lines > 0 {
        debug!(
            "Skipped {} unparsable lines in {}",
            report.unparsable_lines,
            input.display()
        );
    }

    CsvRecordWriter::write_to_file(output, &report.records)?;
    info!("Parsed sar log saved to {}", output.display());
    info!("Total rows parsed: {}", report.records.len());

    Ok(report.records.len())
}

fn remove_stale_output(output: &Path) {
    match std::fs::remove_file(output) {
        Ok(()) => warn!("Removed stale output {}", output.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove stale output {}: {e}", output.display()),
    }
}
