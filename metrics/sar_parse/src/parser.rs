use std::io::{BufRead as _, Read};

use crate::record::{UtilizationRecord, NUMERIC_FIELDS};

/// Mis-encoded `é` as produced by `sar` running under a latin-1 Portuguese locale.
const MISENCODED_E_ACUTE: &str = "Ã©";

/// Marker found on column header lines and on the kernel banner (`... (8 CPU)`).
const HEADER_MARKER: &str = "CPU";

/// Markers of the trailing average section, in the locales we have seen. The last one is a
/// latin-1 `Média:` after lossy decoding.
const AVERAGE_MARKERS: [&str; 4] = ["Media:", "Média:", "Average:", "M\u{FFFD}dia:"];

/// Minimum number of whitespace delimited fields on a data line.
const DATA_LINE_FIELDS: usize = 2 + NUMERIC_FIELDS.len();

/// The records read from a `sar` log and the number of lines that were skipped as unparsable.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ParseReport {
    pub records: Vec<UtilizationRecord>,
    pub unparsable_lines: usize,
}

/// Reads the text output of `sar -u ALL -P ALL` into [`UtilizationRecord`]s.
#[derive(Debug, Default)]
pub struct SarReader;

impl SarReader {
    /// Reads a `sar` log from a reader.
    ///
    /// Input is decoded lossily so that stray latin-1 bytes don't fail the read. Parsing stops
    /// at the first data line with a non-numeric component.
    pub fn read<R>(reader: R) -> Result<ParseReport, SarParseError>
    where
        R: Read,
    {
        let mut report = ParseReport::default();
        let mut section_timestamp: Option<String> = None;

        for (index, raw) in std::io::BufReader::new(reader).split(b'\n').enumerate() {
            let raw = raw?;
            let line = String::from_utf8_lossy(&raw).replace(MISENCODED_E_ACUTE, "e");
            let line_number = index + 1;

            if let Some(timestamp) = section_timestamp_of(&line) {
                trace!("Entering sample section at {timestamp}");
                section_timestamp = Some(timestamp.to_string());
                continue;
            }
            if line.contains(HEADER_MARKER) || AVERAGE_MARKERS.iter().any(|m| line.contains(m)) {
                continue;
            }

            let fields = line.split_whitespace().collect::<Vec<_>>();
            if fields.len() < 2 {
                continue;
            }
            if fields.len() < DATA_LINE_FIELDS {
                debug!(".");
                report.unparsable_lines += 1;
                continue;
            }

            report.records.push(parse_data_line(line_number, &fields)?);
        }

        if let Some(timestamp) = section_timestamp {
            trace!("Last sample section started at {timestamp}");
        }

        Ok(report)
    }

    /// Reads a `sar` log from the file at the given path.
    pub fn read_from_file<P>(path: P) -> Result<ParseReport, SarParseError>
    where
        P: AsRef<std::path::Path>,
    {
        let file = std::fs::File::open(path)?;
        Self::read(file)
    }
}

/// Returns the timestamp of a `HH:MM:SS  CPU ...` section header line.
fn section_timestamp_of(line: &str) -> Option<&str> {
    let mut fields = line.split_whitespace();
    let timestamp = fields.next()?;
    let next = fields.next()?;
    (is_time_of_day(timestamp) && next.starts_with(HEADER_MARKER)).then_some(timestamp)
}

fn is_time_of_day(token: &str) -> bool {
    let bytes = token.as_bytes();
    bytes.len() == 8
        && bytes.iter().enumerate().all(|(i, b)| match i {
            2 | 5 => *b == b':',
            _ => b.is_ascii_digit(),
        })
}

fn parse_data_line(line: usize, fields: &[&str]) -> Result<UtilizationRecord, SarParseError> {
    let mut values = [0.0; NUMERIC_FIELDS.len()];
    for (slot, (name, raw)) in values
        .iter_mut()
        .zip(NUMERIC_FIELDS.iter().zip(&fields[2..DATA_LINE_FIELDS]))
    {
        *slot = parse_decimal(raw).ok_or_else(|| SarParseError::MalformedRecord {
            line,
            field: *name,
            value: raw.to_string(),
        })?;
    }

    Ok(UtilizationRecord::from_components(fields[0], fields[1], values))
}

/// Parses a number which may use a comma as the decimal separator.
pub fn parse_decimal(raw: &str) -> Option<f64> {
    raw.replace(',', ".").parse::<f64>().ok()
}

/// An error type for [`SarReader::read`] and the CSV conversion.
#[derive(Debug, thiserror::Error)]
pub enum SarParseError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Malformed record on line {line}: field '{field}' has non-numeric value '{value}'")]
    MalformedRecord {
        line: usize,
        field: &'static str,
        value: String,
    },
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    const REPORT: &str = "Linux 5.15.0-91-generic (dns01) \t14/10/2026 \t_x86_64_\t(2 CPU)

14:23:00        CPU      %usr     %nice      %sys   %iowait    %steal      %irq     %soft    %guest    %gnice     %idle
14:23:01        all      3,50      0,00      1,20      0,10      0,00      0,00      0,05      0,00      0,00     95,15
14:23:01          0      4,00      0,00      2,00      0,00      0,00      0,00      0,00      0,00      0,00     94,00
14:23:01          1      3,00      0,00      0,40      0,20      0,00      0,00      0,10      0,00      0,00     96,30

MÃ©dia:          all      3,50      0,00      1,20      0,10      0,00      0,00      0,05      0,00      0,00     95,15
";

    #[test]
    fn test_should_parse_example_line() {
        let report = SarReader::read(REPORT.as_bytes()).expect("Failed to parse report");

        assert_eq!(report.records.len(), 3);
        assert_eq!(
            report.records[0],
            UtilizationRecord {
                timestamp: "14:23:01".to_string(),
                cpu: "all".to_string(),
                usr: 3.50,
                nice: 0.00,
                sys: 1.20,
                iowait: 0.10,
                steal: 0.00,
                irq: 0.00,
                soft: 0.05,
                guest: 0.00,
                gnice: 0.00,
                idle: 95.15,
            }
        );
        assert_eq!(report.unparsable_lines, 0);
    }

    #[test]
    fn test_should_keep_input_order() {
        let report = SarReader::read(REPORT.as_bytes()).expect("Failed to parse report");

        let cpus = report
            .records
            .iter()
            .map(|r| r.cpu.as_str())
            .collect::<Vec<_>>();
        assert_eq!(cpus, vec!["all", "0", "1"]);
    }

    #[test]
    fn test_should_skip_short_lines_and_continue() {
        let input = "14:23:01 all 3,50 0,00\n14:23:02 all 1 2 3 4 5 6 7 8 9 10\n";

        let report = SarReader::read(input.as_bytes()).expect("Failed to parse report");

        assert_eq!(report.unparsable_lines, 1);
        assert_eq!(report.records.len(), 1);
        assert_eq!(report.records[0].timestamp, "14:23:02");
        assert_eq!(report.records[0].idle, 10.0);
    }

    #[test]
    fn test_should_fail_on_non_numeric_component() {
        let input = "14:23:01 all 1 2 3 4 5 6 7 8 9 10\n14:23:02 all 1 2 x 4 5 6 7 8 9 10\n14:23:03 all 1 2 3 4 5 6 7 8 9 10\n";

        let err = SarReader::read(input.as_bytes()).expect_err("Parsing should fail");

        match err {
            SarParseError::MalformedRecord { line, field, value } => {
                assert_eq!(line, 2);
                assert_eq!(field, "sys");
                assert_eq!(value, "x");
            }
            other => panic!("Unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_should_skip_average_lines_in_any_locale() {
        let input = "Average:        all      1,00      0,00      1,00      0,00      0,00      0,00      0,00      0,00      0,00     98,00\nMédia:        all      1,00      0,00      1,00      0,00      0,00      0,00      0,00      0,00      0,00     98,00\n";

        let report = SarReader::read(input.as_bytes()).expect("Failed to parse report");

        assert!(report.records.is_empty());
    }

    #[test]
    fn test_should_skip_latin1_average_lines() {
        let mut input = b"14:23:01 all 1 2 3 4 5 6 7 8 9 10\n".to_vec();
        input.extend_from_slice(b"M\xe9dia: all 1 2 3 4 5 6 7 8 9 10\n");

        let report = SarReader::read(input.as_slice()).expect("Failed to parse report");

        assert_eq!(report.records.len(), 1);
        assert_eq!(report.records[0].timestamp, "14:23:01");
    }

    #[test]
    fn test_should_parse_locale_decimals() {
        assert_eq!(parse_decimal("12,34"), Some(12.34));
        assert_eq!(parse_decimal("5.00"), Some(5.0));
        assert_eq!(parse_decimal("n/a"), None);
    }

    #[test]
    fn test_should_detect_section_timestamp() {
        assert_eq!(
            section_timestamp_of("14:23:00        CPU      %usr"),
            Some("14:23:00")
        );
        assert_eq!(section_timestamp_of("14:23:01        all      3,50"), None);
        assert_eq!(section_timestamp_of("Linux 5.15.0 (dns01)"), None);
    }
}
