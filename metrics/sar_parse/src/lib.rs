#[macro_use]
extern crate log;

mod parser;
mod record;
mod writer;

pub use self::parser::{parse_decimal, ParseReport, SarParseError, SarReader};
pub use self::record::{UtilizationRecord, CSV_HEADERS};
pub use self::writer::{convert_file, CsvRecordWriter};
