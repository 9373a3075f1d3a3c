use serde::Serialize;

/// Column names of the structured output, in the order they are written.
pub const CSV_HEADERS: [&str; 12] = [
    "Timestamp",
    "CPU",
    "usr",
    "nice",
    "sys",
    "iowait",
    "steal",
    "irq",
    "soft",
    "guest",
    "gnice",
    "idle",
];

/// Names of the numeric columns, matching fields 2 to 11 of a `sar -u ALL` data line.
pub(crate) const NUMERIC_FIELDS: [&str; 10] = [
    "usr", "nice", "sys", "iowait", "steal", "irq", "soft", "guest", "gnice", "idle",
];

/// One CPU utilization sample taken from a `sar -u ALL -P ALL` report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UtilizationRecord {
    /// Wall-clock time of day of the sample, as printed by `sar`.
    #[serde(rename = "Timestamp")]
    pub timestamp: String,
    /// CPU index, or `all` for the aggregate line.
    #[serde(rename = "CPU")]
    pub cpu: String,
    pub usr: f64,
    pub nice: f64,
    pub sys: f64,
    pub iowait: f64,
    pub steal: f64,
    pub irq: f64,
    pub soft: f64,
    pub guest: f64,
    pub gnice: f64,
    pub idle: f64,
}

impl UtilizationRecord {
    /// Build a record from the timestamp, the CPU identifier and the numeric components in
    /// [`NUMERIC_FIELDS`] order.
    pub(crate) fn from_components(timestamp: &str, cpu: &str, values: [f64; 10]) -> Self {
        let [usr, nice, sys, iowait, steal, irq, soft, guest, gnice, idle] = values;
        Self {
            timestamp: timestamp.to_string(),
            cpu: cpu.to_string(),
            usr,
            nice,
            sys,
            iowait,
            steal,
            irq,
            soft,
            guest,
            gnice,
            idle,
        }
    }
}
