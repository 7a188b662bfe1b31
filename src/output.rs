use crate::model::{OutputConfig, ProbeReport};
use std::io::Write;

/// Renders each byte as its unsigned decimal value.
pub fn render_decimal(bytes: &[u8], separator: &str) -> String {
    bytes
        .iter()
        .map(|b| b.to_string())
        .collect::<Vec<_>>()
        .join(separator)
}

pub fn write_report<W: Write>(
    writer: &mut W,
    cfg: &OutputConfig,
    report: &ProbeReport,
) -> std::io::Result<()> {
    write!(writer, "{}", render_decimal(&report.bytes, &cfg.separator))?;
    writer.flush()
}
