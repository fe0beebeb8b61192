//! Hex helpers for tracing and the command line
//!
//! Command and response buffers are logged as space-separated hex bytes,
//! sixteen per line.

/// Bytes per hex dump line
const BYTES_PER_LINE: usize = 16;

/// Format bytes as a multi-line hex dump
pub fn hex_dump(data: &[u8]) -> String {
    data.chunks(BYTES_PER_LINE)
        .map(|line| {
            line.iter()
                .map(|byte| hex::encode([*byte]))
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Parse a hex string, ignoring whitespace and an optional `0x` prefix
pub fn parse_hex(input: &str) -> crate::Result<Vec<u8>> {
    let trimmed = input.trim();
    let trimmed = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    let digits: String = trimmed.chars().filter(|c| !c.is_whitespace()).collect();

    Ok(hex::decode(&digits)?)
}
