//! Parsing of `cbsd bls` tabular output into [`VmRecord`]s.
//!
//! The listing is requested with `header=0`, so every retained line describes
//! one VM: `jname jid vm_ram vm_cpus vm_os_type status vnc_port`, padded into
//! columns with runs of whitespace.

use serde::{Deserialize, Serialize};

/// Number of columns requested from `bls`.
const FIELD_COUNT: usize = 7;

/// Lines this short (or shorter) are blank or noise.
const MIN_LINE_LEN: usize = 2;

/// One VM as reported by the last listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VmRecord {
    pub jname: String,
    pub jid: i64,
    /// Megabytes.
    pub vmram: i64,
    pub vmcpus: i64,
    pub vmostype: String,
    pub status: String,
    pub vnc: String,
}

/// Parse a full listing, preserving line order.
pub fn parse_listing(output: &str) -> Vec<VmRecord> {
    output
        .split('\n')
        .filter(|line| line.len() > MIN_LINE_LEN)
        .filter_map(parse_line)
        .collect()
}

/// Parse a single retained line. Returns `None` when the line has fewer
/// columns than the listing was asked for.
pub fn parse_line(line: &str) -> Option<VmRecord> {
    let collapsed = collapse_padding(line);
    let fields: Vec<&str> = collapsed.split(' ').collect();

    if fields.len() < FIELD_COUNT {
        tracing::warn!(line, columns = fields.len(), "skipping short listing line");
        return None;
    }

    Some(VmRecord {
        jname: fields[0].to_string(),
        jid: parse_int("jid", fields[1]),
        vmram: parse_int("vm_ram", fields[2]),
        vmcpus: parse_int("vm_cpus", fields[3]),
        vmostype: fields[4].to_string(),
        status: fields[5].to_string(),
        vnc: fields[6].to_string(),
    })
}

/// Replace every run of two or more whitespace characters with one space.
/// A lone whitespace character is kept as-is.
fn collapse_padding(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        if !c.is_whitespace() {
            out.push(c);
            continue;
        }

        let mut run = 1;
        while chars.next_if(|next| next.is_whitespace()).is_some() {
            run += 1;
        }
        if run >= 2 {
            out.push(' ');
        } else {
            out.push(c);
        }
    }

    out
}

/// Numeric columns fall back to zero; the miss is logged so a real zero can
/// still be told apart from garbage when reading diagnostics.
fn parse_int(field: &'static str, raw: &str) -> i64 {
    raw.parse().unwrap_or_else(|_| {
        tracing::debug!(field, raw, "non-numeric listing value, using 0");
        0
    })
}
