//! Resident memory and thread count from the `ps` utility.

use std::process::Command;

use color_eyre::Result;
use color_eyre::eyre::eyre;
use serde::Serialize;

/// RSS column index in `ps ux` output (USER PID %CPU %MEM VSZ RSS ...).
const RSS_COLUMN: usize = 5;

/// Outcome of scanning a process listing for the harness's own line.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResidentReading {
    /// Matching lines skipped because they had too few columns.
    pub bad_lines: usize,
    /// Raw RSS column (KiB) of the first well-formed matching line.
    pub rss_kib: Option<String>,
}

impl ResidentReading {
    pub fn kib(&self) -> Option<u64> {
        self.rss_kib.as_deref().and_then(|raw| raw.parse().ok())
    }
}

/// Find the first line naming `executable` and pull its RSS column.
///
/// Matching lines that are too short are counted and skipped; scanning stops
/// at the first well-formed one.
pub fn parse_resident(listing: &str, executable: &str) -> ResidentReading {
    let mut reading = ResidentReading::default();
    for line in listing.lines() {
        if !line.contains(executable) {
            continue;
        }
        match line.split_whitespace().nth(RSS_COLUMN) {
            Some(rss) => {
                reading.rss_kib = Some(rss.to_string());
                break;
            }
            None => reading.bad_lines += 1,
        }
    }
    reading
}

/// Render a KiB figure the way the report shows it: anything longer than
/// three digits loses its last three and becomes megabytes.
pub fn format_rss(raw_kib: &str) -> String {
    let head = raw_kib
        .len()
        .checked_sub(3)
        .filter(|&cut| cut > 0)
        .and_then(|cut| raw_kib.get(..cut));
    match head {
        Some(head) => format!("{head} M"),
        None => format!("{raw_kib} K"),
    }
}

/// Count how often `executable` appears in a per-thread listing.
pub fn count_threads(listing: &str, executable: &str) -> usize {
    if executable.is_empty() {
        return 0;
    }
    listing.matches(executable).count()
}

pub fn run_ps(args: &[&str]) -> Result<String> {
    let output = Command::new("ps")
        .args(args)
        .output()
        .map_err(|e| eyre!("failed to run ps {}: {e}", args.join(" ")))?;
    if !output.status.success() {
        return Err(eyre!("ps {} exited with {}", args.join(" "), output.status));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}
