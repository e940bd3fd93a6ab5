//! Local-network device discovery.
//!
//! Wraps the external `arp-scan` tool: one scan is one short-lived child
//! process whose output is parsed into the set of device identifiers
//! currently observable on the local network. The tool needs raw-socket
//! privileges, so it may legitimately be missing or failing on a given
//! host; callers treat any [`ScanError`] as "no new information", never as
//! "everyone absent".

use std::collections::HashSet;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;
use std::time::Duration;

use thiserror::Error;
use tokio::process::Command;

use wl_core::DeviceId;

/// Scan failures.
///
/// All variants are capability errors in the sense of the error taxonomy:
/// recoverable, expected to happen in the field, and never fatal to the
/// process.
#[derive(Debug, Error)]
pub enum ScanError {
    /// The scan tool is not installed (or not on PATH).
    #[error("scan tool not found: {}", program.display())]
    ToolMissing { program: PathBuf },
    /// The scan tool could not be spawned or its output not collected.
    #[error("failed to run scan tool: {0}")]
    Io(#[from] std::io::Error),
    /// The scan tool ran but exited unsuccessfully.
    #[error("scan tool exited with {status}: {stderr}")]
    ToolFailed { status: ExitStatus, stderr: String },
    /// The scan did not finish within the configured timeout.
    #[error("scan timed out after {0:?}")]
    TimedOut(Duration),
}

/// A source of device-presence snapshots.
///
/// The tracking loop is generic over this, so tests drive it with scripted
/// snapshots instead of a real network scan.
pub trait Scanner {
    /// Returns the set of device identifiers observable right now.
    fn scan(&self) -> impl Future<Output = Result<HashSet<DeviceId>, ScanError>> + Send;

    /// Whether the scan capability exists at all on this host.
    ///
    /// Checked once at loop startup: a host without the capability degrades
    /// to manual-only tracking instead of erroring every tick.
    fn is_available(&self) -> impl Future<Output = bool> + Send {
        async { true }
    }
}

/// Scanner backed by the `arp-scan` command-line tool.
#[derive(Debug, Clone)]
pub struct ArpScanner {
    program: PathBuf,
    timeout: Duration,
}

impl ArpScanner {
    /// Creates a scanner invoking `program` with a per-scan `timeout`.
    #[must_use]
    pub fn new(program: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }

    async fn run_scan(&self) -> Result<HashSet<DeviceId>, ScanError> {
        let output = Command::new(&self.program)
            .arg("--localnet")
            .kill_on_drop(true)
            .output();
        let output = tokio::time::timeout(self.timeout, output)
            .await
            .map_err(|_| ScanError::TimedOut(self.timeout))?
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    ScanError::ToolMissing {
                        program: self.program.clone(),
                    }
                } else {
                    ScanError::Io(e)
                }
            })?;

        if !output.status.success() {
            return Err(ScanError::ToolFailed {
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let devices = parse_scan_output(&String::from_utf8_lossy(&output.stdout));
        tracing::debug!(devices = devices.len(), "scan completed");
        Ok(devices)
    }

    /// The configured tool path.
    #[must_use]
    pub fn program(&self) -> &Path {
        &self.program
    }
}

impl Scanner for ArpScanner {
    async fn scan(&self) -> Result<HashSet<DeviceId>, ScanError> {
        self.run_scan().await
    }

    /// Whether the scan tool can be spawned at all.
    async fn is_available(&self) -> bool {
        match Command::new(&self.program).arg("--version").output().await {
            Ok(_) => true,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
            // Spawnable but grumpy (e.g. missing privileges) still counts;
            // per-scan errors will surface the details.
            Err(_) => true,
        }
    }
}

/// Extracts device identifiers from `arp-scan` output.
///
/// Data lines look like `192.168.1.17\taa:bb:cc:11:22:33\tVendor Name`;
/// header and summary lines have no hardware address in the second column
/// and fall out through identifier validation.
#[must_use]
pub fn parse_scan_output(output: &str) -> HashSet<DeviceId> {
    output
        .lines()
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            let _ip = parts.next()?;
            DeviceId::new(parts.next()?).ok()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_OUTPUT: &str = "\
Interface: eth0, type: EN10MB, MAC: 11:22:33:44:55:66, IPv4: 192.168.1.5
Starting arp-scan 1.10.0 with 256 hosts (https://github.com/royhills/arp-scan)
192.168.1.1\t08:96:d7:1a:2b:3c\tAVM Audiovisuelles Marketing
192.168.1.17\tAA:BB:CC:11:22:33\tApple, Inc.
192.168.1.23\taa:bb:cc:44:55:66\t(Unknown)

3 packets received by filter, 0 packets dropped by kernel
Ending arp-scan 1.10.0: 256 hosts scanned in 1.92 seconds
";

    #[test]
    fn parses_data_lines_and_skips_noise() {
        let devices = parse_scan_output(SAMPLE_OUTPUT);
        assert_eq!(devices.len(), 3);
        assert!(devices.contains(&DeviceId::new("08:96:d7:1a:2b:3c").unwrap()));
        // Uppercase output is normalized on the way in
        assert!(devices.contains(&DeviceId::new("aa:bb:cc:11:22:33").unwrap()));
    }

    #[test]
    fn empty_output_yields_empty_set() {
        assert!(parse_scan_output("").is_empty());
        assert!(parse_scan_output("0 packets received by filter\n").is_empty());
    }

    #[test]
    fn duplicate_sightings_collapse() {
        let output = "192.168.1.1\taa:bb:cc:11:22:33\tX\n192.168.1.9\taa:bb:cc:11:22:33\tX\n";
        assert_eq!(parse_scan_output(output).len(), 1);
    }

    #[tokio::test]
    async fn missing_tool_reports_tool_missing() {
        let scanner = ArpScanner::new("/nonexistent/arp-scan", Duration::from_secs(5));
        assert!(!scanner.is_available().await);
        let err = scanner.scan().await.unwrap_err();
        assert!(matches!(err, ScanError::ToolMissing { .. }));
    }
}
