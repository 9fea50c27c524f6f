// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Parsers for the cgroup v2 controller files the collector reads.
//!
//! All parsers are total: missing keys parse as zero and malformed lines
//! are skipped, because controller file contents vary by kernel version.

use joblet_core::{IoDeviceStats, PsiAverages, PsiStats};
use std::collections::HashMap;

/// Parse a flat `key value` file (`cpu.stat`, `memory.stat`, `memory.events`,
/// `pids.events`).
pub fn parse_flat_keyed(raw: &str) -> HashMap<&str, u64> {
    let mut map = HashMap::new();
    for line in raw.lines() {
        let mut parts = line.split_whitespace();
        if let (Some(key), Some(value)) = (parts.next(), parts.next()) {
            if let Ok(value) = value.parse() {
                map.insert(key, value);
            }
        }
    }
    map
}

/// Parse a single-value file (`memory.current`, `pids.current`).
///
/// The literal `max` (from `memory.max`, `pids.max`) parses as 0, meaning
/// unlimited.
pub fn parse_scalar(raw: &str) -> u64 {
    let trimmed = raw.trim();
    if trimmed == "max" {
        return 0;
    }
    trimmed.parse().unwrap_or(0)
}

/// Parse a PSI file (`cpu.pressure`, `memory.pressure`, `io.pressure`):
///
/// ```text
/// some avg10=1.50 avg60=0.80 avg300=0.20 total=123456
/// full avg10=0.00 avg60=0.00 avg300=0.00 total=0
/// ```
pub fn parse_psi(raw: &str) -> Option<PsiStats> {
    let mut some = None;
    let mut full = None;
    for line in raw.lines() {
        let mut parts = line.split_whitespace();
        let kind = parts.next()?;
        let mut averages = PsiAverages::default();
        for field in parts {
            let Some((key, value)) = field.split_once('=') else {
                continue;
            };
            match key {
                "avg10" => averages.avg10 = value.parse().unwrap_or(0.0),
                "avg60" => averages.avg60 = value.parse().unwrap_or(0.0),
                "avg300" => averages.avg300 = value.parse().unwrap_or(0.0),
                "total" => averages.total = value.parse().unwrap_or(0),
                _ => {}
            }
        }
        match kind {
            "some" => some = Some(averages),
            "full" => full = Some(averages),
            _ => {}
        }
    }
    some.map(|some| PsiStats { some, full })
}

/// Parse `io.stat`: one line per device,
/// `MAJ:MIN rbytes=N wbytes=N rios=N wios=N dbytes=N dios=N`.
pub fn parse_io_stat(raw: &str) -> Vec<IoDeviceStats> {
    let mut devices = Vec::new();
    for line in raw.lines() {
        let mut parts = line.split_whitespace();
        let Some(device) = parts.next() else { continue };
        let Some((major, minor)) = device.split_once(':') else {
            continue;
        };
        let (Ok(major), Ok(minor)) = (major.parse(), minor.parse()) else {
            continue;
        };

        let mut stats = IoDeviceStats {
            major,
            minor,
            ..IoDeviceStats::default()
        };
        for field in parts {
            let Some((key, value)) = field.split_once('=') else {
                continue;
            };
            let value: u64 = value.parse().unwrap_or(0);
            match key {
                "rbytes" => stats.rbytes = value,
                "wbytes" => stats.wbytes = value,
                "rios" => stats.rios = value,
                "wios" => stats.wios = value,
                "dbytes" => stats.dbytes = value,
                "dios" => stats.dios = value,
                _ => {}
            }
        }
        devices.push(stats);
    }
    devices
}

#[cfg(test)]
#[path = "cgroup_stats_tests.rs"]
mod tests;
