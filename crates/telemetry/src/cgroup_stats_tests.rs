// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn flat_keyed_parses_cpu_stat() {
    let raw = "usage_usec 12500000\nuser_usec 10000000\nsystem_usec 2500000\n\
               nr_periods 50\nnr_throttled 5\nthrottled_usec 300000\n";
    let map = parse_flat_keyed(raw);
    assert_eq!(map["usage_usec"], 12_500_000);
    assert_eq!(map["nr_throttled"], 5);
    assert_eq!(map.len(), 6);
}

#[test]
fn flat_keyed_skips_malformed_lines() {
    let map = parse_flat_keyed("good 1\nbad\nworse x y\nanother 2\n");
    assert_eq!(map.len(), 2);
    assert_eq!(map["good"], 1);
    assert_eq!(map["another"], 2);
}

#[yare::parameterized(
    number = { "42\n", 42 },
    unlimited = { "max\n", 0 },
    garbage = { "wat", 0 },
)]
fn scalar_parses(raw: &str, expected: u64) {
    assert_eq!(parse_scalar(raw), expected);
}

#[test]
fn psi_parses_some_and_full() {
    let raw = "some avg10=1.50 avg60=0.80 avg300=0.20 total=123456\n\
               full avg10=0.10 avg60=0.05 avg300=0.01 total=999\n";
    let psi = parse_psi(raw).unwrap();
    assert_eq!(psi.some.avg10, 1.5);
    assert_eq!(psi.some.total, 123_456);
    let full = psi.full.unwrap();
    assert_eq!(full.avg60, 0.05);
    assert_eq!(full.total, 999);
}

#[test]
fn psi_without_full_line() {
    let raw = "some avg10=0.00 avg60=0.00 avg300=0.00 total=0\n";
    let psi = parse_psi(raw).unwrap();
    assert!(psi.full.is_none());
}

#[test]
fn psi_empty_is_none() {
    assert!(parse_psi("").is_none());
}

#[test]
fn io_stat_parses_devices() {
    let raw = "8:0 rbytes=1024 wbytes=2048 rios=4 wios=8 dbytes=0 dios=0\n\
               259:1 rbytes=512 wbytes=0 rios=1 wios=0 dbytes=0 dios=0\n";
    let devices = parse_io_stat(raw);
    assert_eq!(devices.len(), 2);
    assert_eq!(devices[0].major, 8);
    assert_eq!(devices[0].rbytes, 1024);
    assert_eq!(devices[1].major, 259);
    assert_eq!(devices[1].minor, 1);
    assert_eq!(devices[1].rbytes, 512);
}

#[test]
fn io_stat_skips_malformed() {
    assert!(parse_io_stat("not-a-device rbytes=1\n").is_empty());
    assert!(parse_io_stat("").is_empty());
}
