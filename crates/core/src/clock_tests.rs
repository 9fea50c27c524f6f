// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn fake_clock_advances_monotonic_and_epoch() {
    let clock = FakeClock::at_epoch_ms(1_000_000);
    let start = clock.now();

    clock.advance(Duration::from_secs(3));

    assert_eq!(clock.now() - start, Duration::from_secs(3));
    assert_eq!(clock.epoch_ms(), 1_003_000);
}

#[test]
fn fake_clock_clones_share_time() {
    let clock = FakeClock::new();
    let other = clock.clone();

    clock.advance(Duration::from_millis(250));
    assert_eq!(other.epoch_ms(), clock.epoch_ms());
}

#[test]
fn fake_clock_utc_tracks_epoch() {
    let clock = FakeClock::at_epoch_ms(1_700_000_000_000);
    let before = clock.utc();
    clock.advance(Duration::from_secs(60));
    let after = clock.utc();

    assert_eq!((after - before).num_seconds(), 60);
}

#[test]
fn system_clock_epoch_is_sane() {
    let clock = SystemClock;
    // Anything after 2020-01-01 counts as sane here.
    assert!(clock.epoch_ms() > 1_577_836_800_000);
}
