// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

crate::define_id! {
    /// Test-only ID type.
    pub struct TestId;
}

#[test]
fn short_truncates_long_ids() {
    let id = TestId::new("0123456789abcdef");
    assert_eq!(id.short(8), "01234567");
}

#[test]
fn short_returns_whole_id_when_short_enough() {
    let id = TestId::new("abc");
    assert_eq!(id.short(8), "abc");
}

#[test]
fn short_id_trait_on_str() {
    assert_eq!("0123456789".short(4), "0123");
    assert_eq!("ab".short(4), "ab");
}

#[test]
fn display_and_partial_eq_str() {
    let id = TestId::new("job-1");
    assert_eq!(id.to_string(), "job-1");
    assert_eq!(id, "job-1");
    assert_eq!(id, *"job-1");
}

#[test]
fn uuid_gen_produces_unique_ids() {
    let gen = UuidIdGen;
    let a = gen.next();
    let b = gen.next();
    assert_ne!(a, b);
    assert_eq!(a.len(), 36, "hyphenated UUID");
}

#[test]
fn sequential_gen_counts_up() {
    let gen = SequentialIdGen::new("job");
    assert_eq!(gen.next(), "job-1");
    assert_eq!(gen.next(), "job-2");

    // Clones share the counter
    let clone = gen.clone();
    assert_eq!(clone.next(), "job-3");
    assert_eq!(gen.next(), "job-4");
}
