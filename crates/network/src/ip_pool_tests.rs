// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use proptest::prelude::*;
use std::collections::HashSet;

fn pool(cidr: &str) -> IpPool {
    IpPool::new(cidr.parse().unwrap())
}

#[test]
fn first_allocation_is_dot_two() {
    let pool = pool("172.20.0.0/16");
    assert_eq!(pool.gateway(), "172.20.0.1".parse::<Ipv4Addr>().unwrap());
    assert_eq!(
        pool.allocate(),
        Some("172.20.0.2".parse::<Ipv4Addr>().unwrap())
    );
}

#[test]
fn allocations_are_distinct() {
    let pool = pool("10.1.0.0/24");
    let a = pool.allocate().unwrap();
    let b = pool.allocate().unwrap();
    assert_ne!(a, b);
    assert_eq!(pool.allocated_count(), 2);
}

#[test]
fn exhaustion_returns_none() {
    // /29 = 8 addresses, minus network/gateway/broadcast = 5 usable
    let pool = pool("10.1.0.0/29");
    assert_eq!(pool.capacity(), 5);
    for _ in 0..5 {
        assert!(pool.allocate().is_some());
    }
    assert_eq!(pool.allocate(), None);
}

#[test]
fn release_recycles() {
    let pool = pool("10.1.0.0/29");
    let mut taken = Vec::new();
    for _ in 0..5 {
        taken.push(pool.allocate().unwrap());
    }
    assert_eq!(pool.allocate(), None);

    pool.release(taken[2]);
    assert_eq!(pool.allocated_count(), 4);
    assert_eq!(pool.allocate(), Some(taken[2]));
}

#[test]
fn next_fit_does_not_immediately_reuse() {
    let pool = pool("10.1.0.0/24");
    let first = pool.allocate().unwrap();
    pool.release(first);
    // Cursor has moved past .2, so the next allocation differs
    let second = pool.allocate().unwrap();
    assert_ne!(first, second);
}

#[test]
fn release_outside_pool_is_noop() {
    let pool = pool("10.1.0.0/24");
    pool.allocate().unwrap();
    pool.release("192.168.1.5".parse().unwrap());
    assert_eq!(pool.allocated_count(), 1);
}

#[test]
fn release_of_reserved_addresses_is_noop() {
    let pool = pool("10.1.0.0/24");
    pool.release("10.1.0.0".parse().unwrap()); // network
    pool.release("10.1.0.1".parse().unwrap()); // gateway
    pool.release("10.1.0.255".parse().unwrap()); // broadcast
    assert_eq!(pool.allocated_count(), 0);
}

#[test]
fn double_release_is_noop() {
    let pool = pool("10.1.0.0/24");
    let ip = pool.allocate().unwrap();
    pool.release(ip);
    pool.release(ip);
    assert_eq!(pool.allocated_count(), 0);
}

#[test]
fn tiny_networks_have_no_capacity() {
    assert_eq!(pool("10.1.0.0/31").allocate(), None);
    assert_eq!(pool("10.1.0.0/32").allocate(), None);
}

proptest! {
    /// Every allocated address is inside the CIDR and never one of the
    /// reserved addresses; all allocations are pairwise distinct.
    #[test]
    fn allocations_respect_reservations(count in 1usize..200) {
        let pool = pool("10.7.0.0/24");
        let network: Ipv4Network = "10.7.0.0/24".parse().unwrap();
        let mut seen = HashSet::new();

        for _ in 0..count {
            let Some(ip) = pool.allocate() else { break };
            prop_assert!(network.contains(ip));
            prop_assert_ne!(ip, network.network());
            prop_assert_ne!(ip, pool.gateway());
            prop_assert_ne!(ip, network.broadcast());
            prop_assert!(seen.insert(ip), "duplicate allocation {}", ip);
        }
    }

    /// Interleaved allocate/release keeps the allocated count consistent
    /// and never hands out an address twice concurrently.
    #[test]
    fn interleaved_alloc_release_consistent(ops in proptest::collection::vec(any::<bool>(), 1..300)) {
        let pool = pool("10.8.0.0/26");
        let mut live: Vec<Ipv4Addr> = Vec::new();

        for take in ops {
            if take {
                if let Some(ip) = pool.allocate() {
                    prop_assert!(!live.contains(&ip));
                    live.push(ip);
                }
            } else if let Some(ip) = live.pop() {
                pool.release(ip);
            }
            prop_assert_eq!(pool.allocated_count() as usize, live.len());
        }
    }
}
