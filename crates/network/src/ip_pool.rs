// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Thread-safe IPv4 allocator for one network's CIDR.
//!
//! Offsets 0 (network address), 1 (gateway), and the broadcast address are
//! reserved and never handed out. Allocation is next-fit: a cursor
//! remembers where the last allocation happened so freed-and-reallocated
//! addresses churn through the range instead of reusing the lowest offset
//! immediately.

use ipnetwork::Ipv4Network;
use parking_lot::Mutex;
use std::net::Ipv4Addr;

/// Bitmap-backed IP pool for a CIDR.
pub struct IpPool {
    network: Ipv4Network,
    inner: Mutex<PoolInner>,
}

struct PoolInner {
    /// One bit per offset in the CIDR.
    bitmap: Vec<u64>,
    /// Next-fit cursor: offset after the most recent allocation.
    cursor: u32,
    allocated: u32,
}

impl IpPool {
    pub fn new(network: Ipv4Network) -> Self {
        let size = network.size();
        let words = (size as usize).div_ceil(64);
        Self {
            network,
            inner: Mutex::new(PoolInner {
                bitmap: vec![0; words],
                cursor: FIRST_USABLE,
                allocated: 0,
            }),
        }
    }

    /// The CIDR this pool allocates from.
    pub fn network(&self) -> Ipv4Network {
        self.network
    }

    /// Gateway address: `.1` of the CIDR.
    pub fn gateway(&self) -> Ipv4Addr {
        self.network
            .nth(1)
            .unwrap_or_else(|| self.network.network())
    }

    /// Usable host addresses (everything minus network, gateway, broadcast).
    pub fn capacity(&self) -> u32 {
        self.network.size().saturating_sub(3)
    }

    pub fn allocated_count(&self) -> u32 {
        self.inner.lock().allocated
    }

    /// Allocate the next free address, or `None` when exhausted.
    pub fn allocate(&self) -> Option<Ipv4Addr> {
        let size = self.network.size();
        if size <= FIRST_USABLE + 1 {
            // Too small to have any usable host address past the gateway.
            return None;
        }
        let last_usable = size - 2; // size - 1 is broadcast

        let mut inner = self.inner.lock();
        let span = last_usable - FIRST_USABLE + 1;
        let start = inner.cursor.clamp(FIRST_USABLE, last_usable);

        for step in 0..span {
            let offset = FIRST_USABLE + (start - FIRST_USABLE + step) % span;
            if !inner.is_set(offset) {
                inner.set(offset);
                inner.allocated += 1;
                inner.cursor = if offset == last_usable {
                    FIRST_USABLE
                } else {
                    offset + 1
                };
                return self.network.nth(offset);
            }
        }
        None
    }

    /// Release an address back to the pool.
    ///
    /// Addresses outside the CIDR, reserved addresses, and double releases
    /// are all no-ops.
    pub fn release(&self, ip: Ipv4Addr) {
        let Some(offset) = self.offset_of(ip) else {
            return;
        };
        if offset < FIRST_USABLE || offset >= self.network.size() - 1 {
            return;
        }
        let mut inner = self.inner.lock();
        if inner.is_set(offset) {
            inner.clear(offset);
            inner.allocated -= 1;
        }
    }

    /// Whether an address is currently allocated.
    pub fn is_allocated(&self, ip: Ipv4Addr) -> bool {
        match self.offset_of(ip) {
            Some(offset) => self.inner.lock().is_set(offset),
            None => false,
        }
    }

    fn offset_of(&self, ip: Ipv4Addr) -> Option<u32> {
        if !self.network.contains(ip) {
            return None;
        }
        Some(u32::from(ip) - u32::from(self.network.network()))
    }
}

/// Offset 0 is the network address and offset 1 the gateway; allocation
/// starts at `.2`.
const FIRST_USABLE: u32 = 2;

impl PoolInner {
    fn is_set(&self, offset: u32) -> bool {
        let (word, bit) = (offset as usize / 64, offset % 64);
        self.bitmap[word] & (1 << bit) != 0
    }

    fn set(&mut self, offset: u32) {
        let (word, bit) = (offset as usize / 64, offset % 64);
        self.bitmap[word] |= 1 << bit;
    }

    fn clear(&mut self, offset: u32) {
        let (word, bit) = (offset as usize / 64, offset % 64);
        self.bitmap[word] &= !(1 << bit);
    }
}

#[cfg(test)]
#[path = "ip_pool_tests.rs"]
mod tests;
