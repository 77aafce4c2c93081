//! Worker port allocation.
//!
//! Ports come from a monotonically increasing counter. A port is handed out
//! at most once per process lifetime; once the counter passes the ceiling
//! every later request fails instead of wrapping around.

use std::sync::atomic::{AtomicU32, Ordering};

use tracing::debug;

use crate::error::{RuntimeError, RuntimeResult};

/// Upper bound of the registered port range; dynamic ports start above it.
pub const EPHEMERAL_CEILING: u16 = 49151;

/// Lock-free monotonic port counter.
///
/// `fetch_update` makes the read-advance step atomic, so concurrent callers
/// never receive the same port.
pub struct PortAllocator {
    last: AtomicU32,
    ceiling: u16,
    reserved: Vec<u16>,
}

impl PortAllocator {
    /// The first allocation returns the first non-reserved port above `seed`.
    pub fn new(seed: u16, ceiling: u16, reserved: Vec<u16>) -> Self {
        Self {
            last: AtomicU32::new(u32::from(seed)),
            ceiling,
            reserved,
        }
    }

    fn successor(&self, current: u32) -> Option<u32> {
        let mut candidate = current + 1;
        loop {
            if candidate > u32::from(self.ceiling) {
                return None;
            }
            if !self.reserved.iter().any(|&r| u32::from(r) == candidate) {
                return Some(candidate);
            }
            candidate += 1;
        }
    }

    /// Draw the next port.
    pub fn allocate(&self) -> RuntimeResult<u16> {
        let mut allocated = None;
        self.last
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                allocated = self.successor(current);
                allocated
            })
            .map_err(|_| RuntimeError::PortPoolExhausted {
                ceiling: self.ceiling,
            })?;
        let port = allocated.ok_or(RuntimeError::PortPoolExhausted {
            ceiling: self.ceiling,
        })? as u16;
        debug!(port, "worker port allocated");
        Ok(port)
    }

    /// Last port handed out (or the seed if none yet).
    pub fn last_allocated(&self) -> u16 {
        self.last.load(Ordering::Acquire) as u16
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn first_port_is_above_seed() {
        let ports = PortAllocator::new(2999, EPHEMERAL_CEILING, vec![]);
        assert_eq!(ports.allocate().unwrap(), 3000);
        assert_eq!(ports.allocate().unwrap(), 3001);
        assert_eq!(ports.last_allocated(), 3001);
    }

    #[test]
    fn reserved_ports_are_skipped() {
        let ports = PortAllocator::new(8083, EPHEMERAL_CEILING, vec![8085, 8084]);
        assert_eq!(ports.allocate().unwrap(), 8086);
    }

    #[test]
    fn exhaustion_fails_without_wrapping() {
        let ports = PortAllocator::new(49149, EPHEMERAL_CEILING, vec![]);
        assert_eq!(ports.allocate().unwrap(), 49150);
        assert_eq!(ports.allocate().unwrap(), 49151);
        for _ in 0..3 {
            assert!(matches!(
                ports.allocate(),
                Err(RuntimeError::PortPoolExhausted { ceiling: 49151 })
            ));
        }
    }

    #[test]
    fn reserved_ceiling_counts_as_exhausted() {
        let ports = PortAllocator::new(49150, EPHEMERAL_CEILING, vec![49151]);
        assert!(ports.allocate().is_err());
    }

    #[test]
    fn concurrent_allocations_are_unique() {
        let ports = Arc::new(PortAllocator::new(2999, EPHEMERAL_CEILING, vec![8085]));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let ports = ports.clone();
                std::thread::spawn(move || {
                    (0..200).map(|_| ports.allocate().unwrap()).collect::<Vec<_>>()
                })
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for port in handle.join().unwrap() {
                assert!(seen.insert(port), "port {port} handed out twice");
                assert_ne!(port, 8085);
            }
        }
        assert_eq!(seen.len(), 1600);
    }
}
