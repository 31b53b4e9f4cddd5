// ===============================
// src/clock.rs (Lamport logical clock)
// ===============================
//
// Causal counter shared between tasks. Every operation is a single atomic
// step, so no interleaving can violate the max(local, remote)+1 receive rule.
//
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct LamportClock {
    time: AtomicU64,
}

impl LamportClock {
    pub fn new() -> Self {
        Self { time: AtomicU64::new(0) }
    }

    /// Internal (local) event.
    pub fn tick(&self) {
        self.time.fetch_add(1, Ordering::SeqCst);
    }

    /// Send event: increment and return the value to stamp on the outgoing
    /// message.
    pub fn tick_for_send(&self) -> u64 {
        self.time.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Receive event: local = max(local, remote) + 1. The only place causal
    /// ordering across nodes is established.
    pub fn observe_received(&self, remote: u64) {
        let _ = self
            .time
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |cur| Some(cur.max(remote) + 1));
    }

    pub fn current(&self) -> u64 {
        self.time.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn starts_at_zero() {
        assert_eq!(LamportClock::new().current(), 0);
    }

    #[test]
    fn tick_for_send_returns_new_value() {
        let clock = LamportClock::new();
        assert_eq!(clock.tick_for_send(), 1);
        assert_eq!(clock.tick_for_send(), 2);
        assert_eq!(clock.current(), 2);
    }

    #[test]
    fn receive_rule_takes_max_plus_one() {
        let clock = LamportClock::new();
        for _ in 0..5 {
            clock.tick();
        }
        clock.observe_received(3); // max(5, 3) + 1
        assert_eq!(clock.current(), 6);

        let clock = LamportClock::new();
        for _ in 0..3 {
            clock.tick();
        }
        clock.observe_received(7); // max(3, 7) + 1
        assert_eq!(clock.current(), 8);
    }

    #[test]
    fn every_operation_strictly_increases() {
        let clock = LamportClock::new();
        let mut prev = clock.current();
        let ops: [&dyn Fn(&LamportClock); 4] = [
            &|c| c.tick(),
            &|c| { c.tick_for_send(); },
            &|c| c.observe_received(0),
            &|c| c.observe_received(1_000),
        ];
        for op in ops.iter().cycle().take(40) {
            op(&clock);
            let now = clock.current();
            assert!(now > prev, "clock went {prev} -> {now}");
            prev = now;
        }
    }

    #[test]
    fn concurrent_ticks_lose_nothing() {
        let clock = Arc::new(LamportClock::new());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let c = clock.clone();
            handles.push(std::thread::spawn(move || {
                for _ in 0..1_000 {
                    c.tick();
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(clock.current(), 8_000);
    }
}
