use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Time-ordered version token.
///
/// Ordering is lexicographic over `(micros, sequence, node)`: the wall-clock
/// component orders tokens across clock instances, the sequence breaks ties
/// within one instance and the node tag breaks ties between instances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Version {
    micros: u64,
    sequence: u32,
    node: u32,
}

impl Version {
    pub const MIN: Version = Version {
        micros: 0,
        sequence: 0,
        node: 0,
    };
    pub const MAX: Version = Version {
        micros: u64::MAX,
        sequence: u32::MAX,
        node: u32::MAX,
    };

    pub fn new(micros: u64, sequence: u32, node: u32) -> Self {
        Self {
            micros,
            sequence,
            node,
        }
    }

    pub fn micros(&self) -> u64 {
        self.micros
    }

    pub fn sequence(&self) -> u32 {
        self.sequence
    }

    pub fn node(&self) -> u32 {
        self.node
    }

    pub fn timestamp(&self) -> SystemTime {
        UNIX_EPOCH + Duration::from_micros(self.micros)
    }

    pub fn as_u128(&self) -> u128 {
        (u128::from(self.micros) << 64) | (u128::from(self.sequence) << 32) | u128::from(self.node)
    }

    pub fn from_u128(raw: u128) -> Self {
        Self {
            micros: (raw >> 64) as u64,
            sequence: (raw >> 32) as u32,
            node: raw as u32,
        }
    }

    pub fn to_bytes(&self) -> [u8; 16] {
        self.as_u128().to_be_bytes()
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", Uuid::from_u128(self.as_u128()))
    }
}

type TimeSource = Arc<dyn Fn() -> u64 + Send + Sync>;

#[derive(Debug, Default)]
struct ClockState {
    micros: u64,
    sequence: u32,
}

/// Issues strictly increasing [`Version`]s for one process.
///
/// Safe to share across tasks; the state lock is never held across I/O.
pub struct VersionClock {
    node: u32,
    time: TimeSource,
    state: Mutex<ClockState>,
}

impl fmt::Debug for VersionClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VersionClock")
            .field("node", &self.node)
            .field("state", &*self.state.lock())
            .finish()
    }
}

impl Default for VersionClock {
    fn default() -> Self {
        Self::new()
    }
}

impl VersionClock {
    pub fn new() -> Self {
        Self::with_node(Uuid::new_v4().as_u128() as u32)
    }

    pub fn with_node(node: u32) -> Self {
        Self::with_time_source(node, Arc::new(wall_clock_micros))
    }

    pub fn with_time_source(node: u32, time: Arc<dyn Fn() -> u64 + Send + Sync>) -> Self {
        Self {
            node,
            time,
            state: Mutex::new(ClockState::default()),
        }
    }

    pub fn node(&self) -> u32 {
        self.node
    }

    pub fn next(&self) -> Version {
        let now = (self.time)();
        let mut state = self.state.lock();
        if now > state.micros {
            state.micros = now;
            state.sequence = 0;
        } else if state.sequence == u32::MAX {
            // Sequence space exhausted within one tick; borrow from the future.
            state.micros += 1;
            state.sequence = 0;
        } else {
            state.sequence += 1;
        }
        Version {
            micros: state.micros,
            sequence: state.sequence,
            node: self.node,
        }
    }

    /// Upper bound for "latest as of now" reads.
    pub fn now(&self) -> Version {
        self.next()
    }
}

fn wall_clock_micros() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_micros()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::{Version, VersionClock};
    use proptest::prelude::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU64, Ordering};

    fn scripted_clock(ticks: Vec<u64>) -> VersionClock {
        let cursor = Arc::new(AtomicU64::new(0));
        let ticks = Arc::new(ticks);
        VersionClock::with_time_source(
            7,
            Arc::new(move || {
                let idx = cursor.fetch_add(1, Ordering::Relaxed) as usize;
                ticks[idx.min(ticks.len() - 1)]
            }),
        )
    }

    #[test]
    fn versions_survive_u128_conversion() {
        let v = Version::new(1_700_000_000_000_000, 42, 9);
        assert_eq!(Version::from_u128(v.as_u128()), v);
        assert_eq!(v.to_bytes(), v.as_u128().to_be_bytes());
    }

    #[test]
    fn clock_going_backwards_still_increases() {
        let clock = scripted_clock(vec![1_000, 900, 900, 2_000]);
        let a = clock.next();
        let b = clock.next();
        let c = clock.next();
        let d = clock.next();
        assert!(a < b && b < c && c < d);
        assert_eq!(b.micros(), 1_000);
        assert_eq!(d.micros(), 2_000);
        assert_eq!(d.sequence(), 0);
    }

    #[test]
    fn node_tag_orders_equal_ticks_across_instances() {
        let a = VersionClock::with_time_source(1, Arc::new(|| 5));
        let b = VersionClock::with_time_source(2, Arc::new(|| 5));
        assert!(a.next() < b.next());
    }

    #[test]
    fn concurrent_callers_never_share_a_version() {
        let clock = Arc::new(VersionClock::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let clock = Arc::clone(&clock);
                std::thread::spawn(move || (0..1_000).map(|_| clock.next()).collect::<Vec<_>>())
            })
            .collect();
        let mut all: Vec<Version> = handles
            .into_iter()
            .flat_map(|h| h.join().expect("join"))
            .collect();
        let total = all.len();
        all.sort();
        all.dedup();
        assert_eq!(all.len(), total);
    }

    proptest! {
        #[test]
        fn next_is_strictly_increasing(ticks in prop::collection::vec(0u64..10_000, 1..200)) {
            let clock = scripted_clock(ticks.clone());
            let mut previous = clock.next();
            for _ in 1..ticks.len() {
                let current = clock.next();
                prop_assert!(current > previous);
                previous = current;
            }
        }
    }
}
