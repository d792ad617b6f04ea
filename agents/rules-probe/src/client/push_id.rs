//! Push key generation
//!
//! Keys are 20 characters: 8 encode the millisecond timestamp, 12 are random.
//! The alphabet is in ASCII order so keys sort chronologically as strings.
//! Within one generator keys are strictly increasing even when several are
//! drawn in the same millisecond or the clock steps backwards.

use std::sync::Mutex;

pub const PUSH_CHARS: &[u8; 64] =
    b"-0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ_abcdefghijklmnopqrstuvwxyz";

pub const PUSH_KEY_LEN: usize = 20;

const TIME_CHARS: usize = 8;
const RANDOM_CHARS: usize = 12;

// UUID v4 bytes without the version (6) and variant (8) bits
const RANDOM_BYTES: [usize; RANDOM_CHARS] = [0, 1, 2, 3, 4, 5, 7, 9, 10, 11, 12, 13];

#[derive(Debug, Default)]
struct PushState {
    last_millis: u64,
    last_random: [u8; RANDOM_CHARS],
}

/// Generator for chronologically ordered push keys
#[derive(Debug, Default)]
pub struct PushKeyGenerator {
    state: Mutex<PushState>,
}

impl PushKeyGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next key at the current wall-clock time
    pub fn next_key(&self) -> String {
        let now = chrono::Utc::now().timestamp_millis().max(0) as u64;
        self.next_key_at(now)
    }

    /// Next key at an explicit millisecond timestamp
    pub fn next_key_at(&self, millis: u64) -> String {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());

        let mut millis = millis.max(state.last_millis);
        if millis == state.last_millis && state.last_random != [0; RANDOM_CHARS] {
            if !increment(&mut state.last_random) {
                // random part exhausted for this millisecond
                millis += 1;
                state.last_random = random_digits();
            }
        } else {
            state.last_random = random_digits();
        }
        state.last_millis = millis;

        encode_key(millis, &state.last_random)
    }
}

fn encode_key(millis: u64, random: &[u8; RANDOM_CHARS]) -> String {
    let mut key = Vec::with_capacity(PUSH_KEY_LEN);
    let mut remaining = millis;
    let mut time_part = [0u8; TIME_CHARS];
    for slot in time_part.iter_mut().rev() {
        *slot = PUSH_CHARS[(remaining % 64) as usize];
        remaining /= 64;
    }
    key.extend_from_slice(&time_part);
    key.extend(random.iter().map(|d| PUSH_CHARS[*d as usize]));

    String::from_utf8_lossy(&key).into_owned()
}

fn random_digits() -> [u8; RANDOM_CHARS] {
    let bytes = uuid::Uuid::new_v4().into_bytes();
    let mut digits = [0u8; RANDOM_CHARS];
    for (digit, index) in digits.iter_mut().zip(RANDOM_BYTES) {
        *digit = bytes[index] % 64;
    }
    // all-zero is reserved as "no previous key"
    if digits == [0; RANDOM_CHARS] {
        digits[RANDOM_CHARS - 1] = 1;
    }
    digits
}

/// Add one in base 64; false when every digit was already at the maximum
fn increment(digits: &mut [u8; RANDOM_CHARS]) -> bool {
    for digit in digits.iter_mut().rev() {
        if *digit == 63 {
            *digit = 0;
        } else {
            *digit += 1;
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_key_shape() {
        let generator = PushKeyGenerator::new();
        let key = generator.next_key();
        assert_eq!(key.len(), PUSH_KEY_LEN);
        assert!(key.bytes().all(|b| PUSH_CHARS.contains(&b)));
    }

    #[test]
    fn test_alphabet_is_ascii_ordered() {
        assert!(PUSH_CHARS.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_timestamp_prefix() {
        let generator = PushKeyGenerator::new();
        assert_eq!(&generator.next_key_at(0)[..8], "--------");
        assert_eq!(&generator.next_key_at(64)[..8], "------0-");
    }

    #[test]
    fn test_same_millisecond_keys_increase() {
        let generator = PushKeyGenerator::new();
        let a = generator.next_key_at(1_000);
        let b = generator.next_key_at(1_000);
        assert!(b > a);
        assert_eq!(a[..8], b[..8]);
    }

    #[test]
    fn test_increment_carries() {
        let mut digits = [63u8; RANDOM_CHARS];
        digits[0] = 5;
        assert!(increment(&mut digits));
        assert_eq!(digits[0], 6);
        assert!(digits[1..].iter().all(|d| *d == 0));

        let mut digits = [63u8; RANDOM_CHARS];
        assert!(!increment(&mut digits));
    }

    #[test]
    fn test_exhausted_millisecond_moves_to_next() {
        let generator = PushKeyGenerator::new();
        generator.next_key_at(1_000);
        let previous = {
            let mut state = generator.state.lock().unwrap();
            state.last_random = [63; RANDOM_CHARS];
            encode_key(1_000, &state.last_random)
        };
        assert_eq!(&previous[8..], "zzzzzzzzzzzz");

        let next = generator.next_key_at(1_000);
        assert!(next > previous);
        assert_eq!(next[..8], encode_key(1_001, &[0; RANDOM_CHARS])[..8]);

        // the clock catching up keeps order too
        assert!(generator.next_key_at(1_001) > next);
    }

    #[test]
    fn test_every_random_position_varies() {
        let mut seen = vec![std::collections::HashSet::new(); RANDOM_CHARS];
        for _ in 0..500 {
            for (position, digit) in random_digits().iter().enumerate() {
                seen[position].insert(*digit);
            }
        }
        assert!(seen.iter().all(|values| values.len() > 32));
    }

    proptest! {
        #[test]
        fn prop_keys_strictly_increase(steps in proptest::collection::vec(0u64..5, 1..50)) {
            let generator = PushKeyGenerator::new();
            let mut millis = 1_718_545_678_000u64;
            let mut previous = generator.next_key_at(millis);
            for step in steps {
                millis += step;
                let key = generator.next_key_at(millis);
                prop_assert_eq!(key.len(), PUSH_KEY_LEN);
                prop_assert!(key > previous);
                previous = key;
            }
        }

        #[test]
        fn prop_clock_going_backwards_keeps_order(a in 1u64..1_000_000, b in 1u64..1_000_000) {
            let generator = PushKeyGenerator::new();
            let first = generator.next_key_at(a);
            let second = generator.next_key_at(b);
            prop_assert!(second > first);
        }
    }
}
