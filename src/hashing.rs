//! Deterministic string hashing and the prime capacity table.
//!
//! Slot positions must be reproducible across runs and processes (stored
//! text is reloaded into tables of the same shape), so the table does not
//! use a seeded `BuildHasher`. The hash is the classic 31-polynomial over
//! UTF-16 code units.

/// Capacities a table may have. Ascending primes, spaced roughly to
/// double, to damp clustering under `hash % capacity`.
pub(crate) const PRIMES: [usize; 32] = [
    71, 89, 157, 271, 547, 919, 1657, 4219, 7057, 9241, 13267, 19927, 26227, 41047, 65543, 83339,
    100183, 174469, 269117, 333667, 611953, 925607, 1001593, 2015861, 3497867, 4087267, 7368791,
    8163047, 11381633, 12195251, 39916801, 479001599,
];

/// 32-bit polynomial hash of `s` over its UTF-16 code units.
#[inline]
pub fn string_hash(s: &str) -> i32 {
    s.encode_utf16()
        .fold(0i32, |h, u| h.wrapping_mul(31).wrapping_add(i32::from(u)))
}

/// Non-negative 31-bit slot hash of a key.
#[inline]
pub fn key_hash(key: &str) -> u32 {
    (string_hash(key) & 0x7FFF_FFFF) as u32
}

/// Smallest table prime `>= n`. Beyond the table, the next prime found by
/// trial division.
pub(crate) fn prime_at_least(n: usize) -> usize {
    match PRIMES.binary_search(&n) {
        Ok(i) => PRIMES[i],
        Err(i) if i < PRIMES.len() => PRIMES[i],
        Err(_) => ((n | 1)..).step_by(2).find(|&c| is_prime(c)).unwrap_or(n | 1),
    }
}

fn is_prime(n: usize) -> bool {
    if n < 4 {
        return n >= 2;
    }
    if n % 2 == 0 {
        return false;
    }
    (3..)
        .step_by(2)
        .take_while(|d| d * d <= n)
        .all(|d| n % d != 0)
}
