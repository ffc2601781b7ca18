// Short random identifiers for sessions and clients.
//
// Every session and every connected client is named by a 6-character string
// drawn from a 32-symbol alphabet that leaves out characters people confuse
// when reading ids aloud or copying them by hand (`i`, `l`, `u`, `v`). Ids
// are meant to be typed into a "join session" box, so they stay short.
//
// Randomness comes from `IdRng`, a xoshiro256++ generator seeded through
// SplitMix64. Generation is pure given the seed: the relay draws its seed
// from the OS through `rand` at startup, tests seed with a constant and get
// the same ids every run. Uniqueness is not this crate's concern; the
// registry checks for collisions when it inserts.

use serde::{Deserialize, Serialize};

/// Symbols an id may contain.
pub const ID_ALPHABET: &[u8] = b"abcdefghjkmnopqrstwxyz0123456789";

/// Number of symbols in every generated id.
pub const ID_LENGTH: usize = 6;

/// Xoshiro256++ PRNG backing id generation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IdRng {
    s: [u64; 4],
}

impl IdRng {
    /// Create a generator from a `u64` seed. Equal seeds yield equal
    /// sequences on every platform.
    pub fn new(seed: u64) -> Self {
        let mut sm = seed;
        Self {
            s: [
                splitmix64(&mut sm),
                splitmix64(&mut sm),
                splitmix64(&mut sm),
                splitmix64(&mut sm),
            ],
        }
    }

    /// Seed from the operating system's entropy source.
    pub fn from_entropy() -> Self {
        Self::new(rand::random())
    }

    pub fn next_u64(&mut self) -> u64 {
        let result = (self.s[0].wrapping_add(self.s[3]))
            .rotate_left(23)
            .wrapping_add(self.s[0]);

        let t = self.s[1] << 17;

        self.s[2] ^= self.s[0];
        self.s[3] ^= self.s[1];
        self.s[1] ^= self.s[2];
        self.s[0] ^= self.s[3];

        self.s[2] ^= t;
        self.s[3] = self.s[3].rotate_left(45);

        result
    }

    /// Uniform integer in `[low, high)`, rejection-sampled so small ranges
    /// carry no modulo bias.
    ///
    /// Panics if `low >= high`.
    pub fn range_usize(&mut self, low: usize, high: usize) -> usize {
        assert!(low < high, "range_usize: low must be less than high");
        let range = (high - low) as u64;
        if range.is_power_of_two() {
            return low + (self.next_u64() & (range - 1)) as usize;
        }
        let threshold = range.wrapping_neg() % range;
        loop {
            let r = self.next_u64();
            if r >= threshold {
                return low + (r % range) as usize;
            }
        }
    }
}

/// SplitMix64 step, used only to expand a seed into xoshiro state.
fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9e37_79b9_7f4a_7c15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

/// Produces `ID_LENGTH`-symbol ids from an owned `IdRng`.
#[derive(Clone, Debug)]
pub struct IdGenerator {
    rng: IdRng,
}

impl IdGenerator {
    pub fn new(rng: IdRng) -> Self {
        Self { rng }
    }

    /// Deterministic generator for tests.
    pub fn seeded(seed: u64) -> Self {
        Self::new(IdRng::new(seed))
    }

    pub fn from_entropy() -> Self {
        Self::new(IdRng::from_entropy())
    }

    pub fn next_id(&mut self) -> String {
        (0..ID_LENGTH)
            .map(|_| ID_ALPHABET[self.rng.range_usize(0, ID_ALPHABET.len())] as char)
            .collect()
    }
}
