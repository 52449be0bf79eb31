//! Keyed 64-bit hash over byte spans (SipHash-1-2).
//!
//! One compression round per 8-byte block and two finalization rounds. The
//! 128-bit key is carried by [`HashSeed`]; the stock descriptors in
//! [`crate::dict_type`] hold one each.

use rand::RngCore;

const V0_INIT: u64 = 0x736f_6d65_7073_6575;
const V1_INIT: u64 = 0x646f_7261_6e64_6f6d;
const V2_INIT: u64 = 0x6c79_6765_6e65_7261;
const V3_INIT: u64 = 0x7465_6462_7974_6573;

/// 128-bit key for [`siphash`].
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct HashSeed([u8; 16]);

impl HashSeed {
    /// Fixed seed used unless a caller opts into a random one.
    pub const DEFAULT: HashSeed = HashSeed(*b"rehash-dict-seed");

    pub const fn new(bytes: [u8; 16]) -> Self {
        HashSeed(bytes)
    }

    /// Fresh seed from the thread-local RNG. Makes bucket placement
    /// unpredictable across processes.
    pub fn random() -> Self {
        let mut bytes = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut bytes);
        HashSeed(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    fn words(&self) -> (u64, u64) {
        let mut lo = [0u8; 8];
        let mut hi = [0u8; 8];
        lo.copy_from_slice(&self.0[..8]);
        hi.copy_from_slice(&self.0[8..]);
        (u64::from_le_bytes(lo), u64::from_le_bytes(hi))
    }
}

impl Default for HashSeed {
    fn default() -> Self {
        Self::DEFAULT
    }
}

struct State {
    v0: u64,
    v1: u64,
    v2: u64,
    v3: u64,
}

impl State {
    fn new(seed: &HashSeed) -> Self {
        let (k0, k1) = seed.words();
        State {
            v0: V0_INIT ^ k0,
            v1: V1_INIT ^ k1,
            v2: V2_INIT ^ k0,
            v3: V3_INIT ^ k1,
        }
    }

    #[inline]
    fn round(&mut self) {
        self.v0 = self.v0.wrapping_add(self.v1);
        self.v1 = self.v1.rotate_left(13);
        self.v1 ^= self.v0;
        self.v0 = self.v0.rotate_left(32);
        self.v2 = self.v2.wrapping_add(self.v3);
        self.v3 = self.v3.rotate_left(16);
        self.v3 ^= self.v2;
        self.v0 = self.v0.wrapping_add(self.v3);
        self.v3 = self.v3.rotate_left(21);
        self.v3 ^= self.v0;
        self.v2 = self.v2.wrapping_add(self.v1);
        self.v1 = self.v1.rotate_left(17);
        self.v1 ^= self.v2;
        self.v2 = self.v2.rotate_left(32);
    }

    #[inline]
    fn compress(&mut self, m: u64) {
        self.v3 ^= m;
        self.round();
        self.v0 ^= m;
    }

    fn finish(mut self) -> u64 {
        self.v2 ^= 0xff;
        self.round();
        self.round();
        self.v0 ^ self.v1 ^ self.v2 ^ self.v3
    }
}

fn hash_with(data: &[u8], seed: &HashSeed, map: impl Fn(u8) -> u8) -> u64 {
    let mut state = State::new(seed);
    let mut blocks = data.chunks_exact(8);
    for block in &mut blocks {
        let mut word = [0u8; 8];
        for (dst, &src) in word.iter_mut().zip(block) {
            *dst = map(src);
        }
        state.compress(u64::from_le_bytes(word));
    }

    // Final block: trailing bytes little-endian, input length in the top byte.
    let mut last = (data.len() as u64) << 56;
    for (i, &b) in blocks.remainder().iter().enumerate() {
        last |= u64::from(map(b)) << (8 * i);
    }
    state.compress(last);
    state.finish()
}

/// SipHash-1-2 of `data` under `seed`.
pub fn siphash(data: &[u8], seed: &HashSeed) -> u64 {
    hash_with(data, seed, |b| b)
}

/// Same as [`siphash`] with ASCII letters folded to lower case, so that
/// keys differing only in case hash identically.
pub fn siphash_nocase(data: &[u8], seed: &HashSeed) -> u64 {
    hash_with(data, seed, |b| b.to_ascii_lowercase())
}
