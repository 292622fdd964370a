// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! SequenceNumberSet used by ACKNACK (`readerSNState`) and GAP (`gapList`).
//!
//! Bit `i` of the bitmap (MSB-first within each 32-bit word) stands for `base + i`.
//! At most 256 bits may be carried.

use super::codec::{ByteReader, ByteWriter};
use super::DecodeError;

/// Maximum bits in one set.
pub const MAX_BITMAP_BITS: u32 = 256;
const WORD_BITS: u32 = 32;
const BITMAP_WORDS: usize = 8;

#[derive(Clone, PartialEq, Eq)]
pub struct SequenceNumberSet {
    base: u64,
    num_bits: u32,
    bitmap: [u32; BITMAP_WORDS],
}

impl SequenceNumberSet {
    /// Empty set anchored at `base`.
    pub fn new(base: u64) -> Self {
        Self {
            base,
            num_bits: 0,
            bitmap: [0; BITMAP_WORDS],
        }
    }

    /// Build from sequence numbers. Values outside `[base, base + 256)` are dropped and
    /// reported through the returned flag.
    pub fn from_sequences<I>(base: u64, seqs: I) -> (Self, bool)
    where
        I: IntoIterator<Item = u64>,
    {
        let mut set = Self::new(base);
        let mut all_fit = true;
        for sn in seqs {
            all_fit &= set.insert(sn);
        }
        (set, all_fit)
    }

    /// Add `sn` to the set. Returns false when out of range.
    pub fn insert(&mut self, sn: u64) -> bool {
        if sn < self.base {
            return false;
        }
        let offset = sn - self.base;
        if offset >= u64::from(MAX_BITMAP_BITS) {
            return false;
        }
        let offset = offset as u32;
        let word = (offset / WORD_BITS) as usize;
        let bit = offset % WORD_BITS;
        self.bitmap[word] |= 1 << (31 - bit);
        self.num_bits = self.num_bits.max(offset + 1);
        true
    }

    #[must_use]
    pub fn contains(&self, sn: u64) -> bool {
        if sn < self.base {
            return false;
        }
        let offset = sn - self.base;
        if offset >= u64::from(self.num_bits) {
            return false;
        }
        let offset = offset as u32;
        self.bitmap[(offset / WORD_BITS) as usize] & (1 << (31 - offset % WORD_BITS)) != 0
    }

    pub fn base(&self) -> u64 {
        self.base
    }

    pub fn num_bits(&self) -> u32 {
        self.num_bits
    }

    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }

    /// Ascending iterator over the members.
    pub fn iter(&self) -> impl Iterator<Item = u64> + '_ {
        (0..self.num_bits).filter_map(move |offset| {
            let word = self.bitmap[(offset / WORD_BITS) as usize];
            if word & (1 << (31 - offset % WORD_BITS)) != 0 {
                Some(self.base + u64::from(offset))
            } else {
                None
            }
        })
    }

    pub(crate) fn encode(&self, w: &mut ByteWriter) {
        w.put_seq(self.base);
        w.put_u32(self.num_bits);
        let words = self.num_bits.div_ceil(WORD_BITS) as usize;
        for word in &self.bitmap[..words] {
            w.put_u32(*word);
        }
    }

    pub(crate) fn decode(r: &mut ByteReader<'_>) -> Result<Self, DecodeError> {
        let base = r.seq()?;
        let num_bits = r.u32()?;
        if num_bits > MAX_BITMAP_BITS {
            return Err(DecodeError::InvalidSubmessage("bitmap exceeds 256 bits"));
        }
        let mut bitmap = [0u32; BITMAP_WORDS];
        let words = num_bits.div_ceil(WORD_BITS) as usize;
        for slot in bitmap.iter_mut().take(words) {
            *slot = r.u32()?;
        }
        // Clear bits beyond num_bits so contains()/iter() agree.
        if num_bits % WORD_BITS != 0 {
            let last = words - 1;
            bitmap[last] &= !(u32::MAX >> (num_bits % WORD_BITS));
        }
        Ok(Self {
            base,
            num_bits,
            bitmap,
        })
    }

    /// Encoded size in bytes.
    pub fn wire_len(&self) -> usize {
        12 + self.num_bits.div_ceil(WORD_BITS) as usize * 4
    }
}

impl std::fmt::Debug for SequenceNumberSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SNSet({}:", self.base)?;
        f.debug_list().entries(self.iter()).finish()?;
        f.write_str(")")
    }
}
