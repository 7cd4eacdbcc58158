// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! A fixed-size bitset over texture pool slots.

use super::TEXTURE_POOL_CAPACITY;

const WORDS: usize = (TEXTURE_POOL_CAPACITY as usize).div_ceil(64);

/// One bit per texture pool slot.
///
/// Used both as the pool's "upload finished" set and as the set of slots a
/// scene depends on; a scene is ready when its mask is a subset of the
/// pool's.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TextureMask {
    words: [u64; WORDS],
}

impl TextureMask {
    /// An empty mask.
    pub const fn new() -> Self {
        Self { words: [0; WORDS] }
    }

    /// Sets the bit of `slot`. Slots beyond the pool capacity are ignored.
    pub fn set(&mut self, slot: u32) {
        if slot < TEXTURE_POOL_CAPACITY {
            self.words[slot as usize / 64] |= 1 << (slot % 64);
        }
    }

    /// Clears the bit of `slot`.
    pub fn clear(&mut self, slot: u32) {
        if slot < TEXTURE_POOL_CAPACITY {
            self.words[slot as usize / 64] &= !(1 << (slot % 64));
        }
    }

    /// Returns `true` if the bit of `slot` is set.
    pub fn contains(&self, slot: u32) -> bool {
        slot < TEXTURE_POOL_CAPACITY && self.words[slot as usize / 64] & (1 << (slot % 64)) != 0
    }

    /// Returns `true` if every bit of `other` is also set here.
    pub fn contains_all(&self, other: &TextureMask) -> bool {
        self.words
            .iter()
            .zip(other.words.iter())
            .all(|(mine, theirs)| mine & theirs == *theirs)
    }

    /// Number of set bits.
    pub fn count(&self) -> u32 {
        self.words.iter().map(|w| w.count_ones()).sum()
    }

    /// Returns `true` when no bit is set.
    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|w| *w == 0)
    }

    /// Set slots in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        (0..TEXTURE_POOL_CAPACITY).filter(|slot| self.contains(*slot))
    }
}

impl FromIterator<u32> for TextureMask {
    fn from_iter<I: IntoIterator<Item = u32>>(iter: I) -> Self {
        let mut mask = Self::new();
        iter.into_iter().for_each(|slot| mask.set(slot));
        mask
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subset_checks() {
        let loaded: TextureMask = [0, 3, 64, 299].into_iter().collect();
        let wanted: TextureMask = [3, 64].into_iter().collect();
        assert!(loaded.contains_all(&wanted));
        assert!(!wanted.contains_all(&loaded));
        assert!(loaded.contains_all(&TextureMask::new()));
    }

    #[test]
    fn out_of_range_slots_are_ignored() {
        let mut mask = TextureMask::new();
        mask.set(TEXTURE_POOL_CAPACITY);
        assert!(mask.is_empty());
        mask.set(7);
        mask.set(7);
        assert_eq!(mask.count(), 1);
        mask.clear(7);
        assert!(!mask.contains(7));
    }

    #[test]
    fn iterates_in_order() {
        let mask: TextureMask = [130, 2, 65].into_iter().collect();
        assert_eq!(mask.iter().collect::<Vec<_>>(), vec![2, 65, 130]);
    }
}
