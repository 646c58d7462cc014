//! Width-independent tag/index bit packing.
//!
//! A word of `word_bits` bits is split into a tag held in the top `tag_bits`
//! bits and an index held in the remaining low bits. Every mask is computed in
//! `u64` so one layout description serves 16, 32 or 64 bit words; callers
//! narrow the results to their own integer type.
//!
//! All functions are `const`, so a concrete layout folds down to plain
//! constants at compile time.

/// Describes how a word is split between a tag and an index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagLayout {
    word_bits: u32,
    tag_bits: u32,
}

impl TagLayout {
    /// Create a layout for a `word_bits`-wide word with a `tag_bits`-wide tag.
    ///
    /// Panics (at compile time when used in a `const`) if the tag does not
    /// leave at least one index bit or the word is wider than 64 bits.
    pub const fn new(word_bits: u32, tag_bits: u32) -> Self {
        assert!(word_bits <= 64, "word wider than 64 bits");
        assert!(tag_bits > 0, "tag must be at least one bit");
        assert!(tag_bits < word_bits, "tag leaves no index bits");
        Self {
            word_bits,
            tag_bits,
        }
    }

    /// Width of the whole word in bits.
    pub const fn word_bits(&self) -> u32 {
        self.word_bits
    }

    /// Width of the tag in bits.
    pub const fn tag_bits(&self) -> u32 {
        self.tag_bits
    }

    /// Number of index bits.
    pub const fn index_bits(&self) -> u32 {
        self.word_bits - self.tag_bits
    }

    /// Bit position of the lowest tag bit.
    pub const fn shift(&self) -> u32 {
        self.index_bits()
    }

    /// Mask covering every bit of the word.
    pub const fn word_mask(&self) -> u64 {
        if self.word_bits == 64 {
            u64::MAX
        } else {
            (1u64 << self.word_bits) - 1
        }
    }

    /// Largest tag value that fits.
    pub const fn max_tag(&self) -> u64 {
        (1u64 << self.tag_bits) - 1
    }

    /// Mask covering the tag region, in place.
    pub const fn tag_mask(&self) -> u64 {
        self.max_tag() << self.shift()
    }

    /// Mask covering the index region.
    pub const fn index_mask(&self) -> u64 {
        self.word_mask() & !self.tag_mask()
    }

    /// Largest index that fits.
    pub const fn max_index(&self) -> u64 {
        self.index_mask()
    }

    /// Pack `index` and `tag` into one word. Out-of-range bits of either
    /// argument are dropped.
    pub const fn pack(&self, index: u64, tag: u64) -> u64 {
        (index & self.index_mask()) | ((tag << self.shift()) & self.tag_mask())
    }

    /// Tag stored in `word`. `word` must be zero-extended, not sign-extended.
    pub const fn tag_of(&self, word: u64) -> u64 {
        (word & self.tag_mask()) >> self.shift()
    }

    /// Index stored in `word`.
    pub const fn index_of(&self, word: u64) -> u64 {
        word & self.index_mask()
    }

    /// Whether `index` fits without touching the tag region.
    pub const fn index_fits(&self, index: u64) -> bool {
        index & !self.index_mask() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_masks_32_bit() {
        let layout = TagLayout::new(32, 2);
        assert_eq!(layout.shift(), 30);
        assert_eq!(layout.tag_mask(), 0xC000_0000);
        assert_eq!(layout.index_mask(), 0x3FFF_FFFF);
        assert_eq!(layout.max_tag(), 3);
    }

    #[test]
    fn test_masks_other_widths() {
        let narrow = TagLayout::new(16, 2);
        assert_eq!(narrow.tag_mask(), 0xC000);
        assert_eq!(narrow.index_mask(), 0x3FFF);

        let wide = TagLayout::new(64, 3);
        assert_eq!(wide.shift(), 61);
        assert_eq!(wide.tag_mask(), 0xE000_0000_0000_0000);
        assert_eq!(wide.index_mask(), 0x1FFF_FFFF_FFFF_FFFF);
        assert_eq!(wide.tag_mask() | wide.index_mask(), u64::MAX);
    }

    #[test]
    fn test_pack_and_unpack() {
        let layout = TagLayout::new(32, 2);
        let word = layout.pack(12345, 2);
        assert_eq!(layout.tag_of(word), 2);
        assert_eq!(layout.index_of(word), 12345);

        // Top tag bit is the word's top bit; must not leak beyond the word.
        let word = layout.pack(layout.max_index(), layout.max_tag());
        assert_eq!(word, 0xFFFF_FFFF);
    }

    #[test]
    fn test_pack_drops_out_of_range_bits() {
        let layout = TagLayout::new(16, 2);
        let word = layout.pack(0xFFFF, 0b111);
        assert_eq!(layout.index_of(word), 0x3FFF);
        assert_eq!(layout.tag_of(word), 0b11);
        assert!(word <= layout.word_mask());
    }

    #[test]
    fn test_index_fits() {
        let layout = TagLayout::new(32, 2);
        assert!(layout.index_fits(0));
        assert!(layout.index_fits(layout.max_index()));
        assert!(!layout.index_fits(layout.max_index() + 1));
    }

    #[test]
    #[should_panic(expected = "tag leaves no index bits")]
    fn test_tag_as_wide_as_word_panics() {
        let _ = TagLayout::new(8, 8);
    }
}
