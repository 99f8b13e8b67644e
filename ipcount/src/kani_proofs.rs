//! Kani proofs and proptest harnesses for the bit-level and parsing code.
//!
//! Run with: `cargo kani --tests`
//!
//! The window ownership rule is exercised by proptest in `window.rs`; its
//! slice searches are too wide for useful symbolic execution.

#[cfg(kani)]
mod kani_harnesses {
    use crate::bitmap::{word_and_mask, WORD_COUNT};
    use crate::codec::{decode, MAX_LITERAL_LEN};

    /// Every address maps to an in-bounds word and a single-bit mask.
    #[kani::proof]
    fn proof_word_and_mask_in_bounds() {
        let addr: u32 = kani::any();
        let (word, mask) = word_and_mask(addr);
        kani::assert(word < WORD_COUNT, "word index out of bounds");
        kani::assert(mask.count_ones() == 1, "mask must select one bit");
        kani::assert(
            word as u64 * 64 + u64::from(mask.trailing_zeros()) == u64::from(addr),
            "word/offset must reconstruct the address",
        );
    }

    /// Decoding arbitrary short input never panics.
    #[kani::proof]
    #[kani::unwind(17)]
    fn proof_decode_total() {
        let bytes: [u8; MAX_LITERAL_LEN] = kani::any();
        let len: usize = kani::any();
        kani::assume(len <= MAX_LITERAL_LEN);
        let _ = decode(&bytes[..len]);
    }
}
