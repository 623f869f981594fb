//! Unit tests for the word model

use core_types::{
    float_to_words, pack_function, unpack_function, words_to_float, FLOAT_WORDS, NIL, WORD_BITS,
    WORD_BYTES,
};

#[cfg(test)]
mod word_tests {
    use super::*;

    #[test]
    fn test_nil_is_zero() {
        assert_eq!(NIL, 0);
    }

    #[test]
    fn test_word_sizes_agree() {
        assert_eq!(WORD_BITS, WORD_BYTES * 8);
        assert!(FLOAT_WORDS == 1 || FLOAT_WORDS == 2);
    }

    #[test]
    fn test_negative_float_roundtrip() {
        let words = float_to_words(-1234.5678);
        assert_eq!(words.len(), FLOAT_WORDS);
        assert_eq!(words_to_float(&words), -1234.5678);
    }

    #[test]
    fn test_nan_roundtrip_keeps_nan() {
        assert!(words_to_float(&float_to_words(f64::NAN)).is_nan());
    }

    #[test]
    fn test_short_slice_reads_zero() {
        assert_eq!(words_to_float(&[]), 0.0);
    }

    #[test]
    fn test_function_packing_masks_to_16_bits() {
        let word = pack_function(0x1_0002, 0x3);
        assert_eq!(unpack_function(word), (2, 3));
    }
}
