//! Native word model.
//!
//! Everything the machine touches is a signed native word: integers, chars,
//! object handles and the raw halves of floats. A float takes one word on
//! 64-bit targets and two on 32-bit targets.

/// Native machine word.
pub type Word = isize;

/// The Nil reference.
pub const NIL: Word = 0;

/// Size of a word in bytes.
pub const WORD_BYTES: usize = std::mem::size_of::<Word>();

/// Size of a word in bits.
pub const WORD_BITS: usize = WORD_BYTES * 8;

/// Number of words a float occupies.
pub const FLOAT_WORDS: usize = if WORD_BYTES >= 8 { 1 } else { 2 };

/// Splits a float into its word representation, low bits first.
pub fn float_to_words(value: f64) -> [Word; FLOAT_WORDS] {
    let bits = value.to_bits();
    let mut words = [0; FLOAT_WORDS];
    for (i, word) in words.iter_mut().enumerate() {
        *word = (bits >> (i * WORD_BITS)) as usize as Word;
    }
    words
}

/// Reassembles a float from the first [`FLOAT_WORDS`] words of `words`.
///
/// Missing words read as zero.
pub fn words_to_float(words: &[Word]) -> f64 {
    let mut bits = 0u64;
    for (i, word) in words.iter().take(FLOAT_WORDS).enumerate() {
        bits |= (*word as usize as u64) << (i * WORD_BITS);
    }
    f64::from_bits(bits)
}

/// Packs a class and method id into the single word used by function values.
pub fn pack_function(class_id: usize, method_id: usize) -> Word {
    (((class_id & 0xFFFF) << 16) | (method_id & 0xFFFF)) as Word
}

/// Splits a packed function word into `(class_id, method_id)`.
pub fn unpack_function(word: Word) -> (usize, usize) {
    let raw = word as usize;
    ((raw >> 16) & 0xFFFF, raw & 0xFFFF)
}
