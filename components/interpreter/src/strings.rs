//! Conversions between host strings and heap arrays
//!
//! A VM string is an instance of `System.String` whose field 0 is a char
//! array (fields 1 and 2, when declared, hold its length). Char and byte
//! arrays store one element per word.
//!
//! Helpers that allocate more than once pin the intermediate handles on the
//! operand stack, so a collection triggered by the second allocation still
//! sees the first.

use std::sync::Arc;

use core_types::{Fault, Word, NIL};
use memory_manager::{ArrayKind, BlockKind, HeapBlock, MemoryManager};

use crate::context::ThreadState;

/// Looks up an array block; Nil and non-arrays are a Nil dereference.
pub fn array_block(memory: &MemoryManager, handle: Word) -> Result<Arc<HeapBlock>, Fault> {
    let block = memory.get(handle)?;
    if block.kind().is_array() {
        Ok(block)
    } else {
        Err(Fault::NilDereference)
    }
}

/// Element `index` of an array, bounds checked against its count.
pub fn element(block: &HeapBlock, index: usize) -> Option<Word> {
    if index < block.array_len() {
        block.words().get(block.array_data_offset() + index)
    } else {
        None
    }
}

/// Writes element `index`; false when out of range.
pub fn set_element(block: &HeapBlock, index: usize, value: Word) -> bool {
    index < block.array_len() && block.words().set(block.array_data_offset() + index, value)
}

/// Characters of a char array, up to its count or the first NUL.
pub fn chars_to_string(block: &HeapBlock) -> String {
    let start = block.array_data_offset();
    (0..block.array_len())
        .map_while(|i| block.words().get(start + i))
        .take_while(|code| *code != 0)
        .map(|code| char::from_u32(code as u32).unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect()
}

/// Bytes of a byte array.
pub fn bytes_of(block: &HeapBlock) -> Vec<u8> {
    let start = block.array_data_offset();
    (0..block.array_len())
        .filter_map(|i| block.words().get(start + i))
        .map(|byte| byte as u8)
        .collect()
}

/// Copies `text` into an existing char array, truncating at its count and
/// NUL terminating.
///
/// # Returns
///
/// The number of characters written.
pub fn write_chars(block: &HeapBlock, text: &str) -> usize {
    let start = block.array_data_offset();
    let capacity = block.array_len();
    let mut written = 0;
    for c in text.chars().take(capacity) {
        block.words().set(start + written, c as Word);
        written += 1;
    }
    block.words().set(start + written, 0);
    written
}

/// Copies `bytes` into an existing byte array from `offset`.
pub fn write_bytes(block: &HeapBlock, offset: usize, bytes: &[u8]) -> usize {
    let start = block.array_data_offset() + offset;
    let room = block.array_len().saturating_sub(offset);
    let count = bytes.len().min(room);
    for (i, byte) in bytes[..count].iter().enumerate() {
        block.words().set(start + i, *byte as Word);
    }
    count
}

/// Reads a string argument.
///
/// Accepts a `System.String` instance or a bare char array.
///
/// # Returns
///
/// `None` for Nil.
pub fn string_of(memory: &MemoryManager, handle: Word) -> Result<Option<String>, Fault> {
    if handle == NIL {
        return Ok(None);
    }
    let block = memory.get(handle)?;
    match block.kind() {
        BlockKind::CharArray => Ok(Some(chars_to_string(&block))),
        BlockKind::Object { .. } => {
            let chars = block.words().load(0)?;
            if chars == NIL {
                return Ok(None);
            }
            Ok(Some(chars_to_string(&*array_block(memory, chars)?)))
        }
        _ => Err(Fault::NilDereference),
    }
}

/// Allocates a char array holding `text`.
pub fn new_char_array(
    memory: &MemoryManager,
    state: &ThreadState,
    text: &str,
) -> Result<Word, Fault> {
    let chars: Vec<char> = text.chars().collect();
    let handle = memory.allocate_array(ArrayKind::Char, &[chars.len()], state)?;
    let block = memory.get(handle)?;
    let start = block.array_data_offset();
    for (i, c) in chars.iter().enumerate() {
        block.words().set(start + i, *c as Word);
    }
    Ok(handle)
}

/// Allocates a byte array holding `bytes`.
pub fn new_byte_array(
    memory: &MemoryManager,
    state: &ThreadState,
    bytes: &[u8],
) -> Result<Word, Fault> {
    let handle = memory.allocate_array(ArrayKind::Byte, &[bytes.len()], state)?;
    write_bytes(&*memory.get(handle)?, 0, bytes);
    Ok(handle)
}

/// Allocates a `System.String` holding `text`.
///
/// Programs without a string class get the bare char array.
pub fn new_string(
    memory: &MemoryManager,
    state: &mut ThreadState,
    text: &str,
) -> Result<Word, Fault> {
    let chars = new_char_array(memory, state, text)?;
    let Some(class_id) = memory.program().string_class().map(|cls| cls.id()) else {
        return Ok(chars);
    };

    state.push_int(chars);
    let object = memory.allocate_object(class_id, &*state);
    state.pop_int()?;
    let object = object?;

    let len = text.chars().count() as Word;
    let words = memory.get(object)?;
    words.words().set(0, chars);
    words.words().set(1, len);
    words.words().set(2, len);
    Ok(object)
}

/// Allocates an object array of `System.String` instances.
pub fn new_string_array(
    memory: &MemoryManager,
    state: &mut ThreadState,
    items: &[String],
) -> Result<Word, Fault> {
    let array = memory.allocate_array(ArrayKind::Object, &[items.len()], &*state)?;
    state.push_int(array);
    let filled = fill_strings(memory, state, array, items);
    state.pop_int()?;
    filled.map(|_| array)
}

fn fill_strings(
    memory: &MemoryManager,
    state: &mut ThreadState,
    array: Word,
    items: &[String],
) -> Result<(), Fault> {
    for (i, item) in items.iter().enumerate() {
        let value = new_string(memory, state, item)?;
        set_element(&*memory.get(array)?, i, value);
    }
    Ok(())
}
