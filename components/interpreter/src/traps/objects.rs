//! Class lookups, pooled-constant copies and string conversions

use std::sync::Arc;

use bytecode_system::TrapId;
use core_types::{float_to_words, Fault, Word, FLOAT_WORDS, NIL};
use memory_manager::{ArrayKind, BlockKind};

use super::{frame_self, pop_string, Guard};
use crate::runtime::Runtime;
use crate::strings;

/// Class whose instances describe a class by name.
const CLASS_OBJECT: &str = "System.Introspection.Class";

pub(super) fn trap(rt: &Arc<Runtime>, state: &mut Guard<'_>, trap: TrapId) -> Result<(), Fault> {
    use TrapId::*;
    let memory = rt.memory();
    let program = rt.program();

    match trap {
        LoadClsInstId => {
            let handle = state.pop_int()?;
            let class_id = match memory.get(handle)?.kind() {
                BlockKind::Object { class_id } => class_id as Word,
                _ => -1,
            };
            state.push_int(class_id);
        }
        LoadInstUid => {
            let handle = state.pop_int()?;
            state.push_int(handle);
        }
        LoadClsByName => {
            let name = pop_string(rt, state)?;
            let id = name
                .and_then(|name| program.class_by_name(&name).map(|cls| cls.id() as Word))
                .unwrap_or(-1);
            state.push_int(id);
        }
        LoadClsByInst => {
            let instance = frame_self(state)?;
            let class_id = memory
                .get(instance)?
                .kind()
                .class_id()
                .ok_or(Fault::NilDereference)?;
            let name = program
                .class(class_id)
                .ok_or(Fault::UnknownClass(class_id as i64))?
                .name()
                .to_string();
            let value = class_object(rt, state, &name)?;
            state.frame_mut()?.store(1, value)?;
        }
        LoadNewObjInst => {
            let name = pop_string(rt, state)?;
            let class_id = name.and_then(|name| program.class_by_name(&name).map(|cls| cls.id()));
            match class_id {
                Some(class_id) => {
                    let object = memory.allocate_object(class_id, &**state)?;
                    state.push_int(object);
                }
                None => state.push_int(NIL),
            }
        }
        LoadMultiArySize => {
            let handle = state.pop_int()?;
            let block = strings::array_block(memory, handle)?;
            let extents: Vec<usize> = (0..block.array_dims())
                .map(|dim| block.array_extent(dim))
                .collect();
            let sizes = memory.allocate_array(ArrayKind::Int, &[extents.len()], &**state)?;
            let target = memory.get(sizes)?;
            for (dim, extent) in extents.iter().enumerate() {
                strings::set_element(&target, dim, *extent as Word);
            }
            state.push_int(sizes);
        }

        CpyCharStrAry => {
            let index = state.pop_int()?;
            let handle = state.pop_int()?;
            let block = strings::array_block(memory, handle)?;
            let text = program.char_string(index as usize).unwrap_or_default();
            strings::write_chars(&block, text);
            state.push_int(handle);
        }
        CpyCharStrArys => {
            let handle = state.pop_int()?;
            let block = strings::array_block(memory, handle)?;
            for i in 0..block.array_len() {
                let value = state.pop_int()?;
                strings::set_element(&block, i, value);
            }
            state.push_int(handle);
        }
        CpyIntStrAry | CpyByteStrAry | CpyBoolStrAry => {
            let index = state.pop_int()?;
            let handle = state.pop_int()?;
            let block = strings::array_block(memory, handle)?;
            let values = program.int_string(index as usize).unwrap_or_default();
            for (i, value) in values.iter().enumerate() {
                strings::set_element(&block, i, *value as Word);
            }
            state.push_int(handle);
        }
        CpyFloatStrAry => {
            let index = state.pop_int()?;
            let handle = state.pop_int()?;
            let block = strings::array_block(memory, handle)?;
            let values = program.float_string(index as usize).unwrap_or_default();
            let start = block.array_data_offset();
            for (i, value) in values.iter().take(block.array_len()).enumerate() {
                for (w, word) in float_to_words(*value).iter().enumerate() {
                    block.words().set(start + i * FLOAT_WORDS + w, *word);
                }
            }
            state.push_int(handle);
        }

        BytesToUnicode => {
            let handle = state.pop_int()?;
            let block = strings::array_block(memory, handle)?;
            let bytes = strings::bytes_of(&block);
            let end = bytes.iter().position(|b| *b == 0).unwrap_or(bytes.len());
            let text = String::from_utf8_lossy(&bytes[..end]).into_owned();
            let chars = strings::new_char_array(memory, state, &text)?;
            state.push_int(chars);
        }
        UnicodeToBytes => {
            let handle = state.pop_int()?;
            let block = strings::array_block(memory, handle)?;
            let text = strings::chars_to_string(&block);
            let bytes = strings::new_byte_array(memory, state, text.as_bytes())?;
            state.push_int(bytes);
        }
        StringHashId => {
            let handle = state.pop_int()?;
            let text = strings::string_of(memory, handle)?.unwrap_or_default();
            state.push_int(string_hash(&text));
        }
        _ => state.push_int(0),
    }
    Ok(())
}

/// A class descriptor holding `name`, or the bare name string when the
/// program has no descriptor class.
fn class_object(rt: &Runtime, state: &mut Guard<'_>, name: &str) -> Result<Word, Fault> {
    let memory = rt.memory();
    let name_handle = strings::new_string(memory, state, name)?;
    let Some(class_id) = rt.program().class_by_name(CLASS_OBJECT).map(|cls| cls.id()) else {
        return Ok(name_handle);
    };
    state.push_int(name_handle);
    let object = memory.allocate_object(class_id, &**state);
    state.pop_int()?;
    let object = object?;
    memory.get(object)?.words().store(0, name_handle)?;
    Ok(object)
}

/// Polynomial string hash shared by every thread.
pub(crate) fn string_hash(text: &str) -> Word {
    text.chars()
        .fold(0 as Word, |hash, c| hash.wrapping_mul(31).wrapping_add(c as Word))
}
