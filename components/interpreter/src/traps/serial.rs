//! Object serialization traps
//!
//! The serializer or deserializer is the receiver of the executing frame:
//! field 0 is its byte-array buffer, field 1 the read/write position. The
//! value to write sits in frame slot 1.
//!
//! Every top-level value starts with its [`ParamType`] tag. Integers are
//! 32-bit little-endian, floats 64-bit little-endian, present flags single
//! bytes. Objects carry their class id and a reference id: the first visit
//! of a block in one walk writes `-n` followed by the payload, later visits
//! write `+n` alone, so shared and cyclic graphs round-trip.
//!
//! Reading is split in two passes. The bytes are first decoded into a flat
//! [`Graph`] of records without touching the heap; malformed input, including
//! a repeat id the walk never introduced, stops there and leaves the position
//! where it was. Only a complete graph is allocated, and every block it
//! creates stays pinned on the operand stack until the root is pushed.
//!
//! Both directions keep an explicit work stack, so graph depth is bounded by
//! heap size rather than by the native stack.

use std::collections::HashMap;
use std::sync::Arc;

use bytecode_system::{declaration_layout, ParamType, Program, TrapId};
use core_types::{float_to_words, words_to_float, Fault, Word, FLOAT_WORDS, NIL};
use memory_manager::{ArrayKind, BlockKind, HeapBlock, MemoryManager};

use super::{field, frame_param, frame_self, set_field, Guard};
use crate::runtime::Runtime;
use crate::strings;

const PRESENT: u8 = 1;
const ABSENT: u8 = 0;

pub(super) fn trap(rt: &Arc<Runtime>, state: &mut Guard<'_>, trap: TrapId) -> Result<(), Fault> {
    use TrapId::*;
    match trap {
        SerlInt => {
            let value = frame_param(state)?;
            let mut out = Encoder::default();
            out.tag(ParamType::Int);
            out.int(value);
            append(rt, state, &out.bytes)
        }
        SerlFloat => {
            let frame = state.frame()?;
            let value = frame
                .locals
                .get(1..1 + FLOAT_WORDS)
                .map(words_to_float)
                .ok_or(Fault::MemoryAccess {
                    index: 1,
                    size: frame.locals.len() as i64,
                })?;
            let mut out = Encoder::default();
            out.tag(ParamType::Float);
            out.float(value);
            append(rt, state, &out.bytes)
        }
        SerlChar => {
            let value = frame_param(state)?;
            let mut out = Encoder::default();
            out.tag(ParamType::Char);
            out.char(value);
            append(rt, state, &out.bytes)
        }
        SerlByteAry | SerlCharAry | SerlIntAry | SerlFloatAry | SerlObjAry => {
            let kind = array_type(trap);
            let value = frame_param(state)?;
            let mut out = Encoder::default();
            out.tag(kind);
            out.top_array(rt.memory(), value, kind)?;
            append(rt, state, &out.bytes)
        }
        SerlObjInst => {
            let value = frame_param(state)?;
            let mut out = Encoder::default();
            out.tag(ParamType::Object);
            out.object(rt.memory(), value)?;
            append(rt, state, &out.bytes)
        }

        DeserlInt | DeserlChar => {
            let expected = if trap == DeserlInt { ParamType::Int } else { ParamType::Char };
            let value = read(rt, state, expected, |reader| match expected {
                ParamType::Int => reader.int(),
                _ => reader.char(),
            })?;
            state.push_int(value.unwrap_or(0));
            Ok(())
        }
        DeserlFloat => {
            let value = read(rt, state, ParamType::Float, |reader| reader.float())?;
            state.push_float(value.unwrap_or(0.0));
            Ok(())
        }
        DeserlByteAry | DeserlCharAry | DeserlIntAry | DeserlFloatAry | DeserlObjAry => {
            let kind = array_type(trap);
            let program = rt.program().clone();
            let graph = read(rt, state, kind, |reader| reader.top_array(&program, kind))?;
            materialize_root(rt, state, graph)
        }
        DeserlObjInst => {
            let program = rt.program().clone();
            let graph =
                read(rt, state, ParamType::Object, |reader| reader.object_graph(&program))?;
            materialize_root(rt, state, graph)
        }
        _ => {
            state.push_int(0);
            Ok(())
        }
    }
}

fn array_type(trap: TrapId) -> ParamType {
    match trap {
        TrapId::SerlByteAry | TrapId::DeserlByteAry => ParamType::ByteArray,
        TrapId::SerlCharAry | TrapId::DeserlCharAry => ParamType::CharArray,
        TrapId::SerlIntAry | TrapId::DeserlIntAry => ParamType::IntArray,
        TrapId::SerlFloatAry | TrapId::DeserlFloatAry => ParamType::FloatArray,
        _ => ParamType::ObjectArray,
    }
}

/// Writes `bytes` at the serializer's position, growing its buffer when it
/// is too small.
fn append(rt: &Runtime, state: &mut Guard<'_>, bytes: &[u8]) -> Result<(), Fault> {
    let memory = rt.memory();
    let serializer = frame_self(state)?;
    let mut buffer = field(rt, serializer, 0)?;
    let position = field(rt, serializer, 1)?.max(0) as usize;
    let needed = position.checked_add(bytes.len()).ok_or(Fault::OutOfMemory)?;
    let capacity = if buffer == NIL {
        0
    } else {
        strings::array_block(memory, buffer)?.array_len()
    };

    if needed > capacity {
        let grown = needed.max(capacity.saturating_mul(2));
        let replacement = memory.allocate_array(ArrayKind::Byte, &[grown], &**state)?;
        if buffer != NIL {
            let old = strings::bytes_of(&*strings::array_block(memory, buffer)?);
            let keep = position.min(old.len());
            strings::write_bytes(&*memory.get(replacement)?, 0, &old[..keep]);
        }
        set_field(rt, serializer, 0, replacement)?;
        buffer = replacement;
    }

    strings::write_bytes(&*strings::array_block(memory, buffer)?, position, bytes);
    set_field(rt, serializer, 1, needed as Word)
}

/// Decodes one tagged value at the deserializer's position.
///
/// A tag mismatch consumes the tag and yields `None`. Truncated or
/// inconsistent input yields `None` and leaves the position unchanged.
fn read<T>(
    rt: &Runtime,
    state: &Guard<'_>,
    expected: ParamType,
    decode: impl FnOnce(&mut Reader<'_>) -> Option<T>,
) -> Result<Option<T>, Fault> {
    let deserializer = frame_self(state)?;
    let buffer = field(rt, deserializer, 0)?;
    if buffer == NIL {
        return Ok(None);
    }
    let bytes = strings::bytes_of(&*strings::array_block(rt.memory(), buffer)?);
    let start = field(rt, deserializer, 1)?.max(0) as usize;
    let mut reader = Reader::new(&bytes, start);

    let Some(tag) = reader.int() else {
        return Ok(None);
    };
    if tag != expected.code() as Word {
        set_field(rt, deserializer, 1, reader.pos as Word)?;
        return Ok(None);
    }
    match decode(&mut reader) {
        Some(value) => {
            set_field(rt, deserializer, 1, reader.pos as Word)?;
            Ok(Some(value))
        }
        None => Ok(None),
    }
}

/// Byte sink for one serialization walk.
#[derive(Debug, Default)]
struct Encoder {
    bytes: Vec<u8>,
    seen: HashMap<Word, i32>,
}

/// Rest of a block the encoder has started.
enum Visit {
    /// Declared fields of an object, from a snapshot of its words
    Fields {
        words: Vec<Word>,
        layout: Vec<(usize, ParamType)>,
        next: usize,
    },
    /// Elements of an object array
    Elements { block: Arc<HeapBlock>, next: usize },
}

impl Encoder {
    fn tag(&mut self, kind: ParamType) {
        self.bytes.extend_from_slice(&kind.code().to_le_bytes());
    }

    fn byte(&mut self, value: u8) {
        self.bytes.push(value);
    }

    fn int(&mut self, value: Word) {
        self.bytes.extend_from_slice(&(value as i32).to_le_bytes());
    }

    fn float(&mut self, value: f64) {
        self.bytes.extend_from_slice(&value.to_le_bytes());
    }

    fn text(&mut self, text: &str) {
        self.int(text.len() as Word);
        self.bytes.extend_from_slice(text.as_bytes());
    }

    fn char(&mut self, code: Word) {
        let c = char::from_u32(code as u32).unwrap_or(char::REPLACEMENT_CHARACTER);
        self.text(c.encode_utf8(&mut [0u8; 4]));
    }

    /// Writes the reference id of `handle`.
    ///
    /// # Returns
    ///
    /// True on the first visit, when the payload must follow.
    fn reference(&mut self, handle: Word) -> bool {
        let next = self.seen.len() as i32 + 1;
        let (id, first) = match self.seen.get(&handle) {
            Some(id) => (*id, false),
            None => {
                self.seen.insert(handle, next);
                (next, true)
            }
        };
        self.int(if first { -(id as Word) } else { id as Word });
        first
    }

    /// A top-level array: no reference id, and object elements each start a
    /// fresh walk.
    fn top_array(
        &mut self,
        memory: &MemoryManager,
        handle: Word,
        kind: ParamType,
    ) -> Result<(), Fault> {
        if handle == NIL {
            self.byte(ABSENT);
            return Ok(());
        }
        self.byte(PRESENT);
        let block = strings::array_block(memory, handle)?;
        if kind != ParamType::ObjectArray {
            return self.array_payload(&block, kind);
        }
        self.shape(block.array_len(), block.array_dims(), block.array_extent(0));
        for i in 0..block.array_len() {
            self.seen.clear();
            self.object(memory, strings::element(&block, i).unwrap_or(NIL))?;
        }
        Ok(())
    }

    /// The object graph rooted at `handle`, depth first in declaration order.
    fn object(&mut self, memory: &MemoryManager, handle: Word) -> Result<(), Fault> {
        let mut pending = Vec::new();
        self.object_head(memory, handle, &mut pending)?;
        while let Some(visit) = pending.last_mut() {
            match visit {
                Visit::Fields { words, layout, next } => {
                    let Some(&(offset, decl)) = layout.get(*next) else {
                        pending.pop();
                        continue;
                    };
                    *next += 1;
                    let word = words.get(offset).copied().unwrap_or(NIL);
                    match decl {
                        ParamType::Char => self.char(word),
                        ParamType::Int => self.int(word),
                        ParamType::Float => {
                            let value = words
                                .get(offset..offset + FLOAT_WORDS)
                                .map_or(0.0, words_to_float);
                            self.float(value);
                        }
                        ParamType::Function => {
                            let instance = words.get(offset + 1).copied().unwrap_or(NIL);
                            self.int(word);
                            self.int(instance);
                        }
                        ParamType::Object => self.object_head(memory, word, &mut pending)?,
                        array => self.field_array(memory, word, array, &mut pending)?,
                    }
                }
                Visit::Elements { block, next } => {
                    if *next >= block.array_len() {
                        pending.pop();
                        continue;
                    }
                    let element = strings::element(&**block, *next).unwrap_or(NIL);
                    *next += 1;
                    self.object_head(memory, element, &mut pending)?;
                }
            }
        }
        Ok(())
    }

    /// Presence, class and reference id of an object; its fields are queued
    /// on the first visit.
    fn object_head(
        &mut self,
        memory: &MemoryManager,
        handle: Word,
        pending: &mut Vec<Visit>,
    ) -> Result<(), Fault> {
        if handle == NIL {
            self.byte(ABSENT);
            return Ok(());
        }
        let block = memory.get(handle)?;
        let BlockKind::Object { class_id } = block.kind() else {
            return Err(Fault::InvalidCast {
                from: format!("{:?}", block.kind()),
                to: "object".to_string(),
            });
        };
        self.byte(PRESENT);
        self.int(class_id as Word);
        if self.reference(handle) {
            let class = memory
                .program()
                .class(class_id)
                .ok_or(Fault::UnknownClass(class_id as i64))?;
            pending.push(Visit::Fields {
                words: block.words().to_vec(),
                layout: declaration_layout(class.instance_declarations()),
                next: 0,
            });
        }
        Ok(())
    }

    /// An array referenced from a field declared as `kind`; object elements
    /// are queued on the first visit.
    fn field_array(
        &mut self,
        memory: &MemoryManager,
        handle: Word,
        kind: ParamType,
        pending: &mut Vec<Visit>,
    ) -> Result<(), Fault> {
        if handle == NIL {
            self.byte(ABSENT);
            return Ok(());
        }
        self.byte(PRESENT);
        if !self.reference(handle) {
            return Ok(());
        }
        let block = strings::array_block(memory, handle)?;
        if kind != ParamType::ObjectArray {
            return self.array_payload(&block, kind);
        }
        self.shape(block.array_len(), block.array_dims(), block.array_extent(0));
        pending.push(Visit::Elements { block, next: 0 });
        Ok(())
    }

    fn shape(&mut self, size: usize, dims: usize, extent: usize) {
        self.int(size as Word);
        self.int(dims as Word);
        self.int(extent as Word);
    }

    /// Size, dimensions, first extent and elements of a scalar array
    /// declared as `kind`.
    fn array_payload(&mut self, block: &HeapBlock, kind: ParamType) -> Result<(), Fault> {
        let len = block.array_len();
        let dims = block.array_dims();
        let start = block.array_data_offset();
        match (kind, block.kind()) {
            (ParamType::ByteArray, BlockKind::ByteArray) => {
                self.shape(len, dims, block.array_extent(0));
                let bytes = strings::bytes_of(block);
                self.bytes.extend_from_slice(&bytes);
            }
            (ParamType::CharArray, BlockKind::CharArray) => {
                let text = strings::chars_to_string(block);
                self.shape(text.len(), dims, text.len());
                self.bytes.extend_from_slice(text.as_bytes());
            }
            (ParamType::IntArray, BlockKind::IntArray) => {
                self.shape(len, dims, block.array_extent(0));
                for i in 0..len {
                    self.int(block.words().get(start + i).unwrap_or(0));
                }
            }
            (ParamType::FloatArray, BlockKind::FloatArray) => {
                self.shape(len, dims, block.array_extent(0));
                let words = block.words().to_vec();
                for i in 0..len {
                    let at = start + i * FLOAT_WORDS;
                    self.float(words.get(at..at + FLOAT_WORDS).map_or(0.0, words_to_float));
                }
            }
            (kind, actual) => {
                return Err(Fault::InvalidCast {
                    from: format!("{:?}", actual),
                    to: format!("{:?}", kind),
                });
            }
        }
        Ok(())
    }
}

/// A decoded word: a plain value or the block of another record.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Slot {
    Word(Word),
    Record(usize),
}

/// One block awaiting allocation.
#[derive(Debug, Clone, PartialEq)]
enum Record {
    Object {
        class_id: usize,
        words: Vec<(usize, Slot)>,
    },
    Array(ArrayData),
}

#[derive(Debug, Clone, PartialEq)]
enum ArrayData {
    Bytes(Vec<u8>),
    Chars(String),
    Ints(Vec<Word>),
    Floats(Vec<f64>),
    Objects(Vec<Slot>),
}

impl ArrayData {
    fn shape(&self) -> (ArrayKind, usize) {
        match self {
            ArrayData::Bytes(bytes) => (ArrayKind::Byte, bytes.len()),
            ArrayData::Chars(text) => (ArrayKind::Char, text.chars().count()),
            ArrayData::Ints(values) => (ArrayKind::Int, values.len()),
            ArrayData::Floats(values) => (ArrayKind::Float, values.len()),
            ArrayData::Objects(elements) => (ArrayKind::Object, elements.len()),
        }
    }
}

/// A decoded value and the records it needs, in first-visit order.
#[derive(Debug, Clone, PartialEq)]
struct Graph {
    records: Vec<Record>,
    root: Slot,
}

impl Graph {
    fn nil() -> Self {
        Self {
            records: Vec::new(),
            root: Slot::Word(NIL),
        }
    }
}

/// Rest of a record the decoder has started.
enum Fill {
    Fields {
        record: usize,
        layout: Vec<(usize, ParamType)>,
        next: usize,
    },
    Elements { record: usize, left: usize },
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
    records: Vec<Record>,
    /// Reference id to record index, for the current walk
    scope: HashMap<i32, usize>,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8], pos: usize) -> Self {
        Self {
            bytes,
            pos,
            records: Vec::new(),
            scope: HashMap::new(),
        }
    }

    fn take(&mut self, count: usize) -> Option<&'a [u8]> {
        let end = self.pos.checked_add(count)?;
        let bytes = self.bytes;
        let slice = bytes.get(self.pos..end)?;
        self.pos = end;
        Some(slice)
    }

    fn remaining(&self) -> usize {
        self.bytes.len().saturating_sub(self.pos)
    }

    fn byte(&mut self) -> Option<u8> {
        self.take(1).map(|bytes| bytes[0])
    }

    fn int(&mut self) -> Option<Word> {
        let bytes: [u8; 4] = self.take(4)?.try_into().ok()?;
        Some(i32::from_le_bytes(bytes) as Word)
    }

    fn float(&mut self) -> Option<f64> {
        let bytes: [u8; 8] = self.take(8)?.try_into().ok()?;
        Some(f64::from_le_bytes(bytes))
    }

    fn text(&mut self) -> Option<String> {
        let len = usize::try_from(self.int()?).ok()?;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec()).ok()
    }

    fn char(&mut self) -> Option<Word> {
        Some(self.text()?.chars().next().map_or(0, |c| c as Word))
    }

    /// Element count that fits in what is left, at `min_bytes` per element.
    fn count(&mut self, min_bytes: usize) -> Option<usize> {
        let size = usize::try_from(self.int()?).ok()?;
        let _dims = self.int()?;
        let _extent = self.int()?;
        (size.checked_mul(min_bytes)? <= self.remaining()).then_some(size)
    }

    /// Adds the record introduced by first-visit id `id`.
    ///
    /// A zero, positive or reused id is malformed.
    fn start(&mut self, id: i32, record: Record) -> Option<usize> {
        let key = id.checked_neg().filter(|key| *key > 0)?;
        let index = self.records.len();
        if self.scope.insert(key, index).is_some() {
            return None;
        }
        self.records.push(record);
        Some(index)
    }

    /// Resolves repeat id `id`; an id this walk has not introduced, or one
    /// naming the wrong kind of block, is malformed.
    fn repeat(&self, id: i32, object: bool) -> Option<Slot> {
        let index = *self.scope.get(&id)?;
        match self.records.get(index)? {
            Record::Object { .. } if object => Some(Slot::Record(index)),
            Record::Array(_) if !object => Some(Slot::Record(index)),
            _ => None,
        }
    }

    fn top_array(&mut self, program: &Program, kind: ParamType) -> Option<Graph> {
        if self.byte()? == ABSENT {
            return Some(Graph::nil());
        }
        let data = if kind == ParamType::ObjectArray {
            let size = self.count(1)?;
            let mut elements = Vec::with_capacity(size);
            for _ in 0..size {
                self.scope.clear();
                elements.push(self.object_value(program)?);
            }
            ArrayData::Objects(elements)
        } else {
            self.array_payload(kind)?
        };
        let root = self.records.len();
        self.records.push(Record::Array(data));
        Some(Graph {
            records: std::mem::take(&mut self.records),
            root: Slot::Record(root),
        })
    }

    fn object_graph(&mut self, program: &Program) -> Option<Graph> {
        let root = self.object_value(program)?;
        Some(Graph {
            records: std::mem::take(&mut self.records),
            root,
        })
    }

    fn array_payload(&mut self, kind: ParamType) -> Option<ArrayData> {
        Some(match kind {
            ParamType::ByteArray => {
                let size = self.count(1)?;
                ArrayData::Bytes(self.take(size)?.to_vec())
            }
            ParamType::CharArray => {
                let size = self.count(1)?;
                ArrayData::Chars(String::from_utf8(self.take(size)?.to_vec()).ok()?)
            }
            ParamType::IntArray => {
                let size = self.count(4)?;
                ArrayData::Ints((0..size).map(|_| self.int()).collect::<Option<_>>()?)
            }
            ParamType::FloatArray => {
                let size = self.count(8)?;
                ArrayData::Floats((0..size).map(|_| self.float()).collect::<Option<_>>()?)
            }
            _ => return None,
        })
    }

    /// Reads one object value and every record it introduces.
    fn object_value(&mut self, program: &Program) -> Option<Slot> {
        let mut pending = Vec::new();
        let root = self.object_head(program, &mut pending)?;
        while let Some(fill) = pending.last_mut() {
            match fill {
                Fill::Fields { record, layout, next } => {
                    let record = *record;
                    let Some(&(offset, decl)) = layout.get(*next) else {
                        pending.pop();
                        continue;
                    };
                    *next += 1;
                    match decl {
                        ParamType::Char => {
                            let value = self.char()?;
                            self.set_field(record, offset, Slot::Word(value));
                        }
                        ParamType::Int => {
                            let value = self.int()?;
                            self.set_field(record, offset, Slot::Word(value));
                        }
                        ParamType::Float => {
                            let value = self.float()?;
                            for (w, word) in float_to_words(value).iter().enumerate() {
                                self.set_field(record, offset + w, Slot::Word(*word));
                            }
                        }
                        ParamType::Function => {
                            let id = self.int()?;
                            let instance = self.int()?;
                            self.set_field(record, offset, Slot::Word(id));
                            self.set_field(record, offset + 1, Slot::Word(instance));
                        }
                        ParamType::Object => {
                            let child = self.object_head(program, &mut pending)?;
                            self.set_field(record, offset, child);
                        }
                        array => {
                            let child = self.field_array(array, &mut pending)?;
                            self.set_field(record, offset, child);
                        }
                    }
                }
                Fill::Elements { record, left } => {
                    if *left == 0 {
                        pending.pop();
                        continue;
                    }
                    *left -= 1;
                    let record = *record;
                    let element = self.object_head(program, &mut pending)?;
                    if let Some(Record::Array(ArrayData::Objects(elements))) =
                        self.records.get_mut(record)
                    {
                        elements.push(element);
                    }
                }
            }
        }
        Some(root)
    }

    fn set_field(&mut self, record: usize, offset: usize, slot: Slot) {
        if let Some(Record::Object { words, .. }) = self.records.get_mut(record) {
            words.push((offset, slot));
        }
    }

    /// Presence, class and reference id of an object; a first visit starts
    /// its record and queues its fields.
    fn object_head(&mut self, program: &Program, pending: &mut Vec<Fill>) -> Option<Slot> {
        if self.byte()? == ABSENT {
            return Some(Slot::Word(NIL));
        }
        let class_id = usize::try_from(self.int()?).ok()?;
        let id = self.int()? as i32;
        if id > 0 {
            return self.repeat(id, true);
        }
        let class = program.class(class_id)?;
        let layout = declaration_layout(class.instance_declarations());
        let record = self.start(
            id,
            Record::Object {
                class_id,
                words: Vec::with_capacity(layout.len()),
            },
        )?;
        pending.push(Fill::Fields {
            record,
            layout,
            next: 0,
        });
        Some(Slot::Record(record))
    }

    /// An array in a field declared as `kind`; a first visit of an object
    /// array queues its elements.
    fn field_array(&mut self, kind: ParamType, pending: &mut Vec<Fill>) -> Option<Slot> {
        if self.byte()? == ABSENT {
            return Some(Slot::Word(NIL));
        }
        let id = self.int()? as i32;
        if id > 0 {
            return self.repeat(id, false);
        }
        if kind == ParamType::ObjectArray {
            let size = self.count(1)?;
            let elements = ArrayData::Objects(Vec::with_capacity(size));
            let record = self.start(id, Record::Array(elements))?;
            pending.push(Fill::Elements { record, left: size });
            Some(Slot::Record(record))
        } else {
            let data = self.array_payload(kind)?;
            self.start(id, Record::Array(data)).map(Slot::Record)
        }
    }
}

/// Allocates a decoded graph and pushes its root; `None` pushes Nil.
fn materialize_root(
    rt: &Runtime,
    state: &mut Guard<'_>,
    graph: Option<Graph>,
) -> Result<(), Fault> {
    let Some(graph) = graph else {
        state.push_int(NIL);
        return Ok(());
    };
    let base = state.stack.len();
    let root = materialize(rt.memory(), state, &graph);
    state.stack.truncate(base);
    state.push_int(root?);
    Ok(())
}

/// Allocates every record, pinning each new block on the operand stack, then
/// writes fields and elements.
fn materialize(
    memory: &MemoryManager,
    state: &mut Guard<'_>,
    graph: &Graph,
) -> Result<Word, Fault> {
    let base = state.stack.len();
    for record in &graph.records {
        let handle = match record {
            Record::Object { class_id, .. } => memory.allocate_object(*class_id, &**state)?,
            Record::Array(data) => {
                let (kind, len) = data.shape();
                memory.allocate_array(kind, &[len], &**state)?
            }
        };
        state.push_int(handle);
    }

    let handles = state.stack[base..].to_vec();
    let resolve = |slot: Slot| match slot {
        Slot::Word(word) => Ok(word),
        Slot::Record(index) => handles.get(index).copied().ok_or(Fault::NilDereference),
    };
    for (record, handle) in graph.records.iter().zip(&handles) {
        let block = memory.get(*handle)?;
        match record {
            Record::Object { words, .. } => {
                for (offset, slot) in words {
                    block.words().set(*offset, resolve(*slot)?);
                }
            }
            Record::Array(ArrayData::Objects(elements)) => {
                for (i, slot) in elements.iter().enumerate() {
                    strings::set_element(&block, i, resolve(*slot)?);
                }
            }
            Record::Array(data) => fill_scalars(&block, data),
        }
    }
    resolve(graph.root)
}

fn fill_scalars(block: &HeapBlock, data: &ArrayData) {
    match data {
        ArrayData::Bytes(bytes) => {
            strings::write_bytes(block, 0, bytes);
        }
        ArrayData::Chars(text) => {
            strings::write_chars(block, text);
        }
        ArrayData::Ints(values) => {
            for (i, value) in values.iter().enumerate() {
                strings::set_element(block, i, *value);
            }
        }
        ArrayData::Floats(values) => {
            let start = block.array_data_offset();
            for (i, value) in values.iter().enumerate() {
                for (w, word) in float_to_words(*value).iter().enumerate() {
                    block.words().set(start + i * FLOAT_WORDS + w, *word);
                }
            }
        }
        ArrayData::Objects(..) => {}
    }
}
