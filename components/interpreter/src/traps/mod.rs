//! Native bridge behind `TRAP` and `TRAP_RTRN`
//!
//! The trap id is popped first; each handler then pops its own arguments.
//! Host failures (missing files, refused connections, malformed input) are
//! not faults: the handler pushes a sentinel (0, -1 or Nil) and execution
//! continues. Ids this runtime does not implement push 0.
//!
//! Files and sockets live in [`ResourceTable`]s. The VM object that owns one
//! keeps its table id in field 0; 0 means closed.

mod compress;
mod fs;
mod net;
mod objects;
mod serial;
mod stdio;
mod system;
mod time;

use std::collections::HashMap;
use std::sync::atomic::{AtomicIsize, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};

use bytecode_system::TrapId;
use core_types::{Fault, Word, NIL};

use crate::config::StdioMode;
use crate::context::ThreadState;
use crate::runtime::Runtime;
use crate::strings;

pub use stdio::{format_float, Console, FloatStyle, IntStyle, OutputFormat};

pub(crate) use fs::OpenFile;
pub(crate) use net::Socket;

/// The running thread's locked state, as traps see it.
pub(crate) type Guard<'a> = MutexGuard<'a, ThreadState>;

/// Host objects addressed by small integer ids.
#[derive(Debug)]
pub struct ResourceTable<T> {
    next: AtomicIsize,
    entries: Mutex<HashMap<Word, Arc<Mutex<T>>>>,
}

impl<T> Default for ResourceTable<T> {
    fn default() -> Self {
        Self {
            next: AtomicIsize::new(1),
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl<T> ResourceTable<T> {
    /// Creates an empty table; ids start at 1.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `value` and returns its id.
    pub fn insert(&self, value: T) -> Word {
        let id = self.next.fetch_add(1, Ordering::Relaxed);
        self.entries.lock().insert(id, Arc::new(Mutex::new(value)));
        id
    }

    /// Resource `id`, if open.
    pub fn get(&self, id: Word) -> Option<Arc<Mutex<T>>> {
        self.entries.lock().get(&id).cloned()
    }

    /// Closes resource `id`.
    pub fn remove(&self, id: Word) -> Option<Arc<Mutex<T>>> {
        self.entries.lock().remove(&id)
    }

    /// Number of open resources.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns true when nothing is open.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Everything the trap bridge keeps outside the heap.
#[derive(Debug)]
pub struct HostResources {
    console: Console,
    files: ResourceTable<OpenFile>,
    sockets: ResourceTable<Socket>,
}

impl HostResources {
    /// Creates the bridge state for the given stdio encoding.
    pub fn new(mode: StdioMode) -> Self {
        Self {
            console: Console::new(mode),
            files: ResourceTable::new(),
            sockets: ResourceTable::new(),
        }
    }

    /// Standard streams.
    pub fn console(&self) -> &Console {
        &self.console
    }

    pub(crate) fn files(&self) -> &ResourceTable<OpenFile> {
        &self.files
    }

    pub(crate) fn sockets(&self) -> &ResourceTable<Socket> {
        &self.sockets
    }
}

/// Runs trap `trap` for the thread holding `state`.
///
/// # Returns
///
/// `Err` only for fatal faults (Nil where the trap requires an object,
/// `EXIT`, failed assertions); host failures are reported on the stack.
pub(crate) fn dispatch(rt: &Arc<Runtime>, state: &mut Guard<'_>, trap: TrapId) -> Result<(), Fault> {
    use TrapId::*;
    match trap {
        LoadClsInstId | LoadClsByInst | LoadClsByName | LoadNewObjInst | LoadInstUid
        | LoadMultiArySize | CpyCharStrAry | CpyCharStrArys | CpyIntStrAry | CpyByteStrAry
        | CpyBoolStrAry | CpyFloatStrAry | BytesToUnicode | UnicodeToBytes | StringHashId => {
            objects::trap(rt, state, trap)
        }

        SysTime | GmtTime | DateTimeSet1 | DateTimeSet2 | DateTimeAddDays | DateTimeAddHours
        | DateTimeAddMins | DateTimeAddSecs | DateToUnixTime | DateFromUnixGmtTime
        | DateFromUnixLocalTime | TimerStart | TimerEnd | TimerElapsed => time::trap(rt, state, trap),

        StdInString | StdOutBool | StdOutByte | StdOutChar | StdOutInt | StdOutFloat | StdIntFmt
        | StdFloatFmt | StdFloatPer | StdWidth | StdFill | StdOutString | StdOutByteAryLen
        | StdOutCharAryLen | StdInByteAryLen | StdInCharAryLen | StdFlush | StdErrBool
        | StdErrByte | StdErrChar | StdErrInt | StdErrFloat | StdErrString | StdErrCharAry
        | StdErrByteAry | StdErrFlush => stdio::trap(rt, state, trap),

        CompressZlibBytes | UncompressZlibBytes | CompressGzipBytes | UncompressGzipBytes
        | CompressBrBytes | UncompressBrBytes | Crc32Bytes => compress::trap(rt, state, trap),

        FileCreateTime | FileModifiedTime | FileAccessedTime | FileLoggerDir | FileAccountOwner
        | FileGroupOwner | FileOpenRead | FileOpenAppend | FileOpenWrite | FileOpenReadWrite
        | FileClose | FileFlush | FileInByte | FileOutByte | FileInByteAry | FileInCharAry
        | FileOutByteAry | FileOutCharAry | FileInString | FileOutString | FileIsOpen
        | FileExists | FileCanWriteOnly | FileCanReadOnly | FileCanReadWrite | FileSize
        | FileFullPath | FileTempName | FileRewind | FileSeek | FileEof | FileDelete | FileRename
        | FileCopy | DirCreate | DirSlash | DirExists | DirList | DirCopy | DirGetCur | DirSetCur
        | DirDelete | SymLinkCreate | SymLinkCopy | SymLinkLoc | SymLinkExists | HardLinkCreate => {
            fs::trap(rt, state, trap)
        }

        SockTcpConnect | SockTcpBind | SockTcpListen | SockTcpAccept | SockTcpIsConnected
        | SockTcpClose | SockTcpInByte | SockTcpInByteAry | SockTcpInCharAry | SockTcpOutByte
        | SockTcpOutByteAry | SockTcpOutCharAry | SockTcpInString | SockTcpOutString
        | SockTcpHostName | SockTcpResolveName => net::trap(rt, state, trap),

        SerlInt | SerlFloat | SerlObjInst | SerlByteAry | SerlIntAry | SerlObjAry | SerlFloatAry
        | SerlChar | SerlCharAry | DeserlInt | DeserlFloat | DeserlObjInst | DeserlByteAry
        | DeserlIntAry | DeserlObjAry | DeserlFloatAry | DeserlChar | DeserlCharAry => {
            serial::trap(rt, state, trap)
        }

        GetPltfrm | GetVersion | GetSysProp | SetSysProp | GetSysEnv | SetSysEnv | SysCmd
        | SysCmdOut | AssertTrue | Exit => system::trap(rt, state, trap),

        // pipes, UDP, TLS and select have no host implementation here
        _ => {
            state.push_int(0);
            Ok(())
        }
    }
}

/// Receiver of the executing frame.
pub(crate) fn frame_self(state: &ThreadState) -> Result<Word, Fault> {
    Ok(state.frame()?.self_ref())
}

/// First parameter slot of the executing frame.
pub(crate) fn frame_param(state: &ThreadState) -> Result<Word, Fault> {
    state.frame()?.load(1)
}

/// Field `index` of object `handle`; Nil is a fault.
pub(crate) fn field(rt: &Runtime, handle: Word, index: usize) -> Result<Word, Fault> {
    if handle == NIL {
        return Err(Fault::NilDereference);
    }
    rt.memory().get(handle)?.words().load(index)
}

/// Writes field `index` of object `handle`; Nil is a fault.
pub(crate) fn set_field(rt: &Runtime, handle: Word, index: usize, value: Word) -> Result<(), Fault> {
    if handle == NIL {
        return Err(Fault::NilDereference);
    }
    rt.memory().get(handle)?.words().store(index, value)
}

/// Pops a string argument.
pub(crate) fn pop_string(rt: &Runtime, state: &mut ThreadState) -> Result<Option<String>, Fault> {
    let handle = state.pop_int()?;
    strings::string_of(rt.memory(), handle)
}

/// Allocates a `System.String` and pushes it.
pub(crate) fn push_string(rt: &Runtime, state: &mut ThreadState, text: &str) -> Result<(), Fault> {
    let handle = strings::new_string(rt.memory(), state, text)?;
    state.push_int(handle);
    Ok(())
}

/// Pushes 1 or 0.
pub(crate) fn push_bool(state: &mut ThreadState, value: bool) {
    state.push_int(value as Word);
}

/// The `depth`-th word from the top without popping it.
pub(crate) fn peek(state: &ThreadState, depth: usize) -> Result<Word, Fault> {
    let len = state.stack.len();
    if depth >= len {
        return Err(Fault::StackUnderflow);
    }
    Ok(state.stack[len - 1 - depth])
}

/// Drops `count` words that were read with [`peek`].
pub(crate) fn discard(state: &mut ThreadState, count: usize) -> Result<(), Fault> {
    let len = state.stack.len();
    let keep = len.checked_sub(count).ok_or(Fault::StackUnderflow)?;
    state.stack.truncate(keep);
    Ok(())
}

/// Checks an `(offset, count)` window against an array of `len` elements.
pub(crate) fn window(offset: Word, count: Word, len: usize) -> Option<std::ops::Range<usize>> {
    if offset < 0 || count < 0 {
        return None;
    }
    let start = offset as usize;
    let end = start.checked_add(count as usize)?;
    (end <= len).then_some(start..end)
}
