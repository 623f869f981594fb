//! File, directory and link traps

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use bytecode_system::TrapId;
use core_types::{Fault, Word, NIL};

use super::{field, pop_string, push_bool, push_string, set_field, window, Guard};
use crate::runtime::Runtime;
use crate::strings;

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// An open file and its end-of-file flag.
#[derive(Debug)]
pub struct OpenFile {
    file: File,
    eof: bool,
}

impl OpenFile {
    fn new(file: File) -> Self {
        Self { file, eof: false }
    }

    fn read_byte(&mut self) -> Option<u8> {
        let mut byte = [0u8; 1];
        match self.file.read(&mut byte) {
            Ok(1) => Some(byte[0]),
            _ => {
                self.eof = true;
                None
            }
        }
    }

    fn read_line(&mut self) -> Option<String> {
        let mut bytes = Vec::new();
        loop {
            match self.read_byte() {
                Some(b'\n') => break,
                Some(byte) => bytes.push(byte),
                None if bytes.is_empty() => return None,
                None => break,
            }
        }
        if bytes.last() == Some(&b'\r') {
            bytes.pop();
        }
        Some(String::from_utf8_lossy(&bytes).into_owned())
    }

    fn read_into(&mut self, count: usize) -> Vec<u8> {
        let mut buffer = vec![0u8; count];
        let mut filled = 0;
        while filled < count {
            match self.file.read(&mut buffer[filled..]) {
                Ok(0) | Err(_) => {
                    self.eof = true;
                    break;
                }
                Ok(read) => filled += read,
            }
        }
        buffer.truncate(filled);
        buffer
    }
}

#[derive(Clone, Copy)]
enum Mode {
    Read,
    Append,
    Write,
    ReadWrite,
}

fn open(path: &str, mode: Mode) -> Option<File> {
    let mut options = OpenOptions::new();
    match mode {
        Mode::Read => options.read(true),
        Mode::Append => options.append(true).create(true),
        Mode::Write => options.write(true).create(true).truncate(true),
        Mode::ReadWrite => options.read(true).write(true),
    };
    options.open(path).ok()
}

/// The open file behind field 0 of `instance`.
fn file_of(rt: &Runtime, instance: Word) -> Result<Option<Arc<parking_lot::Mutex<OpenFile>>>, Fault> {
    if instance == NIL {
        return Ok(None);
    }
    let id = field(rt, instance, 0)?;
    Ok(rt.host().files().get(id))
}

/// Runs `action` on the open file behind `instance`.
fn with_file<R>(
    rt: &Runtime,
    instance: Word,
    action: impl FnOnce(&mut OpenFile) -> R,
) -> Result<Option<R>, Fault> {
    let Some(file) = file_of(rt, instance)? else {
        return Ok(None);
    };
    let mut file = file.lock();
    Ok(Some(action(&mut file)))
}

fn unix_seconds(time: std::io::Result<SystemTime>) -> Word {
    time.ok()
        .and_then(|time| time.duration_since(UNIX_EPOCH).ok())
        .map_or(0, |elapsed| elapsed.as_secs() as Word)
}

fn copy_dir(from: &Path, to: &Path) -> std::io::Result<()> {
    fs::create_dir_all(to)?;
    for entry in fs::read_dir(from)? {
        let entry = entry?;
        let target = to.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir(&entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), target)?;
        }
    }
    Ok(())
}

#[cfg(unix)]
fn owner(path: &str, account: bool) -> Option<String> {
    use std::os::unix::fs::MetadataExt;
    let meta = fs::metadata(path).ok()?;
    Some(if account { meta.uid() } else { meta.gid() }.to_string())
}

#[cfg(not(unix))]
fn owner(_path: &str, _account: bool) -> Option<String> {
    None
}

#[cfg(unix)]
fn symlink(target: &Path, link: &Path) -> bool {
    std::os::unix::fs::symlink(target, link).is_ok()
}

#[cfg(not(unix))]
fn symlink(_target: &Path, _link: &Path) -> bool {
    false
}

pub(super) fn trap(rt: &Arc<Runtime>, state: &mut Guard<'_>, trap: TrapId) -> Result<(), Fault> {
    use TrapId::*;
    let memory = rt.memory();
    let files = rt.host().files();

    match trap {
        FileOpenRead | FileOpenAppend | FileOpenWrite | FileOpenReadWrite => {
            let name = pop_string(rt, state)?;
            let instance = state.pop_int()?;
            let mode = match trap {
                FileOpenRead => Mode::Read,
                FileOpenAppend => Mode::Append,
                FileOpenWrite => Mode::Write,
                _ => Mode::ReadWrite,
            };
            let id = name
                .and_then(|name| open(&name, mode))
                .map_or(0, |file| files.insert(OpenFile::new(file)));
            set_field(rt, instance, 0, id)?;
        }
        FileClose => {
            let instance = state.pop_int()?;
            if instance != NIL {
                files.remove(field(rt, instance, 0)?);
                set_field(rt, instance, 0, 0)?;
            }
        }
        FileFlush => {
            let instance = state.pop_int()?;
            with_file(rt, instance, |file| {
                let _ = file.file.flush();
            })?;
        }
        FileIsOpen => {
            let instance = state.pop_int()?;
            push_bool(state, file_of(rt, instance)?.is_some());
        }
        FileEof => {
            let instance = state.pop_int()?;
            let eof = with_file(rt, instance, |file| file.eof)?.unwrap_or(true);
            push_bool(state, eof);
        }
        FileRewind => {
            let instance = state.pop_int()?;
            with_file(rt, instance, |file| {
                if file.file.rewind().is_ok() {
                    file.eof = false;
                }
            })?;
        }
        FileSeek => {
            let position = state.pop_int()?;
            let instance = state.pop_int()?;
            let moved = with_file(rt, instance, |file| {
                let ok = file.file.seek(SeekFrom::Current(position as i64)).is_ok();
                if ok {
                    file.eof = false;
                }
                ok
            })?;
            push_bool(state, moved == Some(true));
        }
        FileInByte => {
            let instance = state.pop_int()?;
            let byte = with_file(rt, instance, OpenFile::read_byte)?.flatten();
            state.push_int(byte.map_or(-1, Word::from));
        }
        FileOutByte => {
            let value = state.pop_int()?;
            let instance = state.pop_int()?;
            let written = with_file(rt, instance, |file| file.file.write_all(&[value as u8]).is_ok())?;
            push_bool(state, written == Some(true));
        }
        FileInByteAry | FileInCharAry | FileOutByteAry | FileOutCharAry => {
            let array = state.pop_int()?;
            let count = state.pop_int()?;
            let offset = state.pop_int()?;
            let instance = state.pop_int()?;
            let result = transfer(rt, trap, instance, array, offset, count)?;
            state.push_int(result);
        }
        FileInString => {
            let array = state.pop_int()?;
            let instance = state.pop_int()?;
            if let Some(line) = with_file(rt, instance, OpenFile::read_line)? {
                let line = line.unwrap_or_default();
                if array != NIL {
                    strings::write_chars(&*strings::array_block(memory, array)?, &line);
                }
            }
        }
        FileOutString => {
            let text = pop_string(rt, state)?;
            let instance = state.pop_int()?;
            if let Some(text) = text {
                with_file(rt, instance, |file| {
                    let _ = file.file.write_all(text.as_bytes());
                })?;
            }
        }

        FileExists => {
            let name = pop_string(rt, state)?;
            push_bool(state, name.map_or(false, |name| Path::new(&name).is_file()));
        }
        FileCanWriteOnly | FileCanReadOnly | FileCanReadWrite => {
            let name = pop_string(rt, state)?;
            let readonly = name
                .and_then(|name| fs::metadata(name).ok())
                .map(|meta| meta.permissions().readonly());
            let answer = match (trap, readonly) {
                (FileCanReadOnly, Some(readonly)) => readonly,
                (FileCanReadWrite, Some(readonly)) => !readonly,
                _ => false,
            };
            push_bool(state, answer);
        }
        FileSize => {
            let name = pop_string(rt, state)?;
            let size = name
                .and_then(|name| fs::metadata(name).ok())
                .map_or(-1, |meta| meta.len() as Word);
            state.push_int(size);
        }
        FileFullPath => {
            let name = pop_string(rt, state)?;
            match name.and_then(|name| fs::canonicalize(name).ok()) {
                Some(path) => push_string(rt, state, &path.to_string_lossy())?,
                None => state.push_int(NIL),
            }
        }
        FileTempName => {
            let unique = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
            let path = std::env::temp_dir().join(format!("svm_{}_{}", std::process::id(), unique));
            push_string(rt, state, &path.to_string_lossy())?;
        }
        FileDelete => {
            let name = pop_string(rt, state)?;
            push_bool(state, name.map_or(false, |name| fs::remove_file(name).is_ok()));
        }
        FileRename | FileCopy => {
            let to = pop_string(rt, state)?;
            let from = pop_string(rt, state)?;
            let done = match (from, to) {
                (Some(from), Some(to)) if trap == FileRename => fs::rename(from, to).is_ok(),
                (Some(from), Some(to)) => fs::copy(from, to).is_ok(),
                _ => false,
            };
            push_bool(state, done);
        }
        FileCreateTime | FileModifiedTime | FileAccessedTime => {
            let _is_gmt = state.pop_int()?;
            let name = pop_string(rt, state)?;
            let seconds = name.and_then(|name| fs::metadata(name).ok()).map_or(0, |meta| {
                unix_seconds(match trap {
                    FileCreateTime => meta.created(),
                    FileModifiedTime => meta.modified(),
                    _ => meta.accessed(),
                })
            });
            state.push_int(seconds);
        }
        FileAccountOwner | FileGroupOwner => {
            let name = pop_string(rt, state)?;
            match name.and_then(|name| owner(&name, trap == FileAccountOwner)) {
                Some(owner) => push_string(rt, state, &owner)?,
                None => state.push_int(NIL),
            }
        }

        DirCreate => {
            let name = pop_string(rt, state)?;
            push_bool(state, name.map_or(false, |name| fs::create_dir(name).is_ok()));
        }
        DirExists => {
            let name = pop_string(rt, state)?;
            push_bool(state, name.map_or(false, |name| Path::new(&name).is_dir()));
        }
        DirDelete => {
            let name = pop_string(rt, state)?;
            push_bool(state, name.map_or(false, |name| fs::remove_dir_all(name).is_ok()));
        }
        DirSlash => push_string(rt, state, std::path::MAIN_SEPARATOR_STR)?,
        DirGetCur => match std::env::current_dir() {
            Ok(path) => push_string(rt, state, &path.to_string_lossy())?,
            Err(_) => state.push_int(NIL),
        },
        DirSetCur => {
            let name = pop_string(rt, state)?;
            push_bool(state, name.map_or(false, |name| std::env::set_current_dir(name).is_ok()));
        }
        DirList => {
            let name = pop_string(rt, state)?;
            let entries = name.and_then(|name| fs::read_dir(name).ok()).map(|dir| {
                let mut names: Vec<String> = dir
                    .filter_map(Result::ok)
                    .map(|entry| entry.file_name().to_string_lossy().into_owned())
                    .collect();
                names.sort();
                names
            });
            match entries {
                Some(names) => {
                    let array = strings::new_string_array(memory, state, &names)?;
                    state.push_int(array);
                }
                None => state.push_int(NIL),
            }
        }
        DirCopy => {
            let to = pop_string(rt, state)?;
            let from = pop_string(rt, state)?;
            let done = match (from, to) {
                (Some(from), Some(to)) => copy_dir(Path::new(&from), Path::new(&to)).is_ok(),
                _ => false,
            };
            push_bool(state, done);
        }

        SymLinkCreate | HardLinkCreate => {
            let link = pop_string(rt, state)?;
            let target = pop_string(rt, state)?;
            let done = match (target, link) {
                (Some(target), Some(link)) if trap == HardLinkCreate => {
                    fs::hard_link(target, link).is_ok()
                }
                (Some(target), Some(link)) => symlink(Path::new(&target), Path::new(&link)),
                _ => false,
            };
            push_bool(state, done);
        }
        SymLinkCopy => {
            let to = pop_string(rt, state)?;
            let from = pop_string(rt, state)?;
            let done = match (from.and_then(|from| fs::read_link(from).ok()), to) {
                (Some(target), Some(to)) => symlink(&target, &PathBuf::from(to)),
                _ => false,
            };
            push_bool(state, done);
        }
        SymLinkLoc => {
            let name = pop_string(rt, state)?;
            match name.and_then(|name| fs::read_link(name).ok()) {
                Some(target) => push_string(rt, state, &target.to_string_lossy())?,
                None => state.push_int(NIL),
            }
        }
        SymLinkExists => {
            let name = pop_string(rt, state)?;
            let exists = name
                .and_then(|name| fs::symlink_metadata(name).ok())
                .map_or(false, |meta| meta.file_type().is_symlink());
            push_bool(state, exists);
        }

        // FILE_LOGGER_DIR has no host counterpart
        _ => state.push_int(0),
    }
    Ok(())
}

/// Moves `count` elements between an open file and an array.
///
/// # Returns
///
/// Elements transferred, or -1 when the file is closed or the window does
/// not fit the array.
fn transfer(
    rt: &Runtime,
    trap: TrapId,
    instance: Word,
    array: Word,
    offset: Word,
    count: Word,
) -> Result<Word, Fault> {
    let Some(file) = file_of(rt, instance)? else {
        return Ok(-1);
    };
    if array == NIL {
        return Ok(-1);
    }
    let block = strings::array_block(rt.memory(), array)?;
    let Some(range) = window(offset, count, block.array_len()) else {
        return Ok(-1);
    };
    let mut file = file.lock();

    match trap {
        TrapId::FileInByteAry => {
            let bytes = file.read_into(range.len());
            Ok(strings::write_bytes(&block, range.start, &bytes) as Word)
        }
        TrapId::FileInCharAry => {
            let bytes = file.read_into(range.len());
            let text = String::from_utf8_lossy(&bytes);
            let mut written = 0;
            for (i, c) in text.chars().take(range.len()).enumerate() {
                strings::set_element(&block, range.start + i, c as Word);
                written += 1;
            }
            Ok(written)
        }
        TrapId::FileOutByteAry => {
            let bytes: Vec<u8> = range
                .filter_map(|i| strings::element(&block, i))
                .map(|value| value as u8)
                .collect();
            Ok(file.file.write_all(&bytes).map_or(-1, |_| bytes.len() as Word))
        }
        _ => {
            let text: String = range
                .filter_map(|i| strings::element(&block, i))
                .map(|value| char::from_u32(value as u32).unwrap_or(char::REPLACEMENT_CHARACTER))
                .collect();
            Ok(file
                .file
                .write_all(text.as_bytes())
                .map_or(-1, |_| count as Word))
        }
    }
}
