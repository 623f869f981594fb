//! TCP socket traps
//!
//! Blocking calls (connect, accept, reads, writes, name resolution) run with
//! the thread state unlocked so a collection can proceed meanwhile. Their
//! heap arguments stay on the operand stack until the call returns.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream, ToSocketAddrs};
use std::sync::Arc;

use parking_lot::MutexGuard;

use bytecode_system::TrapId;
use core_types::{Fault, Word, NIL};
use memory_manager::BlockKind;

use super::{discard, field, peek, pop_string, push_bool, push_string, set_field, window, Guard};
use crate::runtime::Runtime;
use crate::strings;

/// Class of sockets returned by `ACCEPT`.
const TCP_SOCKET_CLASS: &str = "System.IO.Net.TCPSocket";

/// A host socket.
#[derive(Debug)]
pub enum Socket {
    /// Bound server socket
    Listener(TcpListener),
    /// Connected stream
    Stream(TcpStream),
}

fn stream_of(rt: &Runtime, instance: Word) -> Result<Option<TcpStream>, Fault> {
    if instance == NIL {
        return Ok(None);
    }
    let id = field(rt, instance, 0)?;
    let Some(socket) = rt.host().sockets().get(id) else {
        return Ok(None);
    };
    let socket = socket.lock();
    match &*socket {
        Socket::Stream(stream) => Ok(stream.try_clone().ok()),
        Socket::Listener(_) => Ok(None),
    }
}

fn listener_of(rt: &Runtime, instance: Word) -> Result<Option<TcpListener>, Fault> {
    if instance == NIL {
        return Ok(None);
    }
    let id = field(rt, instance, 0)?;
    let Some(socket) = rt.host().sockets().get(id) else {
        return Ok(None);
    };
    let socket = socket.lock();
    match &*socket {
        Socket::Listener(listener) => Ok(listener.try_clone().ok()),
        Socket::Stream(_) => Ok(None),
    }
}

fn read_exact_or_less(stream: &mut TcpStream, count: usize) -> Option<Vec<u8>> {
    let mut buffer = vec![0u8; count];
    let mut filled = 0;
    while filled < count {
        match stream.read(&mut buffer[filled..]) {
            Ok(0) => break,
            Ok(read) => filled += read,
            Err(_) if filled == 0 => return None,
            Err(_) => break,
        }
    }
    buffer.truncate(filled);
    Some(buffer)
}

fn read_line(stream: &mut TcpStream) -> Option<String> {
    let mut bytes = Vec::new();
    let mut byte = [0u8; 1];
    loop {
        match stream.read(&mut byte) {
            Ok(1) if byte[0] == b'\n' => break,
            Ok(1) => bytes.push(byte[0]),
            _ if bytes.is_empty() => return None,
            _ => break,
        }
    }
    if bytes.last() == Some(&b'\r') {
        bytes.pop();
    }
    Some(String::from_utf8_lossy(&bytes).into_owned())
}

/// Name of this host: `HOSTNAME`, then `/etc/hostname`, then `localhost`.
pub(crate) fn host_name() -> String {
    std::env::var("HOSTNAME")
        .ok()
        .filter(|name| !name.is_empty())
        .or_else(|| {
            std::fs::read_to_string("/etc/hostname")
                .ok()
                .map(|name| name.trim().to_string())
                .filter(|name| !name.is_empty())
        })
        .unwrap_or_else(|| "localhost".to_string())
}

pub(super) fn trap(rt: &Arc<Runtime>, state: &mut Guard<'_>, trap: TrapId) -> Result<(), Fault> {
    use TrapId::*;
    let memory = rt.memory();
    let sockets = rt.host().sockets();

    match trap {
        SockTcpConnect => {
            let port = peek(state, 0)?;
            let address = strings::string_of(memory, peek(state, 1)?)?;
            let instance = peek(state, 2)?;
            let stream = match address {
                Some(address) if (0..=65_535).contains(&port) => MutexGuard::unlocked(state, || {
                    TcpStream::connect((address.as_str(), port as u16)).ok()
                }),
                _ => None,
            };
            discard(state, 3)?;
            let id = stream.map_or(0, |stream| sockets.insert(Socket::Stream(stream)));
            set_field(rt, instance, 0, id)?;
        }
        SockTcpBind => {
            let port = state.pop_int()?;
            let instance = state.pop_int()?;
            let listener = (0..=65_535)
                .contains(&port)
                .then(|| TcpListener::bind(("0.0.0.0", port as u16)).ok())
                .flatten();
            let id = listener.map_or(0, |listener| sockets.insert(Socket::Listener(listener)));
            set_field(rt, instance, 0, id)?;
        }
        SockTcpListen => {
            let _backlog = state.pop_int()?;
            let instance = state.pop_int()?;
            push_bool(state, listener_of(rt, instance)?.is_some());
        }
        SockTcpAccept => {
            let server = peek(state, 0)?;
            let accepted = match listener_of(rt, server)? {
                Some(listener) => MutexGuard::unlocked(state, || listener.accept().ok()),
                None => None,
            };
            let result = match accepted {
                Some((stream, peer)) => {
                    let id = sockets.insert(Socket::Stream(stream));
                    accepted_socket(rt, state, server, id, &peer.ip().to_string(), peer.port())
                }
                None => Ok(NIL),
            };
            discard(state, 1)?;
            state.push_int(result?);
        }
        SockTcpIsConnected => {
            let instance = state.pop_int()?;
            let connected = stream_of(rt, instance)?.map_or(false, |stream| stream.peer_addr().is_ok());
            push_bool(state, connected);
        }
        SockTcpClose => {
            let instance = state.pop_int()?;
            if instance != NIL {
                sockets.remove(field(rt, instance, 0)?);
                set_field(rt, instance, 0, 0)?;
            }
        }
        SockTcpInByte => {
            let instance = peek(state, 0)?;
            let byte = match stream_of(rt, instance)? {
                Some(mut stream) => MutexGuard::unlocked(state, || {
                    read_exact_or_less(&mut stream, 1).and_then(|bytes| bytes.first().copied())
                }),
                None => None,
            };
            discard(state, 1)?;
            state.push_int(byte.map_or(-1, Word::from));
        }
        SockTcpOutByte => {
            let value = state.pop_int()?;
            let instance = peek(state, 0)?;
            let written = match stream_of(rt, instance)? {
                Some(mut stream) => {
                    MutexGuard::unlocked(state, || stream.write_all(&[value as u8]).is_ok())
                }
                None => false,
            };
            discard(state, 1)?;
            push_bool(state, written);
        }
        SockTcpInByteAry | SockTcpInCharAry | SockTcpOutByteAry | SockTcpOutCharAry => {
            let result = transfer(rt, state, trap);
            discard(state, 4)?;
            state.push_int(result?);
        }
        SockTcpInString => {
            let array = peek(state, 0)?;
            let instance = peek(state, 1)?;
            let line = match stream_of(rt, instance)? {
                Some(mut stream) => MutexGuard::unlocked(state, || read_line(&mut stream)),
                None => None,
            };
            discard(state, 2)?;
            if array != NIL {
                let block = strings::array_block(memory, array)?;
                strings::write_chars(&block, &line.unwrap_or_default());
            }
        }
        SockTcpOutString => {
            let text = strings::string_of(memory, peek(state, 0)?)?;
            let instance = peek(state, 1)?;
            if let (Some(mut stream), Some(text)) = (stream_of(rt, instance)?, text) {
                MutexGuard::unlocked(state, || {
                    let _ = stream.write_all(text.as_bytes());
                });
            }
            discard(state, 2)?;
        }
        SockTcpHostName => push_string(rt, state, &host_name())?,
        SockTcpResolveName => {
            let name = pop_string(rt, state)?;
            let addresses = match name {
                Some(name) => MutexGuard::unlocked(state, || {
                    (name.as_str(), 0).to_socket_addrs().ok().map(|found| {
                        let mut ips: Vec<String> = found.map(|addr| addr.ip().to_string()).collect();
                        ips.dedup();
                        ips
                    })
                }),
                None => None,
            };
            match addresses {
                Some(ips) => {
                    let array = strings::new_string_array(memory, state, &ips)?;
                    state.push_int(array);
                }
                None => state.push_int(NIL),
            }
        }
        _ => state.push_int(0),
    }
    Ok(())
}

/// Builds the VM object for an accepted connection: field 0 is the socket
/// id, field 1 the peer address string, field 2 the peer port.
fn accepted_socket(
    rt: &Runtime,
    state: &mut Guard<'_>,
    server: Word,
    id: Word,
    address: &str,
    port: u16,
) -> Result<Word, Fault> {
    let memory = rt.memory();
    let class_id = match rt.program().class_by_name(TCP_SOCKET_CLASS) {
        Some(cls) => cls.id(),
        None => match memory.get(server)?.kind() {
            BlockKind::Object { class_id } => class_id,
            _ => return Err(Fault::NilDereference),
        },
    };
    let object = memory.allocate_object(class_id, &**state)?;
    state.push_int(object);
    let address = strings::new_string(memory, state, address);
    state.pop_int()?;
    let address = address?;

    let words = memory.get(object)?;
    words.words().store(0, id)?;
    words.words().set(1, address);
    words.words().set(2, port as Word);
    Ok(object)
}

/// Array reads and writes; the four arguments stay on the stack.
///
/// # Returns
///
/// Elements transferred, or -1.
fn transfer(rt: &Runtime, state: &mut Guard<'_>, trap: TrapId) -> Result<Word, Fault> {
    let array = peek(state, 0)?;
    let count = peek(state, 1)?;
    let offset = peek(state, 2)?;
    let instance = peek(state, 3)?;
    let Some(mut stream) = stream_of(rt, instance)? else {
        return Ok(-1);
    };
    if array == NIL {
        return Ok(-1);
    }
    let memory = rt.memory();
    let len = strings::array_block(memory, array)?.array_len();
    let Some(range) = window(offset, count, len) else {
        return Ok(-1);
    };

    match trap {
        TrapId::SockTcpInByteAry | TrapId::SockTcpInCharAry => {
            let wanted = range.len();
            let Some(bytes) = MutexGuard::unlocked(state, || read_exact_or_less(&mut stream, wanted))
            else {
                return Ok(-1);
            };
            let block = strings::array_block(memory, array)?;
            if trap == TrapId::SockTcpInByteAry {
                return Ok(strings::write_bytes(&block, range.start, &bytes) as Word);
            }
            let text = String::from_utf8_lossy(&bytes);
            let mut written = 0;
            for (i, c) in text.chars().take(wanted).enumerate() {
                strings::set_element(&block, range.start + i, c as Word);
                written += 1;
            }
            Ok(written)
        }
        _ => {
            let block = strings::array_block(memory, array)?;
            let values: Vec<Word> = range.filter_map(|i| strings::element(&block, i)).collect();
            drop(block);
            let bytes: Vec<u8> = if trap == TrapId::SockTcpOutByteAry {
                values.iter().map(|value| *value as u8).collect()
            } else {
                values
                    .iter()
                    .map(|value| char::from_u32(*value as u32).unwrap_or(char::REPLACEMENT_CHARACTER))
                    .collect::<String>()
                    .into_bytes()
            };
            let sent = MutexGuard::unlocked(state, || stream.write_all(&bytes).is_ok());
            Ok(if sent { values.len() as Word } else { -1 })
        }
    }
}
