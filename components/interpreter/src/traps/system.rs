//! Platform, property, environment and process traps

use std::process::Command;
use std::sync::Arc;

use parking_lot::MutexGuard;

use bytecode_system::TrapId;
use core_types::{Fault, NIL};

use super::{discard, peek, pop_string, push_string, Guard};
use crate::runtime::{Runtime, VERSION};
use crate::strings;

/// Operating system and architecture, e.g. `linux x86_64`.
pub(crate) fn platform() -> String {
    format!("{} {}", std::env::consts::OS, std::env::consts::ARCH)
}

fn shell(command: &str) -> Command {
    if cfg!(windows) {
        let mut shell = Command::new("cmd");
        shell.args(["/C", command]);
        shell
    } else {
        let mut shell = Command::new("sh");
        shell.args(["-c", command]);
        shell
    }
}

pub(super) fn trap(rt: &Arc<Runtime>, state: &mut Guard<'_>, trap: TrapId) -> Result<(), Fault> {
    use TrapId::*;
    match trap {
        GetPltfrm => push_string(rt, state, &platform())?,
        GetVersion => push_string(rt, state, VERSION)?,
        GetSysProp => {
            let key = pop_string(rt, state)?;
            let value = key.and_then(|key| rt.property(&key)).unwrap_or_default();
            push_string(rt, state, &value)?;
        }
        SetSysProp => {
            let value = pop_string(rt, state)?;
            let key = pop_string(rt, state)?;
            if let Some(key) = key {
                rt.set_property(key, value.unwrap_or_default());
            }
        }
        GetSysEnv => {
            let name = pop_string(rt, state)?;
            let value = name
                .and_then(|name| std::env::var(name).ok())
                .unwrap_or_default();
            push_string(rt, state, &value)?;
        }
        SetSysEnv => {
            let value = pop_string(rt, state)?;
            let name = pop_string(rt, state)?;
            if let (Some(name), Some(value)) = (name, value) {
                if !name.is_empty() && !name.contains('=') && !name.contains('\0') {
                    std::env::set_var(name, value);
                }
            }
        }
        SysCmd => {
            let command = strings::string_of(rt.memory(), peek(state, 0)?)?;
            let status = match command {
                Some(command) => MutexGuard::unlocked(state, || {
                    shell(&command)
                        .status()
                        .ok()
                        .and_then(|status| status.code())
                }),
                None => None,
            };
            discard(state, 1)?;
            state.push_int(status.map_or(-1, |code| code as core_types::Word));
        }
        SysCmdOut => {
            let command = strings::string_of(rt.memory(), peek(state, 0)?)?;
            let output = match command {
                Some(command) => MutexGuard::unlocked(state, || shell(&command).output().ok()),
                None => None,
            };
            discard(state, 1)?;
            match output {
                Some(output) => {
                    let text = String::from_utf8_lossy(&output.stdout);
                    let lines: Vec<String> = text.lines().map(str::to_string).collect();
                    let array = strings::new_string_array(rt.memory(), state, &lines)?;
                    state.push_int(array);
                }
                None => state.push_int(NIL),
            }
        }
        AssertTrue => {
            if state.pop_int()? == 0 {
                return Err(Fault::AssertionFailed);
            }
        }
        Exit => {
            let code = state.pop_int()?;
            return Err(Fault::Exit(code as i32));
        }
        _ => state.push_int(0),
    }
    Ok(())
}
