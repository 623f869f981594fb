//! Standard streams and number formatting

use std::io::{self, BufRead, Read, Write};
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};

use bytecode_system::TrapId;
use core_types::{Fault, Word, NIL};

use super::{discard, peek, push_bool, window, Guard};
use crate::config::StdioMode;
use crate::runtime::Runtime;
use crate::strings;

/// Significant digits of general float output.
pub const DEFAULT_FLOAT_DIGITS: usize = 9;

/// Base integers are printed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IntStyle {
    /// Base 10
    #[default]
    Decimal,
    /// Base 16, lowercase
    Hex,
    /// Base 8
    Octal,
}

/// Notation floats are printed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FloatStyle {
    /// Shortest of fixed and scientific, trailing zeros trimmed
    #[default]
    General,
    /// Fixed number of decimals
    Fixed,
    /// Mantissa and exponent
    Scientific,
}

/// Formatting state set by `STD_INT_FMT`, `STD_FLOAT_FMT`, `STD_FLOAT_PER`,
/// `STD_WIDTH` and `STD_FILL`.
///
/// Width applies to the next value written and then resets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputFormat {
    /// Integer base
    pub int: IntStyle,
    /// Float notation
    pub float: FloatStyle,
    /// Digits: significant for general, decimals otherwise
    pub precision: Option<usize>,
    /// Minimum field width of the next value
    pub width: usize,
    /// Padding character
    pub fill: char,
}

impl Default for OutputFormat {
    fn default() -> Self {
        Self {
            int: IntStyle::Decimal,
            float: FloatStyle::General,
            precision: None,
            width: 0,
            fill: ' ',
        }
    }
}

impl OutputFormat {
    /// Formats an integer and consumes the pending width.
    pub fn int(&mut self, value: Word) -> String {
        let text = match self.int {
            IntStyle::Decimal => value.to_string(),
            IntStyle::Hex => format!("{:x}", value),
            IntStyle::Octal => format!("{:o}", value),
        };
        self.pad(text)
    }

    /// Formats a float and consumes the pending width.
    pub fn float(&mut self, value: f64) -> String {
        let text = format_float(value, self.float, self.precision);
        self.pad(text)
    }

    /// Pads `text` to the pending width and consumes it.
    pub fn pad(&mut self, text: String) -> String {
        let width = std::mem::take(&mut self.width);
        let len = text.chars().count();
        if len >= width {
            return text;
        }
        let mut padded: String = std::iter::repeat(self.fill).take(width - len).collect();
        padded.push_str(&text);
        padded
    }
}

/// Formats `value` the way the standard output traps and `F2S` do.
///
/// # Example
///
/// ```
/// use interpreter::traps::{format_float, FloatStyle};
///
/// assert_eq!(format_float(0.1 + 0.2, FloatStyle::General, None), "0.3");
/// assert_eq!(format_float(2.5, FloatStyle::Fixed, Some(2)), "2.50");
/// assert_eq!(format_float(1500.0, FloatStyle::Scientific, Some(1)), "1.5e+03");
/// ```
pub fn format_float(value: f64, style: FloatStyle, precision: Option<usize>) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value < 0.0 { "-inf" } else { "inf" }.to_string();
    }
    match style {
        FloatStyle::Fixed => format!("{:.*}", precision.unwrap_or(6), value),
        FloatStyle::Scientific => scientific(value, precision.unwrap_or(6)),
        FloatStyle::General => general(value, precision.unwrap_or(DEFAULT_FLOAT_DIGITS).max(1)),
    }
}

fn scientific(value: f64, decimals: usize) -> String {
    let text = format!("{:.*e}", decimals, value);
    let Some((mantissa, exponent)) = text.split_once('e') else {
        return text;
    };
    let exponent: i32 = exponent.parse().unwrap_or(0);
    let sign = if exponent < 0 { '-' } else { '+' };
    format!("{}e{}{:02}", mantissa, sign, exponent.abs())
}

fn general(value: f64, digits: usize) -> String {
    if value == 0.0 {
        return "0".to_string();
    }
    // exponent after rounding to `digits` significant digits
    let rounded = format!("{:.*e}", digits - 1, value);
    let exponent: i32 = rounded
        .split_once('e')
        .and_then(|(_, exp)| exp.parse().ok())
        .unwrap_or(0);

    if exponent < -5 || exponent >= digits as i32 {
        let text = scientific(value, digits - 1);
        match text.split_once('e') {
            Some((mantissa, exp)) => format!("{}e{}", trim_zeros(mantissa), exp),
            None => text,
        }
    } else {
        let decimals = (digits as i32 - 1 - exponent).max(0) as usize;
        trim_zeros(&format!("{:.*}", decimals, value)).to_string()
    }
}

fn trim_zeros(text: &str) -> &str {
    if text.contains('.') {
        text.trim_end_matches('0').trim_end_matches('.')
    } else {
        text
    }
}

/// Stdout and stderr as the VM sees them.
///
/// Output is encoded with the configured [`StdioMode`]. Stdout can be
/// redirected to a buffer for tests and embedding.
#[derive(Debug)]
pub struct Console {
    mode: StdioMode,
    format: Mutex<OutputFormat>,
    capture: Mutex<Option<Arc<Mutex<Vec<u8>>>>>,
}

impl Console {
    /// Creates a console writing to the process streams.
    pub fn new(mode: StdioMode) -> Self {
        Self {
            mode,
            format: Mutex::new(OutputFormat::default()),
            capture: Mutex::new(None),
        }
    }

    /// Sends stdout to a shared buffer from now on.
    pub fn capture(&self) -> Arc<Mutex<Vec<u8>>> {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        *self.capture.lock() = Some(buffer.clone());
        buffer
    }

    /// Current formatting state.
    pub fn format(&self) -> MutexGuard<'_, OutputFormat> {
        self.format.lock()
    }

    /// Writes `text` to stdout.
    pub fn out(&self, text: &str) {
        self.out_bytes(&self.mode.encode(text));
    }

    /// Writes raw bytes to stdout.
    pub fn out_bytes(&self, bytes: &[u8]) {
        if let Some(buffer) = self.capture.lock().as_ref() {
            buffer.lock().extend_from_slice(bytes);
            return;
        }
        let _ = io::stdout().lock().write_all(bytes);
    }

    /// Writes `text` to stderr.
    pub fn err(&self, text: &str) {
        let _ = io::stderr().lock().write_all(&self.mode.encode(text));
    }

    /// Writes raw bytes to stderr.
    pub fn err_bytes(&self, bytes: &[u8]) {
        let _ = io::stderr().lock().write_all(bytes);
    }

    /// Flushes stdout.
    pub fn flush(&self) {
        let _ = io::stdout().lock().flush();
    }

    /// Flushes stderr.
    pub fn flush_err(&self) {
        let _ = io::stderr().lock().flush();
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Stream {
    Out,
    Err,
}

fn write(console: &Console, stream: Stream, text: &str) {
    match stream {
        Stream::Out => console.out(text),
        Stream::Err => console.err(text),
    }
}

fn write_bytes(console: &Console, stream: Stream, bytes: &[u8]) {
    match stream {
        Stream::Out => console.out_bytes(bytes),
        Stream::Err => console.err_bytes(bytes),
    }
}

pub(super) fn trap(rt: &Arc<Runtime>, state: &mut Guard<'_>, trap: TrapId) -> Result<(), Fault> {
    use TrapId::*;
    let console = rt.host().console();
    let stream = match trap {
        StdErrBool | StdErrByte | StdErrChar | StdErrInt | StdErrFloat | StdErrString
        | StdErrCharAry | StdErrByteAry | StdErrFlush => Stream::Err,
        _ => Stream::Out,
    };

    match trap {
        StdOutBool | StdErrBool => {
            let value = state.pop_int()?;
            let text = console.format().pad(if value != 0 { "true" } else { "false" }.into());
            write(console, stream, &text);
        }
        StdOutByte | StdErrByte => {
            let value = state.pop_int()?;
            write_bytes(console, stream, &[value as u8]);
        }
        StdOutChar | StdErrChar => {
            let value = state.pop_int()?;
            let c = char::from_u32(value as u32).unwrap_or(char::REPLACEMENT_CHARACTER);
            let text = console.format().pad(c.to_string());
            write(console, stream, &text);
        }
        StdOutInt | StdErrInt => {
            let value = state.pop_int()?;
            let text = console.format().int(value);
            write(console, stream, &text);
        }
        StdOutFloat | StdErrFloat => {
            let value = state.pop_float()?;
            let text = console.format().float(value);
            write(console, stream, &text);
        }
        StdOutString | StdErrString | StdErrCharAry => {
            let handle = state.pop_int()?;
            let text = strings::string_of(rt.memory(), handle)?;
            let text = console.format().pad(text.unwrap_or_else(|| "Nil".into()));
            write(console, stream, &text);
        }
        StdErrByteAry => {
            let handle = state.pop_int()?;
            if handle == NIL {
                console.err("Nil");
            } else {
                let block = strings::array_block(rt.memory(), handle)?;
                console.err_bytes(&strings::bytes_of(&block));
            }
        }
        StdOutByteAryLen | StdOutCharAryLen => {
            let handle = state.pop_int()?;
            let count = state.pop_int()?;
            let offset = state.pop_int()?;
            let written = write_slice(rt, console, trap, handle, offset, count)?;
            if !written {
                console.out("Nil");
            }
            push_bool(state, written);
        }
        StdFlush => console.flush(),
        StdErrFlush => console.flush_err(),

        StdIntFmt => {
            let mode = state.pop_int()?;
            console.format().int = match mode {
                1 => IntStyle::Hex,
                2 => IntStyle::Octal,
                _ => IntStyle::Decimal,
            };
        }
        StdFloatFmt => {
            let mode = state.pop_int()?;
            console.format().float = match mode {
                1 => FloatStyle::Fixed,
                2 => FloatStyle::Scientific,
                _ => FloatStyle::General,
            };
        }
        StdFloatPer => {
            let digits = state.pop_int()?;
            console.format().precision = (digits >= 0).then_some(digits as usize);
        }
        StdWidth => {
            let width = state.pop_int()?;
            console.format().width = width.max(0) as usize;
        }
        StdFill => {
            let fill = state.pop_int()?;
            console.format().fill = char::from_u32(fill as u32).unwrap_or(' ');
        }

        StdInString => {
            // the target array stays on the stack while this thread blocks
            let handle = peek(state, 0)?;
            let line = MutexGuard::unlocked(state, read_line);
            discard(state, 1)?;
            if handle != NIL {
                let block = strings::array_block(rt.memory(), handle)?;
                strings::write_chars(&block, &line);
            }
        }
        StdInByteAryLen | StdInCharAryLen => {
            let handle = peek(state, 0)?;
            let count = peek(state, 1)?;
            let offset = peek(state, 2)?;
            let block = (handle != NIL)
                .then(|| strings::array_block(rt.memory(), handle))
                .transpose()?;
            let range = block
                .as_ref()
                .and_then(|block| window(offset, count, block.array_len()));
            let read = match &range {
                Some(range) => MutexGuard::unlocked(state, || read_stdin(trap, range.len())),
                None => None,
            };
            discard(state, 3)?;
            match (block, range, read) {
                (Some(block), Some(range), Some(data)) => {
                    for (i, value) in data.iter().enumerate() {
                        strings::set_element(&block, range.start + i, *value);
                    }
                    state.push_int(data.len() as Word);
                }
                _ => state.push_int(-1),
            }
        }
        _ => state.push_int(0),
    }
    Ok(())
}

/// Writes `count` elements of a byte or char array from `offset`.
fn write_slice(
    rt: &Runtime,
    console: &Console,
    trap: TrapId,
    handle: Word,
    offset: Word,
    count: Word,
) -> Result<bool, Fault> {
    if handle == NIL {
        return Ok(false);
    }
    let block = strings::array_block(rt.memory(), handle)?;
    let Some(range) = window(offset, count, block.array_len()) else {
        return Ok(false);
    };
    let values: Vec<Word> = range
        .filter_map(|i| strings::element(&block, i))
        .collect();
    if trap == TrapId::StdOutByteAryLen {
        let bytes: Vec<u8> = values.iter().map(|v| *v as u8).collect();
        console.out_bytes(&bytes);
    } else {
        let text: String = values
            .iter()
            .map(|v| char::from_u32(*v as u32).unwrap_or(char::REPLACEMENT_CHARACTER))
            .collect();
        console.out(&text);
    }
    Ok(true)
}

fn read_line() -> String {
    let mut line = String::new();
    let _ = io::stdin().lock().read_line(&mut line);
    while line.ends_with('\n') || line.ends_with('\r') {
        line.pop();
    }
    line
}

fn read_stdin(trap: TrapId, count: usize) -> Option<Vec<Word>> {
    let mut bytes = vec![0u8; count];
    let read = io::stdin().lock().read(&mut bytes).ok()?;
    bytes.truncate(read);
    let values = if trap == TrapId::StdInByteAryLen {
        bytes.into_iter().map(Word::from).collect()
    } else {
        String::from_utf8_lossy(&bytes).chars().map(|c| c as Word).collect()
    };
    Some(values)
}
