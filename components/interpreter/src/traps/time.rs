//! Date and timer traps
//!
//! A date instance keeps its fields in the first nine slots: day, month,
//! year, hours, minutes, seconds, daylight-saving flag, day of week, and
//! whether the value is GMT.

use std::sync::Arc;

use chrono::{DateTime, Datelike, Local, NaiveDate, NaiveDateTime, TimeZone, Timelike, Utc};

use bytecode_system::TrapId;
use core_types::{Fault, Word, NIL};

use super::{field, frame_self, set_field, Guard};
use crate::runtime::Runtime;

const DAY: usize = 0;
const MONTH: usize = 1;
const YEAR: usize = 2;
const HOURS: usize = 3;
const MINS: usize = 4;
const SECS: usize = 5;
const IS_DST: usize = 6;
const WEEKDAY: usize = 7;
const IS_GMT: usize = 8;

pub(super) fn trap(rt: &Arc<Runtime>, state: &mut Guard<'_>, trap: TrapId) -> Result<(), Fault> {
    use TrapId::*;
    match trap {
        SysTime | GmtTime => {
            let instance = frame_self(state)?;
            if instance != NIL {
                if trap == GmtTime {
                    fill(rt, instance, &Utc::now(), true)?;
                } else {
                    fill(rt, instance, &Local::now(), false)?;
                }
            }
        }
        DateTimeSet1 => {
            let is_gmt = state.pop_int()? != 0;
            let year = state.pop_int()?;
            let month = state.pop_int()?;
            let day = state.pop_int()?;
            let instance = state.pop_int()?;
            set_date(rt, instance, [year, month, day, 0, 0, 0], is_gmt)?;
        }
        DateTimeSet2 => {
            let is_gmt = state.pop_int()? != 0;
            let secs = state.pop_int()?;
            let mins = state.pop_int()?;
            let hours = state.pop_int()?;
            let year = state.pop_int()?;
            let month = state.pop_int()?;
            let day = state.pop_int()?;
            let instance = state.pop_int()?;
            set_date(rt, instance, [year, month, day, hours, mins, secs], is_gmt)?;
        }
        DateTimeAddDays | DateTimeAddHours | DateTimeAddMins | DateTimeAddSecs => {
            let value = state.pop_int()? as i64;
            let instance = state.pop_int()?;
            let unit = match trap {
                DateTimeAddDays => 86_400,
                DateTimeAddHours => 3_600,
                DateTimeAddMins => 60,
                _ => 1,
            };
            if instance != NIL {
                if let Some((seconds, is_gmt)) = unix_time(rt, instance)? {
                    from_unix(rt, instance, seconds.saturating_add(value.saturating_mul(unit)), is_gmt)?;
                }
            }
        }
        DateToUnixTime => {
            let instance = state.pop_int()?;
            let seconds = if instance == NIL {
                None
            } else {
                unix_time(rt, instance)?.map(|(seconds, _)| seconds)
            };
            state.push_int(seconds.unwrap_or(0) as Word);
        }
        DateFromUnixGmtTime | DateFromUnixLocalTime => {
            let seconds = state.pop_int()? as i64;
            let instance = state.pop_int()?;
            if instance != NIL {
                from_unix(rt, instance, seconds, trap == DateFromUnixGmtTime)?;
            }
        }

        TimerStart => {
            let instance = state.pop_int()?;
            set_field(rt, instance, 0, rt.uptime_micros())?;
        }
        TimerEnd => {
            let instance = state.pop_int()?;
            let started = field(rt, instance, 0)?;
            set_field(rt, instance, 0, rt.uptime_micros() - started)?;
        }
        TimerElapsed => {
            let instance = state.pop_int()?;
            let micros = field(rt, instance, 0)?;
            state.push_float(micros as f64 / 1_000_000.0);
        }
        _ => state.push_int(0),
    }
    Ok(())
}

/// Writes `time` into the date fields of `instance`.
pub(super) fn fill<Tz: TimeZone>(
    rt: &Runtime,
    instance: Word,
    time: &DateTime<Tz>,
    is_gmt: bool,
) -> Result<(), Fault> {
    let values = [
        (DAY, time.day() as Word),
        (MONTH, time.month() as Word),
        (YEAR, time.year() as Word),
        (HOURS, time.hour() as Word),
        (MINS, time.minute() as Word),
        (SECS, time.second() as Word),
        (IS_DST, 0),
        (WEEKDAY, time.weekday().num_days_from_sunday() as Word),
        (IS_GMT, is_gmt as Word),
    ];
    for (index, value) in values {
        set_field(rt, instance, index, value)?;
    }
    Ok(())
}

/// Fills `instance` from unix seconds; out-of-range values leave it as is.
pub(super) fn from_unix(rt: &Runtime, instance: Word, seconds: i64, is_gmt: bool) -> Result<(), Fault> {
    let Some(time) = DateTime::<Utc>::from_timestamp(seconds, 0) else {
        return Ok(());
    };
    if is_gmt {
        fill(rt, instance, &time, true)
    } else {
        fill(rt, instance, &time.with_timezone(&Local), false)
    }
}

fn naive(fields: [Word; 6]) -> Option<NaiveDateTime> {
    let [year, month, day, hours, mins, secs] = fields;
    NaiveDate::from_ymd_opt(year as i32, month as u32, day as u32)?
        .and_hms_opt(hours as u32, mins as u32, secs as u32)
}

fn timestamp(time: NaiveDateTime, is_gmt: bool) -> Option<i64> {
    if is_gmt {
        Some(Utc.from_utc_datetime(&time).timestamp())
    } else {
        Local
            .from_local_datetime(&time)
            .earliest()
            .map(|local| local.timestamp())
    }
}

fn set_date(rt: &Runtime, instance: Word, fields: [Word; 6], is_gmt: bool) -> Result<(), Fault> {
    if instance == NIL {
        return Ok(());
    }
    match naive(fields).and_then(|time| timestamp(time, is_gmt)) {
        Some(seconds) => from_unix(rt, instance, seconds, is_gmt),
        None => Ok(()),
    }
}

/// Unix seconds and zone flag of a date instance.
fn unix_time(rt: &Runtime, instance: Word) -> Result<Option<(i64, bool)>, Fault> {
    let fields = [
        field(rt, instance, YEAR)?,
        field(rt, instance, MONTH)?,
        field(rt, instance, DAY)?,
        field(rt, instance, HOURS)?,
        field(rt, instance, MINS)?,
        field(rt, instance, SECS)?,
    ];
    let is_gmt = field(rt, instance, IS_GMT)? != 0;
    Ok(naive(fields)
        .and_then(|time| timestamp(time, is_gmt))
        .map(|seconds| (seconds, is_gmt)))
}
