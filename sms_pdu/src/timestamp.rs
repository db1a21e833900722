use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, TimeZone, Timelike};

use crate::Error;

/// Seven swapped semi-octets: year, month, day, hour, minute, second and the
/// timezone in quarter hours, with bit 3 carrying the sign.
pub(crate) fn decode(bytes: &[u8]) -> Result<DateTime<FixedOffset>, Error> {
    let [yy, mo, dd, hh, mi, ss, tz] = *bytes else {
        return Err(Error::InvalidTimestamp);
    };

    let quarters = i32::from(semi(tz & 0xF7));
    let seconds = quarters * 15 * 60;
    let offset = if tz & 0x08 == 0 {
        FixedOffset::east_opt(seconds)
    } else {
        FixedOffset::west_opt(seconds)
    }
    .ok_or(Error::InvalidTimestamp)?;

    let naive = NaiveDate::from_ymd_opt(
        2000 + i32::from(semi(yy)),
        u32::from(semi(mo)),
        u32::from(semi(dd)),
    )
    .and_then(|d| d.and_hms_opt(u32::from(semi(hh)), u32::from(semi(mi)), u32::from(semi(ss))))
    .ok_or(Error::InvalidTimestamp)?;

    offset
        .from_local_datetime(&naive)
        .single()
        .ok_or(Error::InvalidTimestamp)
}

pub(crate) fn encode(ts: &DateTime<FixedOffset>) -> [u8; 7] {
    let offset = ts.offset().local_minus_utc();
    let quarters = (offset.unsigned_abs() / (15 * 60)) as u8;
    let sign = if offset < 0 { 0x08 } else { 0x00 };

    [
        swap((ts.year() % 100) as u8),
        swap(ts.month() as u8),
        swap(ts.day() as u8),
        swap(ts.hour() as u8),
        swap(ts.minute() as u8),
        swap(ts.second() as u8),
        swap(quarters) | sign,
    ]
}

const fn semi(b: u8) -> u8 {
    (b & 0x0F) * 10 + (b >> 4)
}

const fn swap(v: u8) -> u8 {
    ((v % 10) << 4) | (v / 10)
}
