//! Conversion between users' wall-clock times and canonical UTC instants.
//!
//! Every instant stored or compared anywhere in Datebook is UTC. Local times
//! only exist at the boundary: parsed from `YYYY-MM-DD HH:MM` input paired
//! with an IANA zone name, and rendered back in the viewer's zone.

use chrono::{
  DateTime, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, TimeZone as _, Utc,
};
use chrono_tz::Tz;

use crate::{Error, Result};

/// Wall-clock format used at the API and in notification text.
pub const LOCAL_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Parse an IANA timezone identifier such as `Europe/Warsaw`.
pub fn parse_timezone(name: &str) -> Result<Tz> {
  name
    .trim()
    .parse::<Tz>()
    .map_err(|_| Error::InvalidTimezone(name.to_owned()))
}

/// Convert a wall-clock time in `timezone` into a UTC instant.
///
/// The zone's rules at `local`'s own date apply, so DST is handled correctly
/// for dates far from today. An ambiguous time (the repeated hour when
/// clocks go back) resolves to the earlier instant; a time inside the
/// spring-forward gap is rejected.
pub fn to_utc(local: NaiveDateTime, timezone: &str) -> Result<DateTime<Utc>> {
  let tz = parse_timezone(timezone)?;
  match tz.from_local_datetime(&local) {
    LocalResult::Single(dt) => Ok(dt.with_timezone(&Utc)),
    LocalResult::Ambiguous(earliest, _) => Ok(earliest.with_timezone(&Utc)),
    LocalResult::None => Err(Error::InvalidLocalTime {
      local:    local.format(LOCAL_FORMAT).to_string(),
      timezone: tz.name().to_owned(),
    }),
  }
}

/// Convert a UTC instant into wall-clock time in `timezone`.
pub fn to_local(instant: DateTime<Utc>, timezone: &str) -> Result<NaiveDateTime> {
  let tz = parse_timezone(timezone)?;
  Ok(instant.with_timezone(&tz).naive_local())
}

/// Parse `YYYY-MM-DD HH:MM` (a `T` separator is also accepted).
pub fn parse_local(text: &str) -> Result<NaiveDateTime> {
  let trimmed = text.trim();
  NaiveDateTime::parse_from_str(trimmed, LOCAL_FORMAT)
    .or_else(|_| NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M"))
    .map_err(|_| Error::InvalidTimeFormat(text.to_owned()))
}

pub fn format_local(local: NaiveDateTime) -> String {
  local.format(LOCAL_FORMAT).to_string()
}

/// Render `instant` as `YYYY-MM-DD HH:MM` in `timezone`.
pub fn render(instant: DateTime<Utc>, timezone: &str) -> Result<String> {
  to_local(instant, timezone).map(format_local)
}

/// Like [`render`], for a zone that is already parsed.
pub fn render_in(instant: DateTime<Utc>, tz: Tz) -> String {
  format_local(instant.with_timezone(&tz).naive_local())
}

/// The calendar date `instant` falls on in `tz`.
pub fn local_date(instant: DateTime<Utc>, tz: Tz) -> NaiveDate {
  instant.with_timezone(&tz).date_naive()
}

/// UTC bounds `[start, end)` of the calendar day `date` in `tz`.
///
/// A day does not always start at 00:00: some zones skip midnight when DST
/// begins, in which case the first existing hour opens the day.
pub fn day_bounds(date: NaiveDate, tz: Tz) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
  let next = date.succ_opt().ok_or_else(|| Error::InvalidLocalTime {
    local:    date.to_string(),
    timezone: tz.name().to_owned(),
  })?;
  Ok((start_of_day(date, tz)?, start_of_day(next, tz)?))
}

fn start_of_day(date: NaiveDate, tz: Tz) -> Result<DateTime<Utc>> {
  (0..24)
    .filter_map(|hour| NaiveTime::from_hms_opt(hour, 0, 0))
    .find_map(|time| tz.from_local_datetime(&date.and_time(time)).earliest())
    .map(|dt| dt.with_timezone(&Utc))
    .ok_or_else(|| Error::InvalidLocalTime {
      local:    date.to_string(),
      timezone: tz.name().to_owned(),
    })
}

#[cfg(test)]
mod tests {
  use chrono::NaiveDate;

  use super::*;

  fn local(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d)
      .unwrap()
      .and_hms_opt(h, min, 0)
      .unwrap()
  }

  fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
  }

  #[test]
  fn rejects_unknown_zone() {
    assert!(matches!(
      parse_timezone("Mars/Olympus_Mons"),
      Err(Error::InvalidTimezone(_))
    ));
    assert!(matches!(
      to_utc(local(2024, 1, 10, 9, 0), "UTC+2"),
      Err(Error::InvalidTimezone(_))
    ));
  }

  #[test]
  fn winter_and_summer_offsets_follow_the_event_date() {
    // CET is UTC+1, CEST is UTC+2.
    assert_eq!(
      to_utc(local(2024, 1, 10, 9, 0), "Europe/Warsaw").unwrap(),
      utc(2024, 1, 10, 8, 0)
    );
    assert_eq!(
      to_utc(local(2024, 7, 10, 9, 0), "Europe/Warsaw").unwrap(),
      utc(2024, 7, 10, 7, 0)
    );
  }

  #[test]
  fn round_trip_inside_and_outside_dst() {
    let cases = [
      (local(2024, 1, 10, 9, 0), "Europe/Warsaw"),
      (local(2024, 3, 31, 3, 30), "Europe/Warsaw"),
      (local(2024, 10, 27, 1, 59), "Europe/Warsaw"),
      (local(2024, 3, 10, 12, 0), "America/New_York"),
      (local(2024, 11, 3, 3, 0), "America/New_York"),
      (local(2024, 6, 1, 0, 0), "Asia/Tokyo"),
    ];
    for (naive, zone) in cases {
      let instant = to_utc(naive, zone).unwrap();
      assert_eq!(to_local(instant, zone).unwrap(), naive, "{zone} {naive}");
    }
  }

  #[test]
  fn spring_forward_gap_is_rejected() {
    // 02:30 on 2024-03-31 is skipped in Warsaw.
    let err = to_utc(local(2024, 3, 31, 2, 30), "Europe/Warsaw").unwrap_err();
    assert!(matches!(err, Error::InvalidLocalTime { .. }));
  }

  #[test]
  fn fall_back_ambiguity_takes_earlier_instant() {
    // 02:30 happens twice on 2024-10-27 in Warsaw: first at CEST (00:30Z).
    assert_eq!(
      to_utc(local(2024, 10, 27, 2, 30), "Europe/Warsaw").unwrap(),
      utc(2024, 10, 27, 0, 30)
    );
  }

  #[test]
  fn parse_and_format_local() {
    let parsed = parse_local(" 2024-01-10 09:00 ").unwrap();
    assert_eq!(parsed, local(2024, 1, 10, 9, 0));
    assert_eq!(parse_local("2024-01-10T09:00").unwrap(), parsed);
    assert_eq!(format_local(parsed), "2024-01-10 09:00");
    assert!(matches!(
      parse_local("10/01/2024 9am"),
      Err(Error::InvalidTimeFormat(_))
    ));
  }

  #[test]
  fn render_in_viewer_zone() {
    let instant = utc(2024, 1, 10, 8, 0);
    assert_eq!(render(instant, "Europe/Warsaw").unwrap(), "2024-01-10 09:00");
    assert_eq!(render(instant, "UTC").unwrap(), "2024-01-10 08:00");
    assert_eq!(render_in(instant, chrono_tz::Asia::Tokyo), "2024-01-10 17:00");
  }

  #[test]
  fn day_bounds_follow_the_zone() {
    let warsaw = parse_timezone("Europe/Warsaw").unwrap();
    let date = NaiveDate::from_ymd_opt(2024, 1, 10).unwrap();
    assert_eq!(
      day_bounds(date, warsaw).unwrap(),
      (utc(2024, 1, 9, 23, 0), utc(2024, 1, 10, 23, 0))
    );

    // The spring-forward day is 23 hours long.
    let (start, end) = day_bounds(NaiveDate::from_ymd_opt(2024, 3, 31).unwrap(), warsaw).unwrap();
    assert_eq!(end - start, chrono::Duration::hours(23));

    // 23:30Z on the 9th is already the 10th in Warsaw.
    assert_eq!(local_date(utc(2024, 1, 9, 23, 30), warsaw), date);
  }

  #[test]
  fn day_starting_inside_a_gap_opens_at_first_existing_hour() {
    // Santiago skipped 00:00-01:00 on 2024-09-08.
    let santiago = parse_timezone("America/Santiago").unwrap();
    let (start, _) =
      day_bounds(NaiveDate::from_ymd_opt(2024, 9, 8).unwrap(), santiago).unwrap();
    assert_eq!(start, utc(2024, 9, 8, 4, 0));
  }
}
