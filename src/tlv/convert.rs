//! Field converters applied to raw TLV values.
//!
//! Converters are total over well-formed card data and report malformed
//! bytes as [`Error`] values rather than panicking.

use time::{Date, Month};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),
    #[error("invalid date {value:?}, expected DD.MM.YYYY")]
    Date { value: String },
    #[error("invalid birth date {value:?}")]
    BirthDate { value: String },
    #[error("unknown gender value {value:?}")]
    Gender { value: String },
    #[error("invalid document type {value:?}")]
    DocumentType { value: String },
    #[error("invalid special status {value:?}")]
    SpecialStatus { value: String },
}

pub fn string(value: &[u8]) -> Result<String, Error> {
    Ok(std::str::from_utf8(value)?.to_string())
}

/// Chip numbers are binary and conventionally rendered as upper-case hex.
pub fn hex_string(value: &[u8]) -> Result<String, Error> {
    Ok(hex::encode_upper(value))
}

pub fn bytes(value: &[u8]) -> Result<Vec<u8>, Error> {
    Ok(value.to_vec())
}

/// Card validity dates are printed as `DD.MM.YYYY`.
pub fn date(value: &[u8]) -> Result<Date, Error> {
    let text = std::str::from_utf8(value)?;
    parse_dotted_date(text).ok_or_else(|| Error::Date {
        value: text.to_string(),
    })
}

fn parse_dotted_date(text: &str) -> Option<Date> {
    let mut parts = text.split('.');
    let day: u8 = parts.next()?.parse().ok()?;
    let month: u8 = parts.next()?.parse().ok()?;
    let year: i32 = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Date::from_calendar_date(year, Month::try_from(month).ok()?, day).ok()
}

/// Birth dates are printed as `DD MON YYYY` with a Dutch, French or German
/// month abbreviation; some very old cards carry only the year.
pub fn birth_date(value: &[u8]) -> Result<Date, Error> {
    let text = std::str::from_utf8(value)?;
    let error = || Error::BirthDate {
        value: text.to_string(),
    };
    let trimmed = text.trim();
    if trimmed.len() == 4 && trimmed.chars().all(|c| c.is_ascii_digit()) {
        let year: i32 = trimmed.parse().map_err(|_| error())?;
        return Date::from_calendar_date(year, Month::January, 1).map_err(|_| error());
    }
    let mut parts = trimmed.split_whitespace();
    let day: u8 = parts.next().ok_or_else(error)?.parse().map_err(|_| error())?;
    let month = month_abbreviation(parts.next().ok_or_else(error)?).ok_or_else(error)?;
    let year: i32 = parts.next().ok_or_else(error)?.parse().map_err(|_| error())?;
    if parts.next().is_some() {
        return Err(error());
    }
    Date::from_calendar_date(year, month, day).map_err(|_| error())
}

fn month_abbreviation(token: &str) -> Option<Month> {
    let normalized = token.trim_end_matches('.').to_uppercase();
    let month = match normalized.as_str() {
        "JAN" => Month::January,
        "FEV" | "FEB" => Month::February,
        "MARS" | "MAAR" | "MAART" | "M\u{c4}R" | "M\u{c4}RZ" => Month::March,
        "AVR" | "APR" => Month::April,
        "MAI" | "MEI" => Month::May,
        "JUIN" | "JUN" | "JUNI" => Month::June,
        "JUIL" | "JUL" | "JULI" => Month::July,
        "AOUT" | "AUG" => Month::August,
        "SEPT" | "SEP" => Month::September,
        "OCT" | "OKT" => Month::October,
        "NOV" => Month::November,
        "DEC" | "DEZ" => Month::December,
        _ => return None,
    };
    Some(month)
}

#[cfg(test)]
mod test {
    use super::*;
    use time::macros::date;

    #[test]
    fn dotted_date() {
        assert_eq!(date(b"21.03.2031").unwrap(), date!(2031 - 03 - 21));
        assert!(date(b"21-03-2031").is_err());
        assert!(date(b"32.01.2031").is_err());
    }

    #[test]
    fn birth_date_formats() {
        assert_eq!(birth_date(b"09 AOUT 1995").unwrap(), date!(1995 - 08 - 09));
        assert_eq!(birth_date(b"09 AUG  1995").unwrap(), date!(1995 - 08 - 09));
        assert_eq!(birth_date(b"01 SEPT 2004").unwrap(), date!(2004 - 09 - 01));
        assert_eq!(birth_date(b"1962").unwrap(), date!(1962 - 01 - 01));
        assert!(birth_date(b"09 FOO 1995").is_err());
    }

    #[test]
    fn invalid_utf8_is_a_descriptive_error() {
        let err = string(&[0xc3, 0x28]).unwrap_err();
        assert!(err.to_string().starts_with("invalid UTF-8"));
    }

    #[test]
    fn chip_number_hex() {
        assert_eq!(hex_string(&[0xde, 0xad, 0x01]).unwrap(), "DEAD01");
    }
}
