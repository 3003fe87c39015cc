//! Scalar values and the remote-to-local conversion rules.
//!
//! The remote protocol is text based: every non-binary field arrives as raw
//! bytes holding the engine's textual rendering of the value. Conversion is
//! dispatched on the (remote type, local type) pairing plus the local type's
//! modifier, so every supported combination is enumerated in one place.

use std::fmt;

use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::{Date, PrimitiveDateTime};

use crate::error::{FdwError, Result};

/// Column type tags declared by the remote engine.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum RemoteType {
    TinyInt,
    SmallInt,
    Int,
    BigInt,
    Float,
    Double,
    Decimal,
    Boolean,
    String,
    Varchar,
    Char,
    Timestamp,
    Date,
    Binary,
}

impl fmt::Display for RemoteType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RemoteType::TinyInt => "TINYINT",
            RemoteType::SmallInt => "SMALLINT",
            RemoteType::Int => "INT",
            RemoteType::BigInt => "BIGINT",
            RemoteType::Float => "FLOAT",
            RemoteType::Double => "DOUBLE",
            RemoteType::Decimal => "DECIMAL",
            RemoteType::Boolean => "BOOLEAN",
            RemoteType::String => "STRING",
            RemoteType::Varchar => "VARCHAR",
            RemoteType::Char => "CHAR",
            RemoteType::Timestamp => "TIMESTAMP",
            RemoteType::Date => "DATE",
            RemoteType::Binary => "BINARY",
        };
        f.write_str(name)
    }
}

/// Broad conversion family a remote type belongs to.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
enum Family {
    Number,
    Boolean,
    Text,
    Date,
    Timestamp,
    Binary,
}

impl RemoteType {
    fn family(self) -> Family {
        match self {
            RemoteType::TinyInt
            | RemoteType::SmallInt
            | RemoteType::Int
            | RemoteType::BigInt
            | RemoteType::Float
            | RemoteType::Double
            | RemoteType::Decimal => Family::Number,
            RemoteType::Boolean => Family::Boolean,
            RemoteType::String | RemoteType::Varchar | RemoteType::Char => Family::Text,
            RemoteType::Date => Family::Date,
            RemoteType::Timestamp => Family::Timestamp,
            RemoteType::Binary => Family::Binary,
        }
    }
}

/// Column types of the local relation, with their modifiers.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum LocalType {
    Bool,
    Int2,
    Int4,
    Int8,
    Float4,
    Float8,
    /// Arbitrary-precision numeric; the modifier is (precision, scale).
    Numeric { precision: Option<(u16, u16)> },
    Text,
    Varchar { limit: Option<u32> },
    Char { limit: u32 },
    Date,
    Timestamp,
    Bytea,
}

impl fmt::Display for LocalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LocalType::Bool => f.write_str("bool"),
            LocalType::Int2 => f.write_str("int2"),
            LocalType::Int4 => f.write_str("int4"),
            LocalType::Int8 => f.write_str("int8"),
            LocalType::Float4 => f.write_str("float4"),
            LocalType::Float8 => f.write_str("float8"),
            LocalType::Numeric { precision: None } => f.write_str("numeric"),
            LocalType::Numeric {
                precision: Some((p, s)),
            } => write!(f, "numeric({p},{s})"),
            LocalType::Text => f.write_str("text"),
            LocalType::Varchar { limit: None } => f.write_str("varchar"),
            LocalType::Varchar { limit: Some(n) } => write!(f, "varchar({n})"),
            LocalType::Char { limit } => write!(f, "char({limit})"),
            LocalType::Date => f.write_str("date"),
            LocalType::Timestamp => f.write_str("timestamp"),
            LocalType::Bytea => f.write_str("bytea"),
        }
    }
}

/// Converted native value stored into a tuple slot.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Bool(bool),
    Int2(i16),
    Int4(i32),
    Int8(i64),
    Float4(f32),
    Float8(f64),
    /// Validated decimal digits, kept in textual form.
    Numeric(String),
    Text(String),
    Date(Date),
    Timestamp(PrimitiveDateTime),
    Bytes(Vec<u8>),
}

const DATE_FORMAT: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]-[day]");
const TIMESTAMP_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");

/// Converts one raw remote field into a local value.
///
/// `None` and zero-length payloads are absent values and convert to null.
/// Malformed payloads are conversion errors, never nulls.
pub fn convert_raw(
    raw: Option<&[u8]>,
    remote: RemoteType,
    local: LocalType,
    column: &str,
) -> Result<Option<Value>> {
    let bytes = match raw {
        Some(bytes) if !bytes.is_empty() => bytes,
        _ => return Ok(None),
    };

    if remote.family() == Family::Binary {
        return match local {
            LocalType::Bytea => Ok(Some(Value::Bytes(bytes.to_vec()))),
            _ => Err(mismatch(remote, local, column)),
        };
    }

    let text = std::str::from_utf8(bytes)
        .map_err(|_| FdwError::conversion(column, "field is not valid UTF-8"))?;
    let text = text.trim();
    if text.is_empty() {
        return Ok(None);
    }

    let value = match (remote.family(), local) {
        (Family::Number | Family::Text, LocalType::Int2) => {
            Value::Int2(parse_number(text, local, column)?)
        }
        (Family::Number | Family::Text, LocalType::Int4) => {
            Value::Int4(parse_number(text, local, column)?)
        }
        (Family::Number | Family::Text, LocalType::Int8) => {
            Value::Int8(parse_number(text, local, column)?)
        }
        (Family::Number | Family::Text, LocalType::Float4) => {
            Value::Float4(parse_number(text, local, column)?)
        }
        (Family::Number | Family::Text, LocalType::Float8) => {
            Value::Float8(parse_number(text, local, column)?)
        }
        (Family::Number | Family::Text, LocalType::Numeric { precision }) => {
            Value::Numeric(validate_numeric(text, precision, column)?)
        }
        (Family::Boolean | Family::Number | Family::Text, LocalType::Bool) => {
            Value::Bool(parse_bool(text, column)?)
        }
        (Family::Date | Family::Text, LocalType::Date) => Value::Date(
            Date::parse(text, DATE_FORMAT)
                .map_err(|_| FdwError::conversion(column, format!("cannot parse '{text}' as date")))?,
        ),
        (Family::Timestamp | Family::Text, LocalType::Timestamp) => {
            Value::Timestamp(parse_timestamp(text).ok_or_else(|| {
                FdwError::conversion(column, format!("cannot parse '{text}' as timestamp"))
            })?)
        }
        (_, LocalType::Text) => Value::Text(text.to_owned()),
        (_, LocalType::Varchar { limit }) => {
            check_char_limit(text, limit, local, column)?;
            Value::Text(text.to_owned())
        }
        (_, LocalType::Char { limit }) => {
            check_char_limit(text, Some(limit), local, column)?;
            Value::Text(text.to_owned())
        }
        _ => return Err(mismatch(remote, local, column)),
    };
    Ok(Some(value))
}

fn mismatch(remote: RemoteType, local: LocalType, column: &str) -> FdwError {
    FdwError::conversion(
        column,
        format!("remote type {remote} is not convertible to {local}"),
    )
}

fn parse_number<T: std::str::FromStr>(text: &str, local: LocalType, column: &str) -> Result<T> {
    text.parse::<T>()
        .map_err(|_| FdwError::conversion(column, format!("cannot parse '{text}' as {local}")))
}

fn parse_bool(text: &str, column: &str) -> Result<bool> {
    match text.to_ascii_lowercase().as_str() {
        "true" | "t" | "1" => Ok(true),
        "false" | "f" | "0" => Ok(false),
        _ => Err(FdwError::conversion(
            column,
            format!("cannot parse '{text}' as bool"),
        )),
    }
}

fn check_char_limit(
    text: &str,
    limit: Option<u32>,
    local: LocalType,
    column: &str,
) -> Result<()> {
    if let Some(limit) = limit {
        if text.chars().count() > limit as usize {
            return Err(FdwError::conversion(
                column,
                format!("value too long for {local}"),
            ));
        }
    }
    Ok(())
}

/// Validates a decimal rendering against an optional (precision, scale)
/// modifier and returns it in the form it arrived.
fn validate_numeric(text: &str, precision: Option<(u16, u16)>, column: &str) -> Result<String> {
    let unsigned = text
        .strip_prefix('-')
        .or_else(|| text.strip_prefix('+'))
        .unwrap_or(text);
    let (int_part, frac_part) = match unsigned.split_once('.') {
        Some((int_part, frac_part)) => (int_part, frac_part),
        None => (unsigned, ""),
    };
    let digits_only =
        int_part.bytes().all(|b| b.is_ascii_digit()) && frac_part.bytes().all(|b| b.is_ascii_digit());
    if !digits_only || (int_part.is_empty() && frac_part.is_empty()) {
        return Err(FdwError::conversion(
            column,
            format!("cannot parse '{text}' as numeric"),
        ));
    }
    if let Some((precision, scale)) = precision {
        let int_digits = int_part.trim_start_matches('0').len();
        let whole_budget = (precision as usize).saturating_sub(scale as usize);
        if frac_part.len() > scale as usize || int_digits > whole_budget {
            return Err(FdwError::conversion(
                column,
                format!("'{text}' exceeds numeric({precision},{scale})"),
            ));
        }
    }
    Ok(text.to_owned())
}

/// Parses `YYYY-MM-DD HH:MM:SS` with an optional fractional-second suffix of
/// up to nine digits.
fn parse_timestamp(text: &str) -> Option<PrimitiveDateTime> {
    let (main, fraction) = match text.split_once('.') {
        Some((main, fraction)) => (main, Some(fraction)),
        None => (text, None),
    };
    let parsed = PrimitiveDateTime::parse(main, TIMESTAMP_FORMAT).ok()?;
    match fraction {
        None => Some(parsed),
        Some(digits)
            if !digits.is_empty()
                && digits.len() <= 9
                && digits.bytes().all(|b| b.is_ascii_digit()) =>
        {
            let scale = 10u32.pow(9 - digits.len() as u32);
            let nanos = digits.parse::<u32>().ok()? * scale;
            parsed.replace_nanosecond(nanos).ok()
        }
        Some(_) => None,
    }
}
