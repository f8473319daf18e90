//! Conversions between libSQL rows/values and models

use chrono::{DateTime, Utc};
use libsql::{Row, Value};

use crate::error::{Error, Result};
use crate::models::{Item, ItemId, SyncState};
use crate::util::{format_timestamp, parse_timestamp};

/// Column list matching [`parse_item`].
pub const ITEM_COLUMNS: &str =
    "id, name, bought_at, created_at, updated_at, from_remote, dirty, active";

pub fn text(value: impl Into<String>) -> Value {
    Value::Text(value.into())
}

pub fn timestamp(value: &DateTime<Utc>) -> Value {
    Value::Text(format_timestamp(value))
}

pub fn optional_timestamp(value: Option<&DateTime<Utc>>) -> Value {
    value.map_or(Value::Null, timestamp)
}

pub fn flag(value: bool) -> Value {
    Value::Integer(i64::from(value))
}

/// Parse an item from a row selected with [`ITEM_COLUMNS`].
pub fn parse_item(row: &Row) -> Result<Item> {
    let id: String = row.get(0)?;
    let id = id
        .parse::<ItemId>()
        .map_err(|error| Error::Database(format!("invalid item id {id}: {error}")))?;

    let bought_at = match row.get_value(2)? {
        Value::Null => None,
        Value::Text(raw) => Some(parse_stored_timestamp(&raw)?),
        other => {
            return Err(Error::Database(format!(
                "invalid bought_at for {id}: {other:?}"
            )))
        }
    };

    let created_at: String = row.get(3)?;
    let updated_at: String = row.get(4)?;
    let from_remote: i64 = row.get(5)?;
    let dirty: i64 = row.get(6)?;
    let active: i64 = row.get(7)?;

    let state = SyncState::from_flags(from_remote != 0, dirty != 0, active != 0).ok_or_else(
        || {
            Error::Database(format!(
                "invalid sync state for {id}: from_remote={from_remote} dirty={dirty} active={active}"
            ))
        },
    )?;

    Ok(Item {
        id,
        name: row.get(1)?,
        bought_at,
        created_at: parse_stored_timestamp(&created_at)?,
        updated_at: parse_stored_timestamp(&updated_at)?,
        state,
    })
}

pub fn parse_stored_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    parse_timestamp(raw).ok_or_else(|| Error::Database(format!("invalid stored timestamp: {raw}")))
}
