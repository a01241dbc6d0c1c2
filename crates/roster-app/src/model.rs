// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime};
use tracing::warn;

use crate::{PlatformKey, PlatformRecord, UserId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub email: String,
    #[serde(
        default,
        serialize_with = "serialize_created_at",
        deserialize_with = "deserialize_created_at"
    )]
    pub created_at: Option<OffsetDateTime>,
    #[serde(default, deserialize_with = "deserialize_platforms")]
    pub platforms: Vec<PlatformRecord>,
}

impl User {
    pub fn platform_keys(&self) -> Vec<PlatformKey> {
        let mut keys: Vec<PlatformKey> = Vec::with_capacity(self.platforms.len());
        for record in &self.platforms {
            let key = record.key();
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
        keys
    }

    pub fn created_label(&self) -> String {
        self.created_at
            .and_then(|created| {
                created
                    .date()
                    .format(format_description!("[year]-[month]-[day]"))
                    .ok()
            })
            .unwrap_or_else(|| "-".to_owned())
    }

    pub fn initial(&self) -> String {
        self.username
            .chars()
            .next()
            .map(|first| first.to_uppercase().collect())
            .unwrap_or_default()
    }

    /// Case-insensitive match on username or email.
    pub fn matches(&self, query: &str) -> bool {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return true;
        }
        self.username.to_lowercase().contains(&query) || self.email.to_lowercase().contains(&query)
    }
}

/// Decodes a user list record by record. Records that do not decode are
/// logged and skipped so one bad row leaves the rest of the list intact.
pub fn decode_users(records: Vec<Value>) -> Vec<User> {
    let total = records.len();
    let users = records
        .into_iter()
        .enumerate()
        .filter_map(|(index, record)| {
            let username = record
                .get("username")
                .and_then(Value::as_str)
                .unwrap_or("<unnamed>")
                .to_owned();
            match serde_json::from_value::<User>(record) {
                Ok(user) => Some(user),
                Err(error) => {
                    warn!(index, username = %username, error = %error, "skipping undecodable user record");
                    None
                }
            }
        })
        .collect::<Vec<_>>();
    if users.len() < total {
        warn!(kept = users.len(), total, "user list decoded partially");
    }
    users
}

/// Parses API timestamps. The API emits offset-less ISO timestamps, which
/// are taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<OffsetDateTime> {
    let trimmed = raw.trim();
    if let Ok(parsed) = OffsetDateTime::parse(trimmed, &Rfc3339) {
        return Some(parsed);
    }
    PrimitiveDateTime::parse(
        trimmed,
        format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond]"),
    )
    .or_else(|_| {
        PrimitiveDateTime::parse(
            trimmed,
            format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]"),
        )
    })
    .ok()
    .map(PrimitiveDateTime::assume_utc)
}

fn serialize_created_at<S>(value: &Option<OffsetDateTime>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match value {
        Some(created) => {
            let formatted = created
                .format(&Rfc3339)
                .map_err(serde::ser::Error::custom)?;
            serializer.serialize_some(&formatted)
        }
        None => serializer.serialize_none(),
    }
}

fn deserialize_created_at<'de, D>(deserializer: D) -> Result<Option<OffsetDateTime>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?
        .as_deref()
        .and_then(parse_timestamp))
}

fn deserialize_platforms<'de, D>(deserializer: D) -> Result<Vec<PlatformRecord>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(value @ Value::Array(_)) => serde_json::from_value(value).map_err(D::Error::custom),
        Some(Value::Object(_)) => Err(D::Error::custom(
            "platforms must be a list of tagged records; the keyed-object shape of older API revisions is not supported",
        )),
        Some(other) => Err(D::Error::custom(format!(
            "platforms must be a list, got {other}"
        ))),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormKind {
    Create,
    Edit,
}

impl FormKind {
    pub const fn title(self) -> &'static str {
        match self {
            Self::Create => "Create New User",
            Self::Edit => "Edit User",
        }
    }

    pub const fn submit_label(self) -> &'static str {
        match self {
            Self::Create => "Create User",
            Self::Edit => "Update User",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppMode {
    List,
    Form(FormKind),
    ConfirmDelete,
}
