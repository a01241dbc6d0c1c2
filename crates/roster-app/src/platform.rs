// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, anyhow, bail};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Gitlab,
    Mattermost,
    Drive,
    Nextcloud,
}

impl Platform {
    pub const ALL: [Self; 4] = [Self::Gitlab, Self::Mattermost, Self::Drive, Self::Nextcloud];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Gitlab => "gitlab",
            Self::Mattermost => "mattermost",
            Self::Drive => "drive",
            Self::Nextcloud => "nextcloud",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "gitlab" => Some(Self::Gitlab),
            "mattermost" => Some(Self::Mattermost),
            "drive" => Some(Self::Drive),
            "nextcloud" => Some(Self::Nextcloud),
            _ => None,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Gitlab => "GitLab",
            Self::Mattermost => "Mattermost",
            Self::Drive => "Drive",
            Self::Nextcloud => "Nextcloud",
        }
    }
}

/// Key of a platform config. Identifiers outside the known set are kept
/// verbatim so newer API payloads survive an edit.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PlatformKey {
    Known(Platform),
    Other(String),
}

impl PlatformKey {
    pub fn parse(value: &str) -> Self {
        match Platform::parse(value) {
            Some(platform) => Self::Known(platform),
            None => Self::Other(value.to_owned()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Known(platform) => platform.as_str(),
            Self::Other(name) => name,
        }
    }

    pub const fn platform(&self) -> Option<Platform> {
        match self {
            Self::Known(platform) => Some(*platform),
            Self::Other(_) => None,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Self::Known(platform) => platform.label(),
            Self::Other(name) => name,
        }
    }
}

impl From<Platform> for PlatformKey {
    fn from(value: Platform) -> Self {
        Self::Known(value)
    }
}

impl fmt::Display for PlatformKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Splits comma-separated free text into trimmed, non-empty entries.
pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_owned)
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Text(String),
    List(Vec<String>),
}

impl FieldValue {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    pub fn display(&self) -> String {
        match self {
            Self::Text(value) => value.clone(),
            Self::List(values) => values.join(", "),
        }
    }

    pub fn into_text(self) -> String {
        match self {
            Self::Text(value) => value,
            Self::List(values) => values.join(", "),
        }
    }

    pub fn into_list(self) -> Vec<String> {
        match self {
            Self::Text(value) => split_list(&value),
            Self::List(values) => values,
        }
    }

    fn into_json(self) -> Value {
        match self {
            Self::Text(value) => Value::String(value),
            Self::List(values) => Value::Array(values.into_iter().map(Value::String).collect()),
        }
    }

    fn from_json(value: &Value) -> Self {
        match value {
            Value::String(text) => Self::Text(text.clone()),
            Value::Array(items) => Self::List(items.iter().map(json_text).collect()),
            Value::Null => Self::Text(String::new()),
            other => Self::Text(other.to_string()),
        }
    }
}

fn json_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitlabConfig {
    pub role: String,
    pub group_id: String,
    pub repo_access: Vec<String>,
}

impl Default for GitlabConfig {
    fn default() -> Self {
        Self {
            role: "Guest".to_owned(),
            group_id: String::new(),
            repo_access: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MattermostConfig {
    #[serde(deserialize_with = "lenient_text")]
    pub server_name: String,
    #[serde(deserialize_with = "lenient_text")]
    pub team: String,
    #[serde(deserialize_with = "lenient_list")]
    pub default_channels: Vec<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub role: String,
}

impl Default for MattermostConfig {
    fn default() -> Self {
        Self {
            server_name: String::new(),
            team: String::new(),
            default_channels: Vec::new(),
            role: "Member".to_owned(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NextcloudConfig {
    #[serde(deserialize_with = "lenient_text")]
    pub storage_limit: String,
    #[serde(deserialize_with = "lenient_text")]
    pub shared_folder_id: String,
    #[serde(deserialize_with = "lenient_text")]
    pub permission: String,
}

impl Default for NextcloudConfig {
    fn default() -> Self {
        Self {
            storage_limit: String::new(),
            shared_folder_id: String::new(),
            permission: "viewer".to_owned(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriveConfig {
    #[serde(deserialize_with = "lenient_text")]
    pub shared_folder_id: String,
    #[serde(deserialize_with = "lenient_text")]
    pub role: String,
    #[serde(deserialize_with = "lenient_text")]
    pub user_email: String,
    #[serde(deserialize_with = "lenient_text")]
    pub permission_id: String,
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            shared_folder_id: String::new(),
            role: "reader".to_owned(),
            user_email: String::new(),
            permission_id: String::new(),
        }
    }
}

/// In-memory platform config as held by a form session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformConfig {
    Gitlab(GitlabConfig),
    Mattermost(MattermostConfig),
    Drive(DriveConfig),
    Nextcloud(NextcloudConfig),
    Other {
        platform: String,
        fields: Map<String, Value>,
    },
}

impl PlatformConfig {
    pub fn key(&self) -> PlatformKey {
        match self {
            Self::Gitlab(_) => PlatformKey::Known(Platform::Gitlab),
            Self::Mattermost(_) => PlatformKey::Known(Platform::Mattermost),
            Self::Drive(_) => PlatformKey::Known(Platform::Drive),
            Self::Nextcloud(_) => PlatformKey::Known(Platform::Nextcloud),
            Self::Other { platform, .. } => PlatformKey::Other(platform.clone()),
        }
    }

    pub fn field(&self, name: &str) -> Option<FieldValue> {
        let value = match (self, name) {
            (Self::Gitlab(config), "role") => FieldValue::text(&config.role),
            (Self::Gitlab(config), "group_id") => FieldValue::text(&config.group_id),
            (Self::Gitlab(config), "repo_access") => FieldValue::List(config.repo_access.clone()),
            (Self::Mattermost(config), "server_name") => FieldValue::text(&config.server_name),
            (Self::Mattermost(config), "team") => FieldValue::text(&config.team),
            (Self::Mattermost(config), "default_channels") => {
                FieldValue::List(config.default_channels.clone())
            }
            (Self::Mattermost(config), "role") => FieldValue::text(&config.role),
            (Self::Drive(config), "shared_folder_id") => FieldValue::text(&config.shared_folder_id),
            (Self::Drive(config), "role") => FieldValue::text(&config.role),
            (Self::Drive(config), "user_email") => FieldValue::text(&config.user_email),
            (Self::Drive(config), "permission_id") => FieldValue::text(&config.permission_id),
            (Self::Nextcloud(config), "storage_limit") => FieldValue::text(&config.storage_limit),
            (Self::Nextcloud(config), "shared_folder_id") => {
                FieldValue::text(&config.shared_folder_id)
            }
            (Self::Nextcloud(config), "permission") => FieldValue::text(&config.permission),
            (Self::Other { fields, .. }, name) => FieldValue::from_json(fields.get(name)?),
            _ => return None,
        };
        Some(value)
    }

    /// Merges one field into the config, leaving the others untouched.
    pub fn set_field(&mut self, name: &str, value: FieldValue) -> Result<()> {
        match self {
            Self::Gitlab(config) => match name {
                "role" => config.role = value.into_text(),
                "group_id" => config.group_id = value.into_text(),
                "repo_access" => config.repo_access = value.into_list(),
                _ => return Err(unknown_field(Platform::Gitlab, name)),
            },
            Self::Mattermost(config) => match name {
                "server_name" => config.server_name = value.into_text(),
                "team" => config.team = value.into_text(),
                "default_channels" => config.default_channels = value.into_list(),
                "role" => config.role = value.into_text(),
                _ => return Err(unknown_field(Platform::Mattermost, name)),
            },
            Self::Drive(config) => match name {
                "shared_folder_id" => config.shared_folder_id = value.into_text(),
                "role" => config.role = value.into_text(),
                "user_email" => config.user_email = value.into_text(),
                "permission_id" => config.permission_id = value.into_text(),
                _ => return Err(unknown_field(Platform::Drive, name)),
            },
            Self::Nextcloud(config) => match name {
                "storage_limit" => config.storage_limit = value.into_text(),
                "shared_folder_id" => config.shared_folder_id = value.into_text(),
                "permission" => config.permission = value.into_text(),
                _ => return Err(unknown_field(Platform::Nextcloud, name)),
            },
            Self::Other { platform, fields } => {
                if name == "platform" {
                    bail!("the platform tag of {platform:?} is not an editable field");
                }
                fields.insert(name.to_owned(), value.into_json());
            }
        }
        Ok(())
    }
}

fn unknown_field(platform: Platform, name: &str) -> anyhow::Error {
    anyhow!(
        "{} has no field {name:?} -- pick one of the fields shown in the form",
        platform.label()
    )
}

/// A gitlab repository id as sent on the wire. Entries that do not parse as
/// a number are kept as a sentinel that serializes to `null`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepoAccessId(Option<i64>);

impl RepoAccessId {
    pub const fn new(id: i64) -> Self {
        Self(Some(id))
    }

    pub const fn invalid() -> Self {
        Self(None)
    }

    pub fn parse(raw: &str) -> Self {
        Self(raw.trim().parse().ok())
    }

    pub const fn get(self) -> Option<i64> {
        self.0
    }

    pub fn to_text(self) -> String {
        self.0.map(|id| id.to_string()).unwrap_or_default()
    }
}

impl Serialize for RepoAccessId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self.0 {
            Some(id) => serializer.serialize_i64(id),
            None => serializer.serialize_none(),
        }
    }
}

impl<'de> Deserialize<'de> for RepoAccessId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Option::<Value>::deserialize(deserializer)? {
            Some(Value::Number(number)) => Self(number.as_i64()),
            Some(Value::String(text)) => Self::parse(&text),
            _ => Self::invalid(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GitlabRecord {
    #[serde(deserialize_with = "lenient_text")]
    pub role: String,
    #[serde(deserialize_with = "lenient_text")]
    pub group_id: String,
    #[serde(deserialize_with = "lenient_repo_ids")]
    pub repo_access: Vec<RepoAccessId>,
}

impl Default for GitlabRecord {
    fn default() -> Self {
        let defaults = GitlabConfig::default();
        Self {
            role: defaults.role,
            group_id: defaults.group_id,
            repo_access: Vec::new(),
        }
    }
}

/// Wire-format platform record: a flat JSON object tagged with `platform`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformRecord {
    Gitlab(GitlabRecord),
    Mattermost(MattermostConfig),
    Drive(DriveConfig),
    Nextcloud(NextcloudConfig),
    Other {
        platform: String,
        fields: Map<String, Value>,
    },
}

impl PlatformRecord {
    pub fn platform_name(&self) -> &str {
        match self {
            Self::Gitlab(_) => Platform::Gitlab.as_str(),
            Self::Mattermost(_) => Platform::Mattermost.as_str(),
            Self::Drive(_) => Platform::Drive.as_str(),
            Self::Nextcloud(_) => Platform::Nextcloud.as_str(),
            Self::Other { platform, .. } => platform,
        }
    }

    pub fn key(&self) -> PlatformKey {
        PlatformKey::parse(self.platform_name())
    }
}

#[derive(Serialize)]
struct Tagged<'a, T: Serialize> {
    platform: &'a str,
    #[serde(flatten)]
    fields: &'a T,
}

impl Serialize for PlatformRecord {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let platform = self.platform_name();
        match self {
            Self::Gitlab(record) => Tagged {
                platform,
                fields: record,
            }
            .serialize(serializer),
            Self::Mattermost(config) => Tagged {
                platform,
                fields: config,
            }
            .serialize(serializer),
            Self::Drive(config) => Tagged {
                platform,
                fields: config,
            }
            .serialize(serializer),
            Self::Nextcloud(config) => Tagged {
                platform,
                fields: config,
            }
            .serialize(serializer),
            Self::Other { fields, .. } if fields.contains_key("platform") => {
                let mut fields = fields.clone();
                fields.remove("platform");
                Tagged {
                    platform,
                    fields: &fields,
                }
                .serialize(serializer)
            }
            Self::Other { fields, .. } => Tagged { platform, fields }.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for PlatformRecord {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let mut fields = Map::<String, Value>::deserialize(deserializer)?;
        let platform = match fields.remove("platform") {
            Some(Value::String(name)) => name,
            Some(other) => {
                return Err(D::Error::custom(format!(
                    "platform tag must be a string, got {other}"
                )));
            }
            None => return Err(D::Error::custom("platform record is missing its `platform` tag")),
        };

        let Some(known) = Platform::parse(&platform) else {
            return Ok(Self::Other { platform, fields });
        };

        let body = Value::Object(fields);
        let record = match known {
            Platform::Gitlab => Self::Gitlab(serde_json::from_value(body).map_err(D::Error::custom)?),
            Platform::Mattermost => {
                Self::Mattermost(serde_json::from_value(body).map_err(D::Error::custom)?)
            }
            Platform::Drive => Self::Drive(serde_json::from_value(body).map_err(D::Error::custom)?),
            Platform::Nextcloud => {
                Self::Nextcloud(serde_json::from_value(body).map_err(D::Error::custom)?)
            }
        };
        Ok(record)
    }
}

fn lenient_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(String::new()),
        Some(Value::String(text)) => Ok(text),
        Some(Value::Number(number)) => Ok(number.to_string()),
        Some(Value::Bool(flag)) => Ok(flag.to_string()),
        Some(other) => Err(D::Error::custom(format!("expected text, got {other}"))),
    }
}

fn lenient_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::String(text)) => Ok(split_list(&text)),
        Some(Value::Array(items)) => Ok(items.iter().map(json_text).collect()),
        Some(other) => Err(D::Error::custom(format!("expected a list, got {other}"))),
    }
}

fn lenient_repo_ids<'de, D>(deserializer: D) -> Result<Vec<RepoAccessId>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<RepoAccessId>>::deserialize(deserializer)?.unwrap_or_default())
}
