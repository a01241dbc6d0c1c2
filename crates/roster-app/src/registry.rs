// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde_json::Map;

use crate::{
    DriveConfig, GitlabConfig, MattermostConfig, NextcloudConfig, Platform, PlatformConfig,
    PlatformKey,
};

pub const GITLAB_ROLES: [&str; 5] = ["Guest", "Reporter", "Developer", "Maintainer", "Owner"];
pub const MATTERMOST_ROLES: [&str; 2] = ["Member", "Admin"];
pub const NEXTCLOUD_PERMISSIONS: [&str; 2] = ["viewer", "editor"];
pub const DRIVE_ROLES: [&str; 3] = ["reader", "writer", "commenter"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    List,
    Choice(&'static [&'static str]),
    ReadOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub label: &'static str,
    pub kind: FieldKind,
}

const fn field(name: &'static str, label: &'static str, kind: FieldKind) -> FieldSpec {
    FieldSpec { name, label, kind }
}

const GITLAB_FIELDS: [FieldSpec; 3] = [
    field("group_id", "Group ID", FieldKind::Text),
    field("role", "Role", FieldKind::Choice(&GITLAB_ROLES)),
    field("repo_access", "Repo Access", FieldKind::List),
];

const MATTERMOST_FIELDS: [FieldSpec; 4] = [
    field("server_name", "Server Name", FieldKind::Text),
    field("team", "Team", FieldKind::Text),
    field("default_channels", "Default Channels", FieldKind::List),
    field("role", "Role", FieldKind::Choice(&MATTERMOST_ROLES)),
];

const NEXTCLOUD_FIELDS: [FieldSpec; 3] = [
    field("storage_limit", "Storage Limit (MB)", FieldKind::Text),
    field("shared_folder_id", "Shared Folder ID", FieldKind::Text),
    field(
        "permission",
        "Permission",
        FieldKind::Choice(&NEXTCLOUD_PERMISSIONS),
    ),
];

const DRIVE_FIELDS: [FieldSpec; 4] = [
    field("shared_folder_id", "Shared Folder ID", FieldKind::Text),
    field("role", "Role", FieldKind::Choice(&DRIVE_ROLES)),
    field("user_email", "User Email", FieldKind::ReadOnly),
    field("permission_id", "Permission ID", FieldKind::ReadOnly),
];

/// Ordered form fields for a platform; empty for identifiers outside the
/// known set.
pub const fn platform_fields(platform: Platform) -> &'static [FieldSpec] {
    match platform {
        Platform::Gitlab => &GITLAB_FIELDS,
        Platform::Mattermost => &MATTERMOST_FIELDS,
        Platform::Drive => &DRIVE_FIELDS,
        Platform::Nextcloud => &NEXTCLOUD_FIELDS,
    }
}

pub fn fields_for(key: &PlatformKey) -> &'static [FieldSpec] {
    key.platform().map(platform_fields).unwrap_or(&[])
}

/// Config seeded when a platform is toggled on. `email` only feeds the drive
/// share target.
pub fn default_config(key: &PlatformKey, email: &str) -> PlatformConfig {
    match key {
        PlatformKey::Known(Platform::Gitlab) => PlatformConfig::Gitlab(GitlabConfig::default()),
        PlatformKey::Known(Platform::Mattermost) => {
            PlatformConfig::Mattermost(MattermostConfig::default())
        }
        PlatformKey::Known(Platform::Drive) => PlatformConfig::Drive(DriveConfig {
            user_email: email.to_owned(),
            ..DriveConfig::default()
        }),
        PlatformKey::Known(Platform::Nextcloud) => {
            PlatformConfig::Nextcloud(NextcloudConfig::default())
        }
        PlatformKey::Other(name) => PlatformConfig::Other {
            platform: name.clone(),
            fields: Map::new(),
        },
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlatformStyle {
    pub badge: &'static str,
    pub color: (u8, u8, u8),
}

const FALLBACK_STYLE: PlatformStyle = PlatformStyle {
    badge: "?",
    color: (0x99, 0x99, 0x99),
};

pub const fn platform_style(platform: Platform) -> PlatformStyle {
    match platform {
        Platform::Gitlab => PlatformStyle {
            badge: "GL",
            color: (0xFF, 0x63, 0x47),
        },
        Platform::Mattermost => PlatformStyle {
            badge: "MM",
            color: (0x00, 0x58, 0xCC),
        },
        Platform::Drive => PlatformStyle {
            badge: "GD",
            color: (0x0F, 0x9D, 0x58),
        },
        Platform::Nextcloud => PlatformStyle {
            badge: "NC",
            color: (0x00, 0x82, 0xC9),
        },
    }
}

pub fn style_for(key: &PlatformKey) -> PlatformStyle {
    key.platform().map(platform_style).unwrap_or(FALLBACK_STYLE)
}
