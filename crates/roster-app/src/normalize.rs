// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use indexmap::IndexMap;

use crate::{
    DriveConfig, GitlabConfig, GitlabRecord, PlatformConfig, PlatformKey, PlatformRecord,
    RepoAccessId,
};

/// Insertion-ordered platform configs keyed by platform. Keys are derived
/// from the stored config, so a key always matches its config's tag.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PlatformConfigs {
    entries: IndexMap<PlatformKey, PlatformConfig>,
}

impl PlatformConfigs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, key: &PlatformKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn get(&self, key: &PlatformKey) -> Option<&PlatformConfig> {
        self.entries.get(key)
    }

    pub fn get_mut(&mut self, key: &PlatformKey) -> Option<&mut PlatformConfig> {
        self.entries.get_mut(key)
    }

    /// Stores `config` under its own key. Replacing an entry keeps the
    /// entry's original position.
    pub fn insert(&mut self, config: PlatformConfig) -> Option<PlatformConfig> {
        self.entries.insert(config.key(), config)
    }

    pub fn remove(&mut self, key: &PlatformKey) -> Option<PlatformConfig> {
        self.entries.shift_remove(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &PlatformKey> {
        self.entries.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PlatformKey, &PlatformConfig)> {
        self.entries.iter()
    }
}

impl FromIterator<PlatformConfig> for PlatformConfigs {
    fn from_iter<I: IntoIterator<Item = PlatformConfig>>(iter: I) -> Self {
        let mut configs = Self::new();
        for config in iter {
            configs.insert(config);
        }
        configs
    }
}

/// Converts in-memory configs into the wire list, one record per entry in
/// insertion order. `email` fills a blank drive share target.
pub fn normalize(configs: &PlatformConfigs, email: &str) -> Vec<PlatformRecord> {
    configs
        .iter()
        .map(|(_, config)| normalize_config(config, email))
        .collect()
}

fn normalize_config(config: &PlatformConfig, email: &str) -> PlatformRecord {
    match config {
        PlatformConfig::Gitlab(gitlab) => PlatformRecord::Gitlab(GitlabRecord {
            role: gitlab.role.clone(),
            group_id: gitlab.group_id.clone(),
            repo_access: gitlab
                .repo_access
                .iter()
                .map(|entry| RepoAccessId::parse(entry))
                .collect(),
        }),
        PlatformConfig::Mattermost(mattermost) => PlatformRecord::Mattermost(mattermost.clone()),
        PlatformConfig::Drive(drive) => {
            let user_email = if drive.user_email.trim().is_empty() {
                email.to_owned()
            } else {
                drive.user_email.clone()
            };
            PlatformRecord::Drive(DriveConfig {
                user_email,
                ..drive.clone()
            })
        }
        PlatformConfig::Nextcloud(nextcloud) => PlatformRecord::Nextcloud(nextcloud.clone()),
        PlatformConfig::Other { platform, fields } => {
            let mut fields = fields.clone();
            fields.remove("platform");
            PlatformRecord::Other {
                platform: platform.clone(),
                fields,
            }
        }
    }
}

/// Converts wire records back into configs keyed by platform. A later
/// record for the same platform replaces an earlier one.
pub fn denormalize(records: &[PlatformRecord]) -> PlatformConfigs {
    records.iter().map(denormalize_record).collect()
}

fn denormalize_record(record: &PlatformRecord) -> PlatformConfig {
    match record {
        PlatformRecord::Gitlab(gitlab) => PlatformConfig::Gitlab(GitlabConfig {
            role: gitlab.role.clone(),
            group_id: gitlab.group_id.clone(),
            repo_access: gitlab
                .repo_access
                .iter()
                .map(|id| id.to_text())
                .collect(),
        }),
        PlatformRecord::Mattermost(mattermost) => PlatformConfig::Mattermost(mattermost.clone()),
        PlatformRecord::Drive(drive) => PlatformConfig::Drive(drive.clone()),
        PlatformRecord::Nextcloud(nextcloud) => PlatformConfig::Nextcloud(nextcloud.clone()),
        PlatformRecord::Other { platform, fields } => {
            let mut fields = fields.clone();
            fields.remove("platform");
            PlatformConfig::Other {
                platform: platform.clone(),
                fields,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{PlatformConfigs, denormalize, normalize};
    use crate::{
        DriveConfig, GitlabConfig, MattermostConfig, NextcloudConfig, Platform, PlatformConfig,
        PlatformKey, PlatformRecord, default_config,
    };
    use anyhow::Result;
    use serde_json::json;

    fn sample_configs() -> Vec<PlatformConfig> {
        vec![
            PlatformConfig::Gitlab(GitlabConfig {
                role: "Maintainer".to_owned(),
                group_id: "12".to_owned(),
                repo_access: vec!["3".to_owned(), "4".to_owned()],
            }),
            PlatformConfig::Mattermost(MattermostConfig {
                server_name: "chat.example.com".to_owned(),
                team: "eng".to_owned(),
                default_channels: vec!["town-square".to_owned(), "off-topic".to_owned()],
                role: "Admin".to_owned(),
            }),
            PlatformConfig::Drive(DriveConfig {
                shared_folder_id: "1D_c5qz8".to_owned(),
                role: "writer".to_owned(),
                user_email: "a@x.com".to_owned(),
                permission_id: "perm-9".to_owned(),
            }),
            PlatformConfig::Nextcloud(NextcloudConfig {
                storage_limit: "512".to_owned(),
                shared_folder_id: "/documents".to_owned(),
                permission: "editor".to_owned(),
            }),
        ]
    }

    #[test]
    fn round_trip_preserves_every_supported_platform() -> Result<()> {
        for config in sample_configs() {
            let configs = PlatformConfigs::from_iter([config.clone()]);
            let wire = serde_json::to_string(&normalize(&configs, "a@x.com"))?;
            let decoded: Vec<PlatformRecord> = serde_json::from_str(&wire)?;
            assert_eq!(denormalize(&decoded), configs);
        }
        Ok(())
    }

    #[test]
    fn round_trip_applies_repo_access_coercion() {
        let configs = PlatformConfigs::from_iter([PlatformConfig::Gitlab(GitlabConfig {
            role: "Developer".to_owned(),
            group_id: "42".to_owned(),
            repo_access: vec!["07".to_owned(), "web".to_owned()],
        })]);

        let restored = denormalize(&normalize(&configs, "a@x.com"));
        assert_eq!(
            restored.get(&Platform::Gitlab.into()),
            Some(&PlatformConfig::Gitlab(GitlabConfig {
                role: "Developer".to_owned(),
                group_id: "42".to_owned(),
                repo_access: vec!["7".to_owned(), String::new()],
            }))
        );
    }

    #[test]
    fn normalize_stamps_tag_for_every_entry() -> Result<()> {
        let mut configs = PlatformConfigs::from_iter(sample_configs());
        let mut stray = serde_json::Map::new();
        stray.insert("platform".to_owned(), json!("gitlab"));
        stray.insert("workspace".to_owned(), json!("acme"));
        configs.insert(PlatformConfig::Other {
            platform: "slack".to_owned(),
            fields: stray,
        });

        let records = normalize(&configs, "a@x.com");
        assert_eq!(records.len(), configs.len());
        for ((key, _), record) in configs.iter().zip(&records) {
            let encoded = serde_json::to_value(record)?;
            assert_eq!(encoded["platform"], json!(key.as_str()));
        }
        assert_eq!(
            serde_json::to_value(&records[4])?,
            json!({"platform": "slack", "workspace": "acme"})
        );
        Ok(())
    }

    #[test]
    fn normalize_follows_insertion_order() {
        let configs = PlatformConfigs::from_iter([
            default_config(&Platform::Nextcloud.into(), ""),
            default_config(&Platform::Gitlab.into(), ""),
            default_config(&Platform::Drive.into(), ""),
        ]);
        let order = normalize(&configs, "a@x.com")
            .iter()
            .map(|record| record.platform_name().to_owned())
            .collect::<Vec<_>>();
        assert_eq!(order, vec!["nextcloud", "gitlab", "drive"]);
    }

    #[test]
    fn normalize_keeps_empty_configs() -> Result<()> {
        let configs = PlatformConfigs::from_iter([default_config(
            &PlatformKey::Other("slack".to_owned()),
            "",
        )]);
        let records = normalize(&configs, "a@x.com");
        assert_eq!(serde_json::to_value(&records)?, json!([{"platform": "slack"}]));
        Ok(())
    }

    #[test]
    fn normalize_fills_blank_drive_share_target() {
        let configs = PlatformConfigs::from_iter([default_config(&Platform::Drive.into(), "")]);
        let records = normalize(&configs, "ops@x.com");
        let PlatformRecord::Drive(drive) = &records[0] else {
            panic!("expected drive record");
        };
        assert_eq!(drive.user_email, "ops@x.com");
    }

    #[test]
    fn denormalize_last_record_wins() -> Result<()> {
        let records: Vec<PlatformRecord> = serde_json::from_value(json!([
            {"platform": "gitlab", "role": "Guest"},
            {"platform": "mattermost", "team": "eng"},
            {"platform": "gitlab", "role": "Owner"}
        ]))?;

        let configs = denormalize(&records);
        assert_eq!(configs.len(), 2);
        let Some(PlatformConfig::Gitlab(gitlab)) = configs.get(&Platform::Gitlab.into()) else {
            panic!("expected gitlab config");
        };
        assert_eq!(gitlab.role, "Owner");
        assert_eq!(
            configs.keys().cloned().collect::<Vec<_>>(),
            vec![
                PlatformKey::from(Platform::Gitlab),
                PlatformKey::from(Platform::Mattermost)
            ]
        );
        Ok(())
    }

    #[test]
    fn denormalize_empty_list_is_empty() {
        let configs = denormalize(&[]);
        assert!(configs.is_empty());
        assert_eq!(configs.keys().count(), 0);
    }

    #[test]
    fn remove_keeps_remaining_order() {
        let mut configs = PlatformConfigs::from_iter(sample_configs());
        configs.remove(&Platform::Mattermost.into());
        assert_eq!(
            configs.keys().cloned().collect::<Vec<_>>(),
            vec![
                PlatformKey::from(Platform::Gitlab),
                PlatformKey::from(Platform::Drive),
                PlatformKey::from(Platform::Nextcloud)
            ]
        );
    }
}
