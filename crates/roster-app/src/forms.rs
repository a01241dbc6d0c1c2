// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, bail};
use serde::Serialize;

use crate::{
    FieldValue, FormKind, PlatformConfig, PlatformConfigs, PlatformKey, PlatformRecord, User,
    default_config, denormalize, normalize,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormMode {
    Create,
    Edit { username: String },
}

impl FormMode {
    pub const fn kind(&self) -> FormKind {
        match self {
            Self::Create => FormKind::Create,
            Self::Edit { .. } => FormKind::Edit,
        }
    }
}

/// Body of a create or update request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserPayload {
    pub username: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    pub platforms: Vec<PlatformRecord>,
}

/// One create/edit session. The selected platforms are exactly the keys of
/// the config map: toggling a platform off drops its config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserForm {
    mode: FormMode,
    pub username: String,
    pub email: String,
    pub password: String,
    configs: PlatformConfigs,
}

impl UserForm {
    pub fn create() -> Self {
        Self {
            mode: FormMode::Create,
            username: String::new(),
            email: String::new(),
            password: String::new(),
            configs: PlatformConfigs::new(),
        }
    }

    pub fn edit(user: &User) -> Self {
        Self {
            mode: FormMode::Edit {
                username: user.username.clone(),
            },
            username: user.username.clone(),
            email: user.email.clone(),
            password: String::new(),
            configs: denormalize(&user.platforms),
        }
    }

    pub fn mode(&self) -> &FormMode {
        &self.mode
    }

    pub fn configs(&self) -> &PlatformConfigs {
        &self.configs
    }

    pub fn selected(&self) -> Vec<PlatformKey> {
        self.configs.keys().cloned().collect()
    }

    pub fn is_selected(&self, key: &PlatformKey) -> bool {
        self.configs.contains(key)
    }

    pub fn config(&self, key: &PlatformKey) -> Option<&PlatformConfig> {
        self.configs.get(key)
    }

    /// Selects `key`, seeding its defaults unless it is already selected.
    pub fn toggle_on(&mut self, key: PlatformKey) {
        if self.configs.contains(&key) {
            return;
        }
        self.configs.insert(default_config(&key, self.email.trim()));
    }

    pub fn toggle_off(&mut self, key: &PlatformKey) {
        self.configs.remove(key);
    }

    /// Flips the selection of `key` and reports whether it is now selected.
    pub fn toggle(&mut self, key: PlatformKey) -> bool {
        if self.configs.contains(&key) {
            self.toggle_off(&key);
            false
        } else {
            self.toggle_on(key);
            true
        }
    }

    pub fn update_field(&mut self, key: &PlatformKey, field: &str, value: FieldValue) -> Result<()> {
        let Some(config) = self.configs.get_mut(key) else {
            bail!(
                "{} is not selected -- toggle it on before editing its fields",
                key.label()
            );
        };
        config.set_field(field, value)
    }

    pub fn validate(&self) -> Result<()> {
        if self.username.trim().is_empty() {
            bail!("username is required -- enter a username and retry");
        }
        if self.email.trim().is_empty() {
            bail!("email is required -- enter an email and retry");
        }
        if self.mode == FormMode::Create && self.password.is_empty() {
            bail!("password is required for new users -- enter a password and retry");
        }
        Ok(())
    }

    /// Builds the request body. A blank password on edit is left out so the
    /// stored one is kept.
    pub fn to_payload(&self) -> Result<UserPayload> {
        self.validate()?;
        let password = match self.mode {
            FormMode::Edit { .. } if self.password.is_empty() => None,
            _ => Some(self.password.clone()),
        };
        let email = self.email.trim();
        Ok(UserPayload {
            username: self.username.trim().to_owned(),
            email: email.to_owned(),
            password,
            platforms: normalize(&self.configs, email),
        })
    }
}
