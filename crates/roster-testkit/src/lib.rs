// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow};
use roster_app::{
    DRIVE_ROLES, DriveConfig, GITLAB_ROLES, GitlabRecord, MATTERMOST_ROLES, MattermostConfig,
    NEXTCLOUD_PERMISSIONS, NextcloudConfig, Platform, PlatformRecord, RepoAccessId, User, UserId,
};
use serde_json::{Value, json};
use std::io::Read;
use std::path::PathBuf;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use time::OffsetDateTime;
use time::macros::datetime;
use tiny_http::{Header, Response, Server};

const FIRST_NAMES: [&str; 16] = [
    "avery", "jordan", "taylor", "riley", "morgan", "casey", "alex", "quinn", "parker", "drew",
    "kai", "elliot", "robin", "cameron", "hayden", "rowan",
];
const LAST_NAMES: [&str; 18] = [
    "walker", "martin", "hill", "evans", "lopez", "gray", "ward", "young", "diaz", "reed",
    "campbell", "turner", "flores", "bennett", "price", "morris", "foster", "brooks",
];
const DOMAINS: [&str; 4] = ["example.com", "corp.example", "lab.example.org", "mail.test"];
const TEAMS: [&str; 6] = ["eng", "ops", "design", "support", "research", "sales"];
const CHANNELS: [&str; 6] = [
    "town-square",
    "off-topic",
    "deploys",
    "incidents",
    "standup",
    "random",
];
const FOLDERS: [&str; 5] = ["/documents", "/shared", "/projects", "/finance", "/photos"];

/// SplitMix64 stream; the same seed always yields the same users.
#[derive(Debug, Clone)]
struct SeedRng(u64);

impl SeedRng {
    fn next(&mut self) -> u64 {
        self.0 = self.0.wrapping_add(0x9E37_79B9_7F4A_7C15);
        let mut z = self.0;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^ (z >> 31)
    }

    fn below(&mut self, n: usize) -> usize {
        match n {
            0 | 1 => 0,
            _ => (self.next() % n as u64) as usize,
        }
    }

    fn coin(&mut self) -> bool {
        self.next() >> 63 == 1
    }
}

/// Seeded generator of plausible users and platform records.
#[derive(Debug, Clone)]
pub struct UserFaker {
    rng: SeedRng,
    next_id: i64,
}

impl UserFaker {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: SeedRng(seed),
            next_id: 1,
        }
    }

    pub fn user(&mut self) -> User {
        let first = self.pick(&FIRST_NAMES);
        let last = self.pick(&LAST_NAMES);
        let domain = self.pick(&DOMAINS);
        let id = self.next_id;
        self.next_id += 1;

        let email = format!("{first}.{last}@{domain}");
        let platforms = Platform::ALL
            .into_iter()
            .filter(|_| self.rng.coin())
            .collect::<Vec<_>>()
            .into_iter()
            .map(|platform| self.platform_record(platform, &email))
            .collect();

        User {
            id: UserId::from(id),
            username: format!("{first}{last}"),
            email,
            created_at: Some(self.created_at()),
            platforms,
        }
    }

    pub fn users(&mut self, count: usize) -> Vec<User> {
        (0..count).map(|_| self.user()).collect()
    }

    pub fn platform_record(&mut self, platform: Platform, email: &str) -> PlatformRecord {
        match platform {
            Platform::Gitlab => {
                let repos = 1 + self.rng.below(3);
                PlatformRecord::Gitlab(GitlabRecord {
                    role: self.pick(&GITLAB_ROLES).to_owned(),
                    group_id: (10 + self.rng.below(90)).to_string(),
                    repo_access: (0..repos)
                        .map(|_| RepoAccessId::new(1 + self.rng.below(500) as i64))
                        .collect(),
                })
            }
            Platform::Mattermost => PlatformRecord::Mattermost(MattermostConfig {
                server_name: "chat.example.com".to_owned(),
                team: self.pick(&TEAMS).to_owned(),
                default_channels: vec![
                    "town-square".to_owned(),
                    self.pick(&CHANNELS).to_owned(),
                ],
                role: self.pick(&MATTERMOST_ROLES).to_owned(),
            }),
            Platform::Drive => PlatformRecord::Drive(DriveConfig {
                shared_folder_id: format!("folder-{}", 100 + self.rng.below(900)),
                role: self.pick(&DRIVE_ROLES).to_owned(),
                user_email: email.to_owned(),
                permission_id: format!("perm-{}", self.rng.next() % 100_000),
            }),
            Platform::Nextcloud => PlatformRecord::Nextcloud(NextcloudConfig {
                storage_limit: (256 * (1 + self.rng.below(8))).to_string(),
                shared_folder_id: self.pick(&FOLDERS).to_owned(),
                permission: self.pick(&NEXTCLOUD_PERMISSIONS).to_owned(),
            }),
        }
    }

    fn created_at(&mut self) -> OffsetDateTime {
        datetime!(2025-01-01 0:00 UTC)
            + time::Duration::days(self.rng.below(365) as i64)
            + time::Duration::minutes(self.rng.below(24 * 60) as i64)
    }

    fn pick<'a>(&mut self, items: &'a [&'a str]) -> &'a str {
        items[self.rng.below(items.len())]
    }
}

/// Wire form of the three seed users the admin backend ships with.
pub fn sample_users_json() -> Value {
    json!([
        {
            "id": 1,
            "username": "johndoe",
            "email": "johndoe@example.com",
            "created_at": "2025-07-22T10:00:00",
            "platforms": [
                {"platform": "gitlab", "role": "Developer", "group_id": "12", "repo_access": [3, 4]},
                {"platform": "mattermost", "server_name": "chat.example.com", "team": "eng", "default_channels": ["town-square"], "role": "Member"}
            ]
        },
        {
            "id": 2,
            "username": "janedoe",
            "email": "janedoe@example.com",
            "created_at": "2025-07-25T14:15:00",
            "platforms": [
                {"platform": "nextcloud", "storage_limit": "1024", "shared_folder_id": "/documents", "permission": "editor"}
            ]
        },
        {
            "id": 3,
            "username": "baeeee",
            "email": "baeeeee@gmail.com",
            "created_at": "2025-07-28T09:30:00",
            "platforms": [
                {"platform": "drive", "shared_folder_id": "folder-456", "role": "reader", "user_email": "baeeeee@gmail.com", "permission_id": "perm-1"}
            ]
        }
    ])
}

pub fn sample_users() -> Result<Vec<User>> {
    serde_json::from_value(sample_users_json()).context("decode sample users")
}

pub fn temp_config_path() -> Result<(tempfile::TempDir, PathBuf)> {
    let dir = tempfile::tempdir().context("create temp dir")?;
    let config_path = dir.path().join("config.toml");
    Ok((dir, config_path))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockResponse {
    pub status: u16,
    pub body: String,
}

impl MockResponse {
    pub fn json(status: u16, body: &Value) -> Self {
        Self {
            status,
            body: body.to_string(),
        }
    }

    pub fn empty(status: u16) -> Self {
        Self {
            status,
            body: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub method: String,
    pub url: String,
    pub body: String,
}

impl RecordedRequest {
    pub fn json_body(&self) -> Result<Value> {
        serde_json::from_str(&self.body).with_context(|| format!("decode body of {}", self.url))
    }
}

/// In-process HTTP server answering with scripted responses, one per
/// request, and recording what it received.
pub struct MockApi {
    base_url: String,
    handle: JoinHandle<Result<Vec<RecordedRequest>>>,
}

impl MockApi {
    pub fn serve(responses: Vec<MockResponse>) -> Result<Self> {
        let server =
            Server::http("127.0.0.1:0").map_err(|error| anyhow!("start mock api: {error}"))?;
        let base_url = format!("http://{}", server.server_addr());
        let handle = thread::spawn(move || serve_scripted(&server, responses));
        Ok(Self { base_url, handle })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Waits for every scripted response to be served.
    pub fn finish(self) -> Result<Vec<RecordedRequest>> {
        self.handle
            .join()
            .map_err(|_| anyhow!("mock api thread panicked"))?
    }
}

fn serve_scripted(server: &Server, responses: Vec<MockResponse>) -> Result<Vec<RecordedRequest>> {
    let mut recorded = Vec::with_capacity(responses.len());
    for scripted in responses {
        let mut request = server
            .recv_timeout(Duration::from_secs(5))
            .context("receive mock request")?
            .ok_or_else(|| anyhow!("mock api timed out waiting for request"))?;
        let mut body = String::new();
        request
            .as_reader()
            .read_to_string(&mut body)
            .context("read mock request body")?;
        recorded.push(RecordedRequest {
            method: request.method().to_string(),
            url: request.url().to_owned(),
            body,
        });

        let content_type = Header::from_bytes("Content-Type", "application/json")
            .map_err(|()| anyhow!("build content type header"))?;
        let response = Response::from_string(scripted.body)
            .with_status_code(scripted.status)
            .with_header(content_type);
        request.respond(response).context("send mock response")?;
    }
    Ok(recorded)
}
