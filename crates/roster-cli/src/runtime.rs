// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, anyhow};
use roster_api::Client;
use roster_app::{FetchTicket, User, UserPayload};
use roster_tui::InternalEvent;
use std::sync::mpsc::Sender;
use std::thread;

pub struct ApiRuntime {
    client: Client,
}

impl ApiRuntime {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

impl roster_tui::AppRuntime for ApiRuntime {
    fn list_users(&mut self) -> Result<Vec<User>> {
        self.client.list_users()
    }

    fn create_user(&mut self, payload: &UserPayload) -> Result<()> {
        self.client.create_user(payload)
    }

    fn update_user(&mut self, username: &str, payload: &UserPayload) -> Result<()> {
        self.client.update_user(username, payload)
    }

    fn delete_user(&mut self, username: &str) -> Result<()> {
        self.client.delete_user(username)
    }

    fn spawn_list_users(&mut self, ticket: FetchTicket, tx: Sender<InternalEvent>) -> Result<()> {
        let client = self.client.clone();
        thread::Builder::new()
            .name("roster-list-users".to_owned())
            .spawn(move || {
                let result = client.list_users().map_err(|error| format!("{error:#}"));
                let _ = tx.send(InternalEvent::UsersLoaded { ticket, result });
            })
            .map_err(|error| anyhow!("spawn user list fetch: {error}"))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::ApiRuntime;
    use anyhow::Result;
    use roster_api::Client;
    use roster_app::UserListSource;
    use roster_testkit::{MockApi, MockResponse, sample_users_json};
    use roster_tui::{AppRuntime, InternalEvent};
    use serde_json::json;
    use std::sync::mpsc;
    use std::time::Duration;

    fn runtime_for(api: &MockApi) -> Result<ApiRuntime> {
        Ok(ApiRuntime::new(Client::new(
            api.base_url(),
            Duration::from_secs(2),
        )?))
    }

    #[test]
    fn spawned_list_fetch_reports_users_on_channel() -> Result<()> {
        let api = MockApi::serve(vec![MockResponse::json(200, &sample_users_json())])?;
        let mut runtime = runtime_for(&api)?;
        let mut source = UserListSource::new();
        let ticket = source.begin_fetch();

        let (tx, rx) = mpsc::channel();
        runtime.spawn_list_users(ticket, tx)?;
        let event = rx.recv_timeout(Duration::from_secs(5))?;
        let InternalEvent::UsersLoaded { ticket: seen, result } = event else {
            panic!("expected a users loaded event");
        };
        assert_eq!(seen, ticket);
        assert!(source.complete(seen, result.map_err(anyhow::Error::msg)));
        assert_eq!(source.users().len(), 3);

        let requests = api.finish()?;
        assert_eq!(requests[0].url, "/api/all_users");
        Ok(())
    }

    #[test]
    fn spawned_list_fetch_carries_transport_error_text() -> Result<()> {
        let client = Client::new("http://127.0.0.1:1", Duration::from_millis(50))?;
        let mut runtime = ApiRuntime::new(client);
        let ticket = UserListSource::new().begin_fetch();

        let (tx, rx) = mpsc::channel();
        runtime.spawn_list_users(ticket, tx)?;
        let event = rx.recv_timeout(Duration::from_secs(5))?;
        let InternalEvent::UsersLoaded { result, .. } = event else {
            panic!("expected a users loaded event");
        };
        let error = result.expect_err("unreachable api should fail");
        assert!(error.contains("cannot reach http://127.0.0.1:1"));
        Ok(())
    }

    #[test]
    fn mutations_go_through_the_client() -> Result<()> {
        let api = MockApi::serve(vec![
            MockResponse::json(201, &json!({"message": "created"})),
            MockResponse::empty(204),
        ])?;
        let mut runtime = runtime_for(&api)?;
        let payload = roster_app::UserPayload {
            username: "alice".to_owned(),
            email: "a@x.com".to_owned(),
            password: Some("p".to_owned()),
            platforms: Vec::new(),
        };
        runtime.create_user(&payload)?;
        runtime.delete_user("alice")?;

        let requests = api.finish()?;
        assert_eq!(requests[0].method, "POST");
        assert_eq!(requests[0].json_body()?["platforms"], json!([]));
        assert_eq!(requests[1].method, "DELETE");
        assert_eq!(requests[1].url, "/api/users/alice");
        Ok(())
    }
}
