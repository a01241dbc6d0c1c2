// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::Result;
use tracing::warn;

use crate::User;

/// Identifies one list fetch. Only the most recently issued ticket may
/// replace the cached list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FetchTicket(u64);

impl FetchTicket {
    pub const fn get(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UserListState {
    pub users: Vec<User>,
    pub loading: bool,
    pub error: bool,
}

/// Cached user list with fetch sequencing. The transport lives elsewhere:
/// callers take a ticket, perform the request, and hand the outcome back.
#[derive(Debug, Default)]
pub struct UserListSource {
    state: UserListState,
    issued: u64,
    loaded: bool,
}

impl UserListSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &UserListState {
        &self.state
    }

    pub fn users(&self) -> &[User] {
        &self.state.users
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn begin_fetch(&mut self) -> FetchTicket {
        self.issued += 1;
        self.state.loading = true;
        FetchTicket(self.issued)
    }

    /// Applies a fetch outcome. Returns false when `ticket` has been
    /// superseded, in which case the state is left alone.
    pub fn complete(&mut self, ticket: FetchTicket, result: Result<Vec<User>>) -> bool {
        if ticket.0 != self.issued {
            return false;
        }
        self.state.loading = false;
        self.loaded = true;
        match result {
            Ok(users) => {
                self.state.users = users;
                self.state.error = false;
            }
            Err(error) => {
                warn!(error = %format!("{error:#}"), "user list fetch failed; showing empty list");
                self.state.users = Vec::new();
                self.state.error = true;
            }
        }
        true
    }

    /// Runs `load` unless a list has already been loaded.
    pub fn fetch<F>(&mut self, load: F) -> &UserListState
    where
        F: FnOnce() -> Result<Vec<User>>,
    {
        if !self.loaded {
            self.refetch(load);
        }
        &self.state
    }

    pub fn refetch<F>(&mut self, load: F) -> &UserListState
    where
        F: FnOnce() -> Result<Vec<User>>,
    {
        let ticket = self.begin_fetch();
        self.complete(ticket, load());
        &self.state
    }

    pub fn filtered(&self, query: &str) -> Vec<&User> {
        self.state
            .users
            .iter()
            .filter(|user| user.matches(query))
            .collect()
    }

    pub fn find(&self, username: &str) -> Option<&User> {
        self.state
            .users
            .iter()
            .find(|user| user.username == username)
    }
}
