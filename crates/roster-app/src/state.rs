// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use crate::{AppMode, FormKind};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppState {
    pub mode: AppMode,
    pub search: String,
    pub pending_delete: Option<String>,
    pub status_line: Option<String>,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            mode: AppMode::List,
            search: String::new(),
            pending_delete: None,
            status_line: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppCommand {
    OpenForm(FormKind),
    CloseForm,
    RequestDelete(String),
    CancelDelete,
    ConfirmDelete,
    SetSearch(String),
    ClearSearch,
    SetStatus(String),
    ClearStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    ModeChanged(AppMode),
    SearchChanged(String),
    DeleteConfirmed(String),
    StatusUpdated(String),
    StatusCleared,
}

impl AppState {
    pub fn dispatch(&mut self, command: AppCommand) -> Vec<AppEvent> {
        match command {
            AppCommand::OpenForm(kind) => {
                self.mode = AppMode::Form(kind);
                vec![AppEvent::ModeChanged(self.mode)]
            }
            AppCommand::CloseForm => {
                self.mode = AppMode::List;
                vec![AppEvent::ModeChanged(self.mode)]
            }
            AppCommand::RequestDelete(username) => {
                self.mode = AppMode::ConfirmDelete;
                self.pending_delete = Some(username);
                vec![AppEvent::ModeChanged(self.mode)]
            }
            AppCommand::CancelDelete => {
                self.mode = AppMode::List;
                self.pending_delete = None;
                vec![
                    AppEvent::ModeChanged(self.mode),
                    self.set_status("delete cancelled"),
                ]
            }
            AppCommand::ConfirmDelete => {
                let Some(username) = self.pending_delete.take() else {
                    return Vec::new();
                };
                self.mode = AppMode::List;
                vec![
                    AppEvent::ModeChanged(self.mode),
                    AppEvent::DeleteConfirmed(username),
                ]
            }
            AppCommand::SetSearch(query) => {
                self.search = query;
                vec![AppEvent::SearchChanged(self.search.clone())]
            }
            AppCommand::ClearSearch => {
                self.search.clear();
                vec![AppEvent::SearchChanged(String::new())]
            }
            AppCommand::SetStatus(message) => vec![self.set_status(&message)],
            AppCommand::ClearStatus => {
                self.status_line = None;
                vec![AppEvent::StatusCleared]
            }
        }
    }

    fn set_status(&mut self, message: &str) -> AppEvent {
        self.status_line = Some(message.to_owned());
        AppEvent::StatusUpdated(message.to_owned())
    }
}
