// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

mod config;
mod runtime;

use anyhow::{Context, Result, anyhow, bail};
use config::Config;
use roster_api::Client;
use roster_app::{AppState, User, UserListSource};
use roster_tui::UiOptions;
use runtime::ApiRuntime;
use std::env;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() {
    if let Err(error) = run() {
        eprintln!("{error:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let options = parse_cli_args(env::args().skip(1), Config::default_path()?)?;
    if options.show_help {
        print_help();
        return Ok(());
    }

    if options.print_config_path {
        println!("{}", options.config_path.display());
        return Ok(());
    }

    if options.print_example {
        print!("{}", Config::example_config(&options.config_path));
        return Ok(());
    }

    let config = Config::load(&options.config_path).with_context(|| {
        format!(
            "load config {}; run `roster --print-example-config` to generate a v1 template",
            options.config_path.display()
        )
    })?;

    let log_path = config.log_file()?;
    init_logging(&config.log_level(), &log_path)?;

    let base_url = config.api_base_url();
    let client = Client::new(&base_url, config.api_timeout()?).with_context(|| {
        format!(
            "invalid [api] config in {}; fix base_url/timeout values",
            options.config_path.display()
        )
    })?;
    info!(base_url = %client.base_url(), timeout = ?client.timeout(), "starting roster");

    if options.check_only {
        let count = client
            .list_users()
            .with_context(|| format!("probe user list at {}", client.base_url()))?
            .len();
        println!("ok: {} answered with {count} users", client.base_url());
        return Ok(());
    }

    if options.list_only {
        print!("{}", fetch_user_table(&client, &log_path)?);
        return Ok(());
    }

    let mut state = AppState::default();
    let mut runtime = ApiRuntime::new(client);
    roster_tui::run_app(
        &mut state,
        &mut runtime,
        UiOptions {
            confirm_delete: config.confirm_delete(),
        },
    )
}

/// Routes `tracing` output to `log_path` so the terminal UI stays clean.
/// `RUST_LOG` takes precedence over `level`.
fn init_logging(level: &str, log_path: &Path) -> Result<()> {
    if let Some(parent) = log_path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("create log directory {}", parent.display()))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)
        .with_context(|| {
            format!(
                "open log file {} -- set log.file in the config to a writable path",
                log_path.display()
            )
        })?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(false)
        .try_init()
        .map_err(|error| anyhow!("initialize logging: {error}"))
}

fn fetch_user_table(client: &Client, log_path: &Path) -> Result<String> {
    let mut source = UserListSource::new();
    let state = source.fetch(|| client.list_users());
    if state.error {
        bail!(
            "could not load users from {} -- check api.base_url; details in {}",
            client.base_url(),
            log_path.display()
        );
    }
    Ok(format_user_table(&state.users))
}

fn format_user_table(users: &[User]) -> String {
    let rows = users
        .iter()
        .map(|user| {
            let platforms = user
                .platform_keys()
                .iter()
                .map(|key| key.as_str().to_owned())
                .collect::<Vec<_>>()
                .join(",");
            [
                user.username.clone(),
                user.email.clone(),
                if platforms.is_empty() {
                    "-".to_owned()
                } else {
                    platforms
                },
                user.created_label(),
            ]
        })
        .collect::<Vec<_>>();

    let header = ["USERNAME", "EMAIL", "PLATFORMS", "CREATED"];
    let mut widths = header.map(str::len);
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut out = String::new();
    let mut push_line = |cells: [&str; 4]| {
        let line = cells
            .iter()
            .zip(widths)
            .map(|(cell, width)| format!("{cell:<width$}"))
            .collect::<Vec<_>>()
            .join("  ");
        out.push_str(line.trim_end());
        out.push('\n');
    };
    push_line(header);
    for row in &rows {
        push_line([row[0].as_str(), row[1].as_str(), row[2].as_str(), row[3].as_str()]);
    }
    out.push_str(&format!("{} users\n", rows.len()));
    out
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CliOptions {
    config_path: PathBuf,
    print_config_path: bool,
    print_example: bool,
    check_only: bool,
    list_only: bool,
    show_help: bool,
}

fn parse_cli_args<I, S>(args: I, default_config_path: PathBuf) -> Result<CliOptions>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut options = CliOptions {
        config_path: default_config_path,
        print_config_path: false,
        print_example: false,
        check_only: false,
        list_only: false,
        show_help: false,
    };

    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        match arg.as_ref() {
            "--config" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow!("--config requires a file path"))?;
                options.config_path = PathBuf::from(value.as_ref());
            }
            "--print-config-path" => {
                options.print_config_path = true;
            }
            "--print-example-config" => {
                options.print_example = true;
            }
            "--check" => {
                options.check_only = true;
            }
            "--list" => {
                options.list_only = true;
            }
            "--help" | "-h" => {
                options.show_help = true;
            }
            unknown => {
                bail!("unknown argument {unknown:?}; run with --help to see supported options");
            }
        }
    }

    Ok(options)
}

fn print_help() {
    println!("roster: user management console");
    println!("  --config <path>          Use a specific config path");
    println!("  --print-config-path      Print resolved config path");
    println!("  --print-example-config   Print a v1 config template");
    println!("  --check                  Validate config and probe the API");
    println!("  --list                   Print the user list and exit");
    println!("  --help                   Show this help");
}
