// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

mod config;

use anyhow::{Context, Result, anyhow, bail};
use config::Config;
use orderdesk_api::Client;
use orderdesk_app::{AppState, Codec, Session};
use orderdesk_testkit::MemorySource;
use orderdesk_tui::SourceRuntime;
use std::env;
use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::info;
use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "ORDERDESK_LOG";
const PASSWORD_ENV: &str = "ORDERDESK_PASSWORD";
const DEMO_SEED: u64 = 7;
const DEMO_EXTRA_ORDERS: usize = 24;

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
            "load config {}; run `orderdesk --print-example-config` to generate a template",
            options.config_path.display()
        )
    })?;
    init_logging(&config)?;

    let codec = if config.utc() {
        Codec::UTC
    } else {
        Codec::local()
    };
    let mut state = AppState {
        show_archived: config.show_archived(),
        ..AppState::default()
    };

    if options.demo {
        if options.check_only {
            return Ok(());
        }
        info!("starting with in-memory demo data");
        let mut runtime =
            SourceRuntime::new(MemorySource::demo(DEMO_SEED, DEMO_EXTRA_ORDERS), codec);
        return orderdesk_tui::run_app(&mut state, &mut runtime);
    }

    let base_url = config.base_url()?;
    let client = Client::new(base_url.as_str(), config.timeout()?).with_context(|| {
        format!(
            "invalid [api] config in {}; fix base_url/timeout values",
            options.config_path.display()
        )
    })?;
    let login = open_session(&client, &config)?;

    if options.check_only {
        let order_types = client.check(&login.session)?;
        println!(
            "ok: {} reachable, {order_types} order types visible",
            client.base_url()
        );
        return login.close(&client);
    }

    info!(base_url = %client.base_url(), "starting against backend");
    let mut runtime = SourceRuntime::new(client.source(&login.session), codec);
    let result = orderdesk_tui::run_app(&mut state, &mut runtime);
    drop(runtime);
    let closed = login.close(&client);
    result.and(closed)
}

/// A session plus whether this process opened it and must sign it out.
struct Login {
    session: Session,
    owned: bool,
}

impl Login {
    fn close(self, client: &Client) -> Result<()> {
        if self.owned {
            client.sign_out(self.session)?;
        }
        Ok(())
    }
}

fn open_session(client: &Client, config: &Config) -> Result<Login> {
    if let Some(token) = config.token() {
        return Ok(Login {
            session: Session::from_token(token)?,
            owned: false,
        });
    }

    let Some(email) = config.email() else {
        bail!(
            "no API credentials; set ORDERDESK_API_TOKEN, [api].token, or [api].email with {PASSWORD_ENV}, or run with --demo"
        );
    };
    let password = env::var(PASSWORD_ENV)
        .map_err(|_| anyhow!("[api].email is set but {PASSWORD_ENV} is not; export it and retry"))?;
    let session = client
        .sign_in(email, &password)
        .with_context(|| format!("sign in as {email}"))?;
    Ok(Login {
        session,
        owned: true,
    })
}

fn init_logging(config: &Config) -> Result<()> {
    let filter = match EnvFilter::try_from_env(LOG_ENV) {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(config.log_filter())
            .with_context(|| format!("parse [log].filter {:?}", config.log_filter()))?,
    };

    let path = config.log_path()?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create log directory {}", parent.display()))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| {
            format!(
                "open log file {} -- set [log].file to a writable path",
                path.display()
            )
        })?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .try_init()
        .map_err(|error| anyhow!("initialize logging: {error}"))
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CliOptions {
    config_path: PathBuf,
    print_config_path: bool,
    demo: bool,
    print_example: bool,
    check_only: bool,
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
        demo: false,
        print_example: false,
        check_only: false,
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
            "--demo" => {
                options.demo = true;
            }
            "--check" => {
                options.check_only = true;
            }
            "--help" | "-h" => {
                options.show_help = true;
            }
            unknown => {
                return Err(anyhow!(
                    "unknown argument {unknown:?}; run with --help to see supported options"
                ));
            }
        }
    }

    Ok(options)
}

fn print_help() {
    println!("orderdesk");
    println!("  --config <path>          Use a specific config path");
    println!("  --print-config-path      Print resolved config path");
    println!("  --print-example-config   Print a config template");
    println!("  --demo                   Launch with generated demo orders (in-memory)");
    println!("  --check                  Validate config and reach the backend, then exit");
    println!("  --help                   Show this help");
}
