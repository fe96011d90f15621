use std::env;
use std::fs::File;
use std::str::FromStr;

use dotenv::dotenv;
use log::LevelFilter;
use simplelog::{ColorChoice, CombinedLogger, TermLogger, TerminalMode, WriteLogger};

use crate::{auth, chat};

pub mod db;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Clone)]
pub struct Config {
    pub log: LogConfig,
    pub mongo: db::Config,
    pub chat: chat::Config,
}

impl Config {
    /// Reads `.env` (if any) and the process environment. Sections that are
    /// not configured fall back to their defaults.
    pub fn env() -> Self {
        dotenv().ok();

        Self {
            log: LogConfig::env(),
            mongo: db::Config::env().unwrap_or_default(),
            chat: chat::Config::env().unwrap_or_default(),
        }
    }

    /// Principal the binary acts as, taken from `PRINCIPAL_UID`/`PRINCIPAL_EMAIL`.
    pub fn principal(&self) -> Result<auth::Principal> {
        let uid = env::var("PRINCIPAL_UID")?;
        let email = env::var("PRINCIPAL_EMAIL")?;
        let principal = auth::Principal::new(uid, email)?;
        Ok(principal)
    }
}

#[derive(Clone)]
pub struct LogConfig {
    level: LevelFilter,
    file: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LevelFilter::Info,
            file: String::from("service.log"),
        }
    }
}

impl LogConfig {
    pub fn env() -> Self {
        let level = env::var("RUST_LOG")
            .ok()
            .and_then(|l| LevelFilter::from_str(&l).ok())
            .unwrap_or(LevelFilter::Info);
        let file = env::var("SERVICE_NAME")
            .map(|pkg| format!("{pkg}.log"))
            .unwrap_or("service.log".into());

        Self { level, file }
    }

    /// Installs the global logger: terminal plus a log file.
    pub fn init(&self) -> Result<()> {
        CombinedLogger::init(vec![
            TermLogger::new(
                self.level,
                simplelog::Config::default(),
                TerminalMode::Mixed,
                ColorChoice::Auto,
            ),
            WriteLogger::new(
                self.level,
                simplelog::Config::default(),
                File::create(&self.file)?,
            ),
        ])?;

        Ok(())
    }
}

#[derive(thiserror::Error, Debug)]
#[error(transparent)]
pub enum Error {
    _Env(#[from] env::VarError),
    _ParseInt(#[from] std::num::ParseIntError),
    _Io(#[from] std::io::Error),
    _Logger(#[from] log::SetLoggerError),
    _Auth(#[from] auth::Error),
}
