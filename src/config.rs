use std::{env, fmt::Display, net::SocketAddr, path::PathBuf, str::FromStr};

use tracing::{info, warn};

pub const DEFAULT_DATABASE_URL: &str = "sqlite:data/recipe_journal.db";
pub const DEFAULT_MEDIA_DIR: &str = "data/media";

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: SocketAddr,
    pub secure_cookies: bool,
    pub media_dir: PathBuf,
}

impl Config {
    /// Read settings from the environment (after `.env`), falling back to defaults.
    pub fn load() -> Self {
        dotenvy::dotenv().ok();

        Self {
            database_url: load_or("DATABASE_URL", DEFAULT_DATABASE_URL.to_string()),
            bind_addr: load_or("BIND_ADDR", SocketAddr::from(([0, 0, 0, 0], 3000))),
            secure_cookies: load_or("SECURE_COOKIES", false),
            media_dir: PathBuf::from(load_or("MEDIA_DIR", DEFAULT_MEDIA_DIR.to_string())),
        }
    }
}

fn load_or<T>(key: &str, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    match env::var(key) {
        Ok(raw) => parse_or(key, &raw, default),
        Err(_) => {
            info!("{key} not set, using default: {default}");
            default
        }
    }
}

fn parse_or<T>(key: &str, raw: &str, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    raw.trim().parse().unwrap_or_else(|e| {
        warn!("Invalid {key} value '{raw}': {e}, using default: {default}");
        default
    })
}
