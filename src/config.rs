use std::{env, fmt::Display, str::FromStr};

use tracing::{info, warn};

pub struct Config {
    pub addr: String,
    pub db_path: String,
}

impl Config {
    pub fn load() -> Self {
        Self {
            addr: try_load("DINEWARE_ADDR", "127.0.0.1:8080"),
            db_path: try_load("DINEWARE_DB", "dineware.db"),
        }
    }
}

fn try_load<T: FromStr>(key: &str, default: &str) -> T
where
    T::Err: Display,
{
    env::var(key)
        .unwrap_or_else(|_| {
            info!("{key} not set, using default: {default}");
            default.to_string()
        })
        .parse()
        .map_err(|e| {
            warn!("Invalid {key} value: {e}");
        })
        .expect("Environment misconfigured!")
}
