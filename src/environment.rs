use std::sync::Arc;

use log::Logger;

use crate::auth::{TokenKeys, DEFAULT_TOKEN_TTL_SECONDS};
use crate::config::{get_flag, get_parsed_variable, get_variable};
use crate::db::Db;
use crate::host::MediaHost;

/// bcrypt's default work factor.
pub const DEFAULT_PASSWORD_COST: u32 = 10;

#[derive(Clone)]
pub struct Environment {
    pub logger: Arc<Logger>,
    pub db: Arc<dyn Db>,
    pub host: Arc<dyn MediaHost>,
    pub config: Config,
}

impl Environment {
    pub fn new(
        logger: Arc<Logger>,
        db: Arc<dyn Db>,
        host: Arc<dyn MediaHost>,
        config: Config,
    ) -> Self {
        Self {
            logger,
            db,
            host,
            config,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    /// The single path segment every API route lives under.
    pub api_path: String,
    pub tokens: TokenKeys,
    pub secure_cookies: bool,
    pub password_cost: u32,
}

impl Config {
    pub fn new(
        api_path: impl Into<String>,
        tokens: TokenKeys,
        secure_cookies: bool,
        password_cost: u32,
    ) -> Self {
        Self {
            api_path: api_path.into(),
            tokens,
            secure_cookies,
            password_cost,
        }
    }

    pub fn from_env() -> Self {
        let api_path = get_variable("BACKEND_API_PATH").trim_matches('/').to_owned();
        let ttl = get_parsed_variable("BACKEND_TOKEN_TTL_SECONDS", DEFAULT_TOKEN_TTL_SECONDS);

        Self::new(
            api_path,
            TokenKeys::new(get_variable("JWT_SECRET"), ttl),
            get_flag("BACKEND_SECURE_COOKIES", true),
            get_parsed_variable("BACKEND_PASSWORD_COST", DEFAULT_PASSWORD_COST),
        )
    }
}
