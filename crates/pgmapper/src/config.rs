//! Connection configuration.

use crate::error::{OrmError, OrmResult};
use std::time::Duration;

/// Environment variable read by [`ConnectConfig::from_env`].
pub const DATABASE_URL_ENV: &str = "DATABASE_URL";

/// Parameters for opening a [`PgConnection`](crate::PgConnection).
///
/// # Example
///
/// ```ignore
/// let config = ConnectConfig::new("localhost", "blog")
///     .user("postgres")
///     .password("secret");
/// let conn = PgConnection::connect(&config).await?;
/// ```
#[derive(Clone)]
pub struct ConnectConfig {
    pub host: String,
    pub port: u16,
    pub user: Option<String>,
    pub password: Option<String>,
    pub dbname: String,
    pub application_name: Option<String>,
    pub connect_timeout: Option<Duration>,
    url: Option<String>,
}

impl std::fmt::Debug for ConnectConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("dbname", &self.dbname)
            .field("application_name", &self.application_name)
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}

impl ConnectConfig {
    /// Create a configuration for `dbname` on `host` (port 5432).
    pub fn new(host: impl Into<String>, dbname: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: 5432,
            user: None,
            password: None,
            dbname: dbname.into(),
            application_name: None,
            connect_timeout: None,
            url: None,
        }
    }

    /// Use a `postgres://` URL or key/value connection string as-is.
    ///
    /// The string is validated here so a malformed URL fails before connecting.
    pub fn from_url(url: impl Into<String>) -> OrmResult<Self> {
        let url = url.into();
        url.parse::<tokio_postgres::Config>()
            .map_err(|e| OrmError::Connection(e.to_string()))?;
        let mut config = Self::new("", "");
        config.url = Some(url);
        Ok(config)
    }

    /// Read the connection string from `DATABASE_URL`.
    pub fn from_env() -> OrmResult<Self> {
        let url = std::env::var(DATABASE_URL_ENV)
            .map_err(|_| OrmError::Connection(format!("{DATABASE_URL_ENV} is not set")))?;
        Self::from_url(url)
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn application_name(mut self, name: impl Into<String>) -> Self {
        self.application_name = Some(name.into());
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Build the driver configuration.
    ///
    /// Explicit setters win over values parsed from a URL.
    pub fn to_pg_config(&self) -> OrmResult<tokio_postgres::Config> {
        let mut pg = match &self.url {
            Some(url) => url
                .parse::<tokio_postgres::Config>()
                .map_err(|e| OrmError::Connection(e.to_string()))?,
            None => {
                let mut pg = tokio_postgres::Config::new();
                pg.host(&self.host).port(self.port).dbname(&self.dbname);
                pg
            }
        };
        if let Some(user) = &self.user {
            pg.user(user);
        }
        if let Some(password) = &self.password {
            pg.password(password);
        }
        if let Some(name) = &self.application_name {
            pg.application_name(name);
        }
        if let Some(timeout) = self.connect_timeout {
            pg.connect_timeout(timeout);
        }
        Ok(pg)
    }
}
