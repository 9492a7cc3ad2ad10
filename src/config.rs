//! Command-line and environment configuration.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Parser;

/// Snippetbox web server.
#[derive(Parser, Debug, Clone)]
#[command(name = "snippetbox")]
#[command(about = "Share short text snippets", long_about = None)]
pub struct Config {
    /// HTTP listen address. A leading ':' listens on all interfaces.
    #[arg(long, env = "SNIPPETBOX_ADDR", default_value = ":4000")]
    pub addr: String,

    /// SQLite data source name.
    #[arg(long, env = "SNIPPETBOX_DSN", default_value = "sqlite:snippetbox.db")]
    pub dsn: String,

    /// Directory served under /static.
    #[arg(long, env = "SNIPPETBOX_STATIC_DIR", default_value = "./ui/static")]
    pub static_dir: PathBuf,

    /// Absolute session lifetime.
    #[arg(long, env = "SNIPPETBOX_SESSION_LIFETIME_HOURS", default_value_t = 12)]
    pub session_lifetime_hours: i64,

    /// Mark session and CSRF cookies Secure. Defaults to on when serving TLS.
    #[arg(long, env = "SNIPPETBOX_SECURE_COOKIES", action = clap::ArgAction::Set)]
    pub secure_cookies: Option<bool>,

    /// PEM certificate chain; serving HTTPS needs this and --tls-key.
    #[arg(long, env = "SNIPPETBOX_TLS_CERT", requires = "tls_key")]
    pub tls_cert: Option<PathBuf>,

    /// PEM private key matching --tls-cert.
    #[arg(long, env = "SNIPPETBOX_TLS_KEY", requires = "tls_cert")]
    pub tls_key: Option<PathBuf>,
}

impl Config {
    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        let addr = if self.addr.starts_with(':') {
            format!("0.0.0.0{}", self.addr)
        } else {
            self.addr.clone()
        };

        addr.parse()
            .with_context(|| format!("invalid listen address {:?}", self.addr))
    }

    /// Certificate and key paths when HTTPS is configured.
    pub fn tls_files(&self) -> Option<(&Path, &Path)> {
        match (&self.tls_cert, &self.tls_key) {
            (Some(cert), Some(key)) => Some((cert.as_path(), key.as_path())),
            _ => None,
        }
    }

    pub fn cookies_secure(&self) -> bool {
        self.secure_cookies.unwrap_or(self.tls_files().is_some())
    }
}
