//! Application configuration management.
//!
//! Configuration is loaded once at startup and passed into the router as part of
//! [`crate::AppState`]; handlers never read the environment themselves.
//!
//! ## Loading Priority
//!
//! Sources are merged in the following order (later sources override earlier ones):
//!
//! 1. **Defaults** - see the `Default` implementations below
//! 2. **YAML config file** - optional, default `config.yaml`
//! 3. **Plain environment variables** - the names the relay has always used:
//!    `PORT`, `PIC_API_KEY`, `MAILEROO_API_KEY`, `MAIL_FROM_ADDRESS`, `MAIL_FROM_NAME`,
//!    `MAIL_USER` and `MAIL_PASS`
//! 4. **Prefixed environment variables** - `FORMRELAY_` prefix, double underscores for
//!    nesting, e.g. `FORMRELAY_UPLOAD__MAX_FILE_SIZE=5242880`
//!
//! ## Usage
//!
//! ```no_run
//! use clap::Parser;
//! use formrelay::config::{Args, Config};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let args = Args::parse();
//! let config = Config::load(&args)?;
//!
//! println!("Relay will bind to {}", config.bind_address());
//! # Ok(())
//! # }
//! ```

use clap::Parser;
use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};
use url::Url;

use crate::errors::Error;

/// Default limit for a single uploaded file.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Plain environment variables and the config keys they populate.
const LEGACY_ENV_KEYS: &[(&str, &str)] = &[
    ("PORT", "port"),
    ("PIC_API_KEY", "upload.api_key"),
    ("MAILEROO_API_KEY", "maileroo.api_key"),
    ("MAIL_FROM_ADDRESS", "maileroo.from_address"),
    ("MAIL_FROM_NAME", "maileroo.from_name"),
    ("MAIL_USER", "smtp.username"),
    ("MAIL_PASS", "smtp.password"),
];

/// Simple CLI args - just for specifying config file
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short = 'f', long, env = "FORMRELAY_CONFIG", default_value = "config.yaml")]
    pub config: String,

    /// Validate configuration and exit without starting the server.
    #[arg(long)]
    pub validate: bool,
}

/// Main application configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// HTTP server host to bind to
    pub host: String,
    /// HTTP server port to bind to
    pub port: u16,
    /// Also mount the un-namespaced `/upload` and `/send-mail` routes
    pub legacy_routes: bool,
    /// Serve the HTML pages from this directory instead of the copy embedded in the binary
    pub static_dir: Option<PathBuf>,
    /// Log output format
    pub log_format: LogFormat,
    /// Image host upload relay
    pub upload: UploadConfig,
    /// Transactional mail API relay
    pub maileroo: MailerooConfig,
    /// Direct SMTP relay
    pub smtp: SmtpConfig,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Image host (pic.in.th) configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct UploadConfig {
    /// Upload API endpoint
    pub endpoint: Url,
    /// API key, sent as the `key` form field when present
    pub api_key: Option<String>,
    /// Maximum accepted file size in bytes
    pub max_file_size: u64,
    /// Timeout for the whole upstream request
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
}

/// Maileroo email API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct MailerooConfig {
    /// Send endpoint
    pub endpoint: Url,
    /// Bearer token; required when the route is used
    pub api_key: Option<String>,
    /// Sender address; required when the route is used
    pub from_address: Option<String>,
    /// Sender display name
    pub from_name: String,
    /// Ask Maileroo to track opens and clicks
    pub tracking: bool,
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
}

/// How the legacy relay delivers mail.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SmtpTransportKind {
    /// Deliver through an SMTP server
    #[default]
    Smtp,
    /// Write `.eml` files to `file_path` (for development/testing)
    File,
}

/// Connection security for the SMTP transport.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SmtpTls {
    /// Implicit TLS from the first byte (port 465)
    #[default]
    Wrapper,
    /// Upgrade a plaintext connection with STARTTLS (port 587)
    Starttls,
    /// No encryption at all; local development only
    None,
}

/// Direct SMTP configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct SmtpConfig {
    pub transport: SmtpTransportKind,
    /// SMTP server hostname
    pub host: String,
    /// SMTP server port
    pub port: u16,
    pub tls: SmtpTls,
    /// SMTP authentication username, also the default sender address
    pub username: Option<String>,
    /// SMTP authentication password
    pub password: Option<String>,
    /// Sender address override
    pub from_email: Option<String>,
    /// Sender display name
    pub from_name: String,
    /// Directory for the file transport
    pub file_path: PathBuf,
    /// Timeout for each SMTP command
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl SmtpConfig {
    /// The sender address: `from_email`, falling back to the login.
    pub fn sender_address(&self) -> Option<&str> {
        self.from_email
            .as_deref()
            .or(self.username.as_deref())
            .filter(|address| !address.trim().is_empty())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            legacy_routes: true,
            static_dir: None,
            log_format: LogFormat::default(),
            upload: UploadConfig::default(),
            maileroo: MailerooConfig::default(),
            smtp: SmtpConfig::default(),
        }
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            endpoint: Url::parse("https://pic.in.th/api/1/upload").expect("valid default upload endpoint"),
            api_key: None,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl Default for MailerooConfig {
    fn default() -> Self {
        Self {
            endpoint: Url::parse("https://smtp.maileroo.com/api/v2/emails").expect("valid default maileroo endpoint"),
            api_key: None,
            from_address: None,
            from_name: "My-Web".to_string(),
            tracking: true,
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            transport: SmtpTransportKind::default(),
            host: "smtp.gmail.com".to_string(),
            port: 465,
            tls: SmtpTls::default(),
            username: None,
            password: None,
            from_email: None,
            from_name: "My-Web".to_string(),
            file_path: PathBuf::from("./emails"),
            timeout: Duration::from_secs(30),
        }
    }
}

impl Config {
    #[allow(clippy::result_large_err)]
    pub fn load(args: &Args) -> Result<Self, figment::Error> {
        let config: Self = Self::figment(args).extract()?;
        config.validate().map_err(|e| figment::Error::from(e.to_string()))?;
        Ok(config)
    }

    pub fn figment(args: &Args) -> Figment {
        let legacy = Env::raw()
            .only(&LEGACY_ENV_KEYS.iter().map(|(var, _)| *var).collect::<Vec<_>>())
            .map(|var| {
                LEGACY_ENV_KEYS
                    .iter()
                    .find(|(name, _)| var.as_str().eq_ignore_ascii_case(name))
                    .map(|(_, key)| (*key).into())
                    .unwrap_or_else(|| var.into())
            });

        Figment::new()
            .merge(Yaml::file(&args.config))
            .merge(legacy)
            .merge(Env::prefixed("FORMRELAY_").ignore(&["CONFIG"]).split("__"))
    }

    /// Validate the configuration for consistency
    pub fn validate(&self) -> Result<(), Error> {
        if self.upload.max_file_size == 0 {
            return Err(Error::Configuration {
                setting: "upload.max_file_size",
                message: "Config validation: upload.max_file_size must be greater than 0".to_string(),
            });
        }

        for (setting, timeout) in [
            ("upload.request_timeout", self.upload.request_timeout),
            ("maileroo.request_timeout", self.maileroo.request_timeout),
            ("smtp.timeout", self.smtp.timeout),
        ] {
            if timeout.is_zero() {
                return Err(Error::Configuration {
                    setting,
                    message: format!("Config validation: {setting} must be greater than 0"),
                });
            }
        }

        if self.smtp.transport == SmtpTransportKind::Smtp && self.smtp.host.trim().is_empty() {
            return Err(Error::Configuration {
                setting: "smtp.host",
                message: "Config validation: smtp.host cannot be empty when smtp.transport is smtp".to_string(),
            });
        }

        Ok(())
    }

    /// Log a warning for each upstream credential that is missing.
    ///
    /// Missing credentials never stop the server; the affected route reports the problem
    /// when it is called.
    pub fn warn_missing_credentials(&self) {
        if is_blank(&self.upload.api_key) {
            tracing::warn!("PIC_API_KEY not set, uploads will be sent to the image host without a key");
        }
        if is_blank(&self.maileroo.api_key) {
            tracing::warn!("MAILEROO_API_KEY not set, /api/send-mail-maileroo will fail until it is configured");
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().is_none_or(|v| v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    fn args(path: &str) -> Args {
        Args {
            config: path.to_string(),
            validate: false,
        }
    }

    #[test]
    fn test_defaults_without_config_file() {
        Jail::expect_with(|_jail| {
            let config = Config::load(&args("missing.yaml"))?;

            assert_eq!(config.port, 3000);
            assert!(config.legacy_routes);
            assert_eq!(config.upload.endpoint.as_str(), "https://pic.in.th/api/1/upload");
            assert_eq!(config.upload.max_file_size, 10 * 1024 * 1024);
            assert_eq!(config.maileroo.endpoint.as_str(), "https://smtp.maileroo.com/api/v2/emails");
            assert_eq!(config.maileroo.from_name, "My-Web");
            assert!(config.maileroo.tracking);
            assert_eq!(config.smtp.host, "smtp.gmail.com");
            assert_eq!(config.smtp.port, 465);
            assert_eq!(config.smtp.tls, SmtpTls::Wrapper);
            assert!(config.upload.api_key.is_none());

            Ok(())
        });
    }

    #[test]
    fn test_yaml_file() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "relay.yaml",
                r#"
port: 8080
legacy_routes: false
log_format: json
upload:
  api_key: pic-key
  max_file_size: 1024
  request_timeout: 5s
maileroo:
  from_address: no-reply@example.org
smtp:
  transport: file
  file_path: /tmp/mails
"#,
            )?;

            let config = Config::load(&args("relay.yaml"))?;

            assert_eq!(config.port, 8080);
            assert!(!config.legacy_routes);
            assert_eq!(config.log_format, LogFormat::Json);
            assert_eq!(config.upload.api_key.as_deref(), Some("pic-key"));
            assert_eq!(config.upload.max_file_size, 1024);
            assert_eq!(config.upload.request_timeout, Duration::from_secs(5));
            assert_eq!(config.maileroo.from_address.as_deref(), Some("no-reply@example.org"));
            assert_eq!(config.smtp.transport, SmtpTransportKind::File);
            assert_eq!(config.smtp.file_path, PathBuf::from("/tmp/mails"));
            // untouched sections keep their defaults
            assert_eq!(config.smtp.host, "smtp.gmail.com");

            Ok(())
        });
    }

    #[test]
    fn test_plain_environment_variables() {
        Jail::expect_with(|jail| {
            jail.set_env("PORT", "4000");
            jail.set_env("PIC_API_KEY", "pic-secret");
            jail.set_env("MAILEROO_API_KEY", "maileroo-secret");
            jail.set_env("MAIL_FROM_ADDRESS", "no-reply@relay.test");
            jail.set_env("MAIL_FROM_NAME", "Relay");
            jail.set_env("MAIL_USER", "someone@gmail.com");
            jail.set_env("MAIL_PASS", "app-password");

            let config = Config::load(&args("config.yaml"))?;

            assert_eq!(config.port, 4000);
            assert_eq!(config.upload.api_key.as_deref(), Some("pic-secret"));
            assert_eq!(config.maileroo.api_key.as_deref(), Some("maileroo-secret"));
            assert_eq!(config.maileroo.from_address.as_deref(), Some("no-reply@relay.test"));
            assert_eq!(config.maileroo.from_name, "Relay");
            assert_eq!(config.smtp.username.as_deref(), Some("someone@gmail.com"));
            assert_eq!(config.smtp.password.as_deref(), Some("app-password"));
            assert_eq!(config.smtp.sender_address(), Some("someone@gmail.com"));

            Ok(())
        });
    }

    #[test]
    fn test_prefixed_env_overrides_plain_env_and_yaml() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "config.yaml",
                r#"
host: 127.0.0.1
upload:
  api_key: from-yaml
"#,
            )?;
            jail.set_env("PIC_API_KEY", "from-plain-env");
            jail.set_env("FORMRELAY_UPLOAD__API_KEY", "from-prefixed-env");
            jail.set_env("FORMRELAY_SMTP__TLS", "starttls");

            let config = Config::load(&args("config.yaml"))?;

            assert_eq!(config.host, "127.0.0.1");
            assert_eq!(config.upload.api_key.as_deref(), Some("from-prefixed-env"));
            assert_eq!(config.smtp.tls, SmtpTls::Starttls);

            Ok(())
        });
    }

    #[test]
    fn test_rejects_zero_smtp_timeout() {
        Jail::expect_with(|jail| {
            jail.create_file("config.yaml", "smtp:\n  timeout: 0s\n")?;

            let err = Config::load(&args("config.yaml")).unwrap_err();
            assert!(err.to_string().contains("smtp.timeout"), "{err}");

            Ok(())
        });
    }

    #[test]
    fn test_rejects_zero_http_timeout_from_env() {
        Jail::expect_with(|jail| {
            jail.set_env("FORMRELAY_MAILEROO__REQUEST_TIMEOUT", "0s");

            let err = Config::load(&args("missing.yaml")).unwrap_err();
            assert!(err.to_string().contains("maileroo.request_timeout"), "{err}");

            Ok(())
        });
    }

    #[test]
    fn test_rejects_zero_file_size() {
        Jail::expect_with(|jail| {
            jail.create_file("config.yaml", "upload:\n  max_file_size: 0\n")?;

            let err = Config::load(&args("config.yaml")).unwrap_err();
            assert!(err.to_string().contains("max_file_size"));

            Ok(())
        });
    }

    #[test]
    fn test_rejects_unknown_fields() {
        Jail::expect_with(|jail| {
            jail.create_file("config.yaml", "uplaod:\n  api_key: typo\n")?;

            assert!(Config::load(&args("config.yaml")).is_err());

            Ok(())
        });
    }

    #[test]
    fn test_sender_address_prefers_from_email() {
        let smtp = SmtpConfig {
            username: Some("login@gmail.com".to_string()),
            from_email: Some("sender@example.com".to_string()),
            ..Default::default()
        };
        assert_eq!(smtp.sender_address(), Some("sender@example.com"));

        let smtp = SmtpConfig {
            username: Some("  ".to_string()),
            ..Default::default()
        };
        assert_eq!(smtp.sender_address(), None);
    }
}
