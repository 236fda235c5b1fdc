use dotenv::dotenv;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

/// Upper bound for token lifetimes: ten years.
pub const MAX_TOKEN_HOURS: i64 = 24 * 365 * 10;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone)]
pub struct CloudinaryConfig {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
    /// Root folder; program images land in `<root>/programs`.
    pub upload_folder: String,
}

impl CloudinaryConfig {
    pub fn programs_folder(&self) -> String {
        format!("{}/programs", self.upload_folder.trim_end_matches('/'))
    }
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    /// Recipient of customer leads.
    pub ceo_email: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub env: String,
    pub database: DatabaseConfig,
    pub jwt_secret: String,
    pub jwt_expiry_hours: i64,
    pub jwt_refresh_expiry_hours: i64,
    pub cloudinary: CloudinaryConfig,
    pub smtp: SmtpConfig,
    pub paystack_secret_key: String,
    pub template_dir: PathBuf,
    pub schema_dir: PathBuf,
}

/// Credentials for the first admin account.
#[derive(Debug, Clone)]
pub struct AdminSeed {
    pub email: String,
    pub password: String,
    pub full_name: String,
}

// Blank values count as unset
struct Vars<F>(F);

impl<F: Fn(&str) -> Option<String>> Vars<F> {
    fn optional(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|value| !value.trim().is_empty())
    }

    fn required(&self, key: &'static str) -> Result<String, ConfigError> {
        self.optional(key).ok_or(ConfigError::Missing(key))
    }

    fn or(&self, key: &str, default: &str) -> String {
        self.optional(key).unwrap_or_else(|| default.to_string())
    }

    fn parsed<T: FromStr>(&self, key: &'static str, default: T) -> Result<T, ConfigError> {
        match self.optional(key) {
            Some(value) => value
                .trim()
                .parse()
                .map_err(|_| ConfigError::Invalid { key, value }),
            None => Ok(default),
        }
    }

    fn hours(&self, key: &'static str, default: i64) -> Result<i64, ConfigError> {
        let hours = self.parsed(key, default)?;
        if (1..=MAX_TOKEN_HOURS).contains(&hours) {
            Ok(hours)
        } else {
            Err(ConfigError::Invalid {
                key,
                value: hours.to_string(),
            })
        }
    }
}

impl DatabaseConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Prefers `DATABASE_URL`; otherwise builds one from the `DB_*` parts.
    pub fn from_lookup<F: Fn(&str) -> Option<String>>(lookup: F) -> Result<Self, ConfigError> {
        let vars = Vars(lookup);
        let url = match vars.optional("DATABASE_URL") {
            Some(url) => url,
            None => format!(
                "postgres://{}:{}@{}:{}/{}?sslmode={}",
                vars.or("DB_USER", "postgres"),
                vars.or("DB_PASSWORD", ""),
                vars.or("DB_HOST", "localhost"),
                vars.parsed::<u16>("DB_PORT", 5432)?,
                vars.or("DB_NAME", "plantbased_db"),
                vars.or("DB_SSLMODE", "disable"),
            ),
        };
        Ok(Self {
            url,
            max_connections: vars.parsed("DB_MAX_CONNECTIONS", 10)?,
        })
    }
}

impl AdminSeed {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F: Fn(&str) -> Option<String>>(lookup: F) -> Result<Self, ConfigError> {
        let vars = Vars(lookup);
        Ok(Self {
            email: vars.or("ADMIN_EMAIL", "admin@plantbased.com"),
            password: vars.required("ADMIN_PASSWORD")?,
            full_name: vars.or("ADMIN_FULL_NAME", "System Administrator"),
        })
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F: Fn(&str) -> Option<String>>(lookup: F) -> Result<Self, ConfigError> {
        let database = DatabaseConfig::from_lookup(&lookup)?;
        let vars = Vars(lookup);

        Ok(Self {
            host: vars.or("HOST", "127.0.0.1"),
            port: vars.parsed("PORT", 8080)?,
            env: vars.or("ENV", "development"),
            database,
            jwt_secret: vars.required("JWT_SECRET")?,
            jwt_expiry_hours: vars.hours("JWT_EXPIRY_HOURS", 24)?,
            jwt_refresh_expiry_hours: vars.hours("JWT_REFRESH_EXPIRY_HOURS", 168)?,
            cloudinary: CloudinaryConfig {
                cloud_name: vars.required("CLOUDINARY_CLOUD_NAME")?,
                api_key: vars.required("CLOUDINARY_API_KEY")?,
                api_secret: vars.required("CLOUDINARY_API_SECRET")?,
                upload_folder: vars.or("CLOUDINARY_UPLOAD_FOLDER", "plantbased"),
            },
            smtp: SmtpConfig {
                host: vars.or("SMTP_HOST", "smtp.gmail.com"),
                port: vars.parsed("SMTP_PORT", 587)?,
                username: vars.required("SMTP_EMAIL")?,
                password: vars.required("SMTP_PASSWORD")?,
                ceo_email: vars.required("CEO_EMAIL")?,
            },
            paystack_secret_key: vars.required("PAYSTACK_SECRET_KEY")?,
            template_dir: PathBuf::from(vars.or("TEMPLATE_DIR", "templates")),
            schema_dir: PathBuf::from(vars.or("SCHEMA_DIR", "schema")),
        })
    }

    pub fn is_production(&self) -> bool {
        self.env.eq_ignore_ascii_case("production")
    }
}
