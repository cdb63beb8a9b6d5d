use serde::Deserialize;
use std::env;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub scheduler: SchedulerConfig,
    pub tournament: TournamentConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
    pub rust_log: String,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub database_url: Option<String>,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

impl StoreConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SchedulerConfig {
    pub registration_sweep_interval_secs: u64,
}

impl SchedulerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.registration_sweep_interval_secs)
    }
}

/// How tournament names are compared when checking for collisions.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NameMatchPolicy {
    Exact,
    CaseInsensitive,
    Normalized,
}

impl NameMatchPolicy {
    /// Key under which a name is stored for uniqueness.
    pub fn key(&self, name: &str) -> String {
        let trimmed = name.trim();
        match self {
            NameMatchPolicy::Exact => trimmed.to_string(),
            NameMatchPolicy::CaseInsensitive => trimmed.to_lowercase(),
            NameMatchPolicy::Normalized => trimmed
                .chars()
                .filter(|c| c.is_alphanumeric())
                .flat_map(char::to_lowercase)
                .collect(),
        }
    }
}

impl std::str::FromStr for NameMatchPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "exact" => Ok(NameMatchPolicy::Exact),
            "case_insensitive" => Ok(NameMatchPolicy::CaseInsensitive),
            "normalized" => Ok(NameMatchPolicy::Normalized),
            other => Err(anyhow::anyhow!("unknown TOURNAMENT_NAME_MATCH: {}", other)),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct TournamentConfig {
    pub name_match: NameMatchPolicy,
}

fn var_or<T>(name: &str, default: T) -> Result<T, anyhow::Error>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid {}: {}", name, e)),
        Err(_) => Ok(default),
    }
}

/// Counts and durations that must be at least one.
fn non_zero<T: PartialEq + Default>(name: &str, value: T) -> Result<T, anyhow::Error> {
    if value == T::default() {
        anyhow::bail!("{} must be greater than zero", name);
    }
    Ok(value)
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let port: u16 = env::var("PORT")?.parse()?;
        let host = env::var("HOST")?;
        let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        let backend = match env::var("STORE_BACKEND").as_deref() {
            Ok("postgres") | Err(_) => StoreBackend::Postgres,
            Ok("memory") => StoreBackend::Memory,
            Ok(other) => anyhow::bail!("unknown STORE_BACKEND: {}", other),
        };
        let database_url = env::var("DATABASE_URL").ok();
        if backend == StoreBackend::Postgres && database_url.is_none() {
            anyhow::bail!("DATABASE_URL is required when STORE_BACKEND=postgres");
        }
        let max_connections: u32 = non_zero("DATABASE_MAX_CONNECTIONS", var_or("DATABASE_MAX_CONNECTIONS", 5)?)?;
        let timeout_secs: u64 = non_zero("STORE_TIMEOUT_SECS", var_or("STORE_TIMEOUT_SECS", 5)?)?;

        let registration_sweep_interval_secs: u64 = non_zero(
            "REGISTRATION_SWEEP_INTERVAL_SECS",
            var_or("REGISTRATION_SWEEP_INTERVAL_SECS", 600)?,
        )?;
        let name_match: NameMatchPolicy = var_or("TOURNAMENT_NAME_MATCH", NameMatchPolicy::Normalized)?;

        Ok(Config {
            server: ServerConfig { port, host, rust_log },
            store: StoreConfig {
                backend,
                database_url,
                max_connections,
                timeout_secs,
            },
            scheduler: SchedulerConfig {
                registration_sweep_interval_secs,
            },
            tournament: TournamentConfig { name_match },
        })
    }
}
