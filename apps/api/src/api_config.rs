use std::env;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use tasklane_application::{DEFAULT_CAPABILITY_CACHE_TTL_SECONDS, MAX_CAPABILITY_CACHE_TTL_SECONDS};
use tasklane_core::AppError;
use tasklane_infrastructure::DEFAULT_AUDIT_QUEUE_CAPACITY;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapabilityCacheBackend {
    InMemory,
    Redis,
}

impl CapabilityCacheBackend {
    fn parse(value: &str) -> Result<Self, AppError> {
        match value.trim() {
            "" | "in_memory" => Ok(Self::InMemory),
            "redis" => Ok(Self::Redis),
            other => Err(AppError::Validation(format!(
                "CAPABILITY_CACHE_BACKEND must be either 'in_memory' or 'redis', got '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub migrate_only: bool,
    pub database_url: String,
    pub api_host: String,
    pub api_port: u16,
    pub redis_url: Option<String>,
    pub capability_cache_backend: CapabilityCacheBackend,
    pub capability_cache_ttl_seconds: u32,
    pub resource_permission_default_expiry: Option<chrono::Duration>,
    pub audit_queue_capacity: usize,
}

impl ApiConfig {
    pub fn load() -> Result<Self, AppError> {
        let migrate_only = env::args().nth(1).as_deref() == Some("migrate");
        Self::from_lookup(migrate_only, |name| env::var(name).ok())
    }

    fn from_lookup(
        migrate_only: bool,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, AppError> {
        let database_url = lookup("DATABASE_URL")
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| AppError::Validation("DATABASE_URL is required".to_owned()))?;

        let api_host = lookup("API_HOST").unwrap_or_else(|| "127.0.0.1".to_owned());
        let api_port = lookup("API_PORT")
            .and_then(|value| value.parse::<u16>().ok())
            .unwrap_or(3002);

        let redis_url = lookup("REDIS_URL").filter(|value| !value.trim().is_empty());
        let capability_cache_backend = CapabilityCacheBackend::parse(
            lookup("CAPABILITY_CACHE_BACKEND").unwrap_or_default().as_str(),
        )?;

        let capability_cache_ttl_seconds = match non_empty(lookup("CAPABILITY_CACHE_TTL_SECONDS"))
        {
            Some(value) => value.parse::<u32>().map_err(|error| {
                AppError::Validation(format!("invalid CAPABILITY_CACHE_TTL_SECONDS: {error}"))
            })?,
            None => DEFAULT_CAPABILITY_CACHE_TTL_SECONDS,
        };
        if capability_cache_ttl_seconds > MAX_CAPABILITY_CACHE_TTL_SECONDS {
            return Err(AppError::Validation(format!(
                "CAPABILITY_CACHE_TTL_SECONDS must be at most {MAX_CAPABILITY_CACHE_TTL_SECONDS}"
            )));
        }

        let resource_permission_default_expiry =
            non_empty(lookup("RESOURCE_PERMISSION_DEFAULT_EXPIRY_MINUTES"))
                .map(|value| {
                    value
                        .parse::<i64>()
                        .ok()
                        .filter(|minutes| *minutes > 0)
                        .map(chrono::Duration::minutes)
                        .ok_or_else(|| {
                            AppError::Validation(format!(
                                "RESOURCE_PERMISSION_DEFAULT_EXPIRY_MINUTES must be a positive \
                                 number of minutes, got '{value}'"
                            ))
                        })
                })
                .transpose()?;

        let audit_queue_capacity = match non_empty(lookup("AUDIT_QUEUE_CAPACITY")) {
            Some(value) => value
                .parse::<usize>()
                .ok()
                .filter(|capacity| *capacity > 0)
                .ok_or_else(|| {
                    AppError::Validation(format!(
                        "AUDIT_QUEUE_CAPACITY must be a positive integer, got '{value}'"
                    ))
                })?,
            None => DEFAULT_AUDIT_QUEUE_CAPACITY,
        };

        Ok(Self {
            migrate_only,
            database_url,
            api_host,
            api_port,
            redis_url,
            capability_cache_backend,
            capability_cache_ttl_seconds,
            resource_permission_default_expiry,
            audit_queue_capacity,
        })
    }

    pub fn socket_address(&self) -> Result<SocketAddr, AppError> {
        let host = IpAddr::from_str(&self.api_host).map_err(|error| {
            AppError::Internal(format!("invalid API_HOST '{}': {error}", self.api_host))
        })?;
        Ok(SocketAddr::from((host, self.api_port)))
    }
}

pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}
