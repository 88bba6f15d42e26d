use super::parsing::{
    env_optional, env_or_default, normalize_prefix, parse_auth_chain, parse_backend_mode,
    parse_bool, parse_cors_origins, parse_environment, parse_u16, parse_u64,
};
use super::secret::load_or_create_secret_key;
use super::types::{
    ApiSettings, AuthSettings, BackendMode, BackendSettings, ConfigError, CorsSettings,
    LockSettings, RedisSettings, RuntimeSettings, SecuritySettings, ServerHost, ServerPort,
    ServerSettings, Settings, TelemetrySettings,
};

impl Settings {
    pub(crate) fn load() -> Result<Self, ConfigError> {
        let host = env_or_default("ORA_GRADER_HOST", "0.0.0.0");
        let port = env_or_default("ORA_GRADER_PORT", "8000");

        let environment = parse_environment(
            env_optional("ORA_GRADER_ENV").or_else(|| env_optional("ENVIRONMENT")),
        );
        let strict_config = env_optional("ORA_GRADER_STRICT_CONFIG")
            .map(|value| parse_bool(&value))
            .unwrap_or(false)
            || environment.is_production();

        let project_name = env_or_default("PROJECT_NAME", "ORA Staff Grader");
        let version = env_or_default("VERSION", env!("CARGO_PKG_VERSION"));
        let api_prefix = normalize_prefix(env_or_default("API_PREFIX", "/api/ora_staff_grader"));

        let explicit_secret = env_optional("SECRET_KEY");
        if strict_config && explicit_secret.is_none() {
            return Err(ConfigError::MissingSecret("SECRET_KEY"));
        }
        let secret_key = match explicit_secret {
            Some(value) => value,
            None => load_or_create_secret_key(),
        };

        let algorithm = env_or_default("ALGORITHM", "HS256");

        let cors_origins = parse_cors_origins(env_optional("BACKEND_CORS_ORIGINS"))?;

        let redis_host = env_or_default("REDIS_HOST", "localhost");
        let redis_port = parse_u16("REDIS_PORT", env_or_default("REDIS_PORT", "6379"))?;
        let redis_db = parse_u16("REDIS_DB", env_or_default("REDIS_DB", "0"))?;
        let redis_password = env_or_default("REDIS_PASSWORD", "");

        let backend_mode = parse_backend_mode(env_optional("BACKEND_MODE"))?;
        let backend_base_url = env_or_default("BACKEND_BASE_URL", "http://localhost:18000")
            .trim_end_matches('/')
            .to_string();
        let backend_service_token = env_or_default("BACKEND_SERVICE_TOKEN", "");
        let backend_timeout_seconds =
            parse_u64("BACKEND_TIMEOUT_SECONDS", env_or_default("BACKEND_TIMEOUT_SECONDS", "30"))?;
        let backend_connect_timeout_seconds = parse_u64(
            "BACKEND_CONNECT_TIMEOUT_SECONDS",
            env_or_default("BACKEND_CONNECT_TIMEOUT_SECONDS", "5"),
        )?;
        let backend_fixture_path = env_optional("BACKEND_FIXTURE_PATH");

        let claim_rate_limit =
            parse_u64("LOCK_CLAIM_RATE_LIMIT", env_or_default("LOCK_CLAIM_RATE_LIMIT", "30"))?;
        let claim_rate_window_seconds = parse_u64(
            "LOCK_CLAIM_RATE_WINDOW_SECONDS",
            env_or_default("LOCK_CLAIM_RATE_WINDOW_SECONDS", "60"),
        )?;

        let auth_chain = parse_auth_chain(env_optional("AUTH_CHAIN"))?;

        let log_level = env_or_default("ORA_GRADER_LOG_LEVEL", "info");
        let json =
            env_optional("ORA_GRADER_LOG_JSON").map(|value| parse_bool(&value)).unwrap_or(false);
        let prometheus_enabled =
            env_optional("PROMETHEUS_ENABLED").map(|value| parse_bool(&value)).unwrap_or(false);

        let settings = Self {
            server: ServerSettings {
                host: ServerHost::parse(host)?,
                port: ServerPort::parse(port)?,
            },
            runtime: RuntimeSettings { environment, strict_config },
            api: ApiSettings { project_name, version, api_prefix },
            security: SecuritySettings { secret_key, algorithm },
            cors: CorsSettings { origins: cors_origins },
            redis: RedisSettings {
                host: redis_host,
                port: redis_port,
                db: redis_db,
                password: redis_password,
            },
            backend: BackendSettings {
                mode: backend_mode,
                base_url: backend_base_url,
                service_token: backend_service_token,
                timeout_seconds: backend_timeout_seconds,
                connect_timeout_seconds: backend_connect_timeout_seconds,
                fixture_path: backend_fixture_path,
            },
            locks: LockSettings { claim_rate_limit, claim_rate_window_seconds },
            auth: AuthSettings { chain: auth_chain },
            telemetry: TelemetrySettings { log_level, json, prometheus_enabled },
        };

        settings.validate()?;
        Ok(settings)
    }

    pub(crate) fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host.0, self.server.port.0)
    }

    pub(crate) fn server_host(&self) -> &str {
        &self.server.host.0
    }

    pub(crate) fn server_port(&self) -> u16 {
        self.server.port.0
    }

    pub(crate) fn api(&self) -> &ApiSettings {
        &self.api
    }

    pub(crate) fn security(&self) -> &SecuritySettings {
        &self.security
    }

    pub(crate) fn cors(&self) -> &CorsSettings {
        &self.cors
    }

    pub(crate) fn redis(&self) -> &RedisSettings {
        &self.redis
    }

    pub(crate) fn backend(&self) -> &BackendSettings {
        &self.backend
    }

    pub(crate) fn locks(&self) -> &LockSettings {
        &self.locks
    }

    pub(crate) fn auth(&self) -> &AuthSettings {
        &self.auth
    }

    pub(crate) fn telemetry(&self) -> &TelemetrySettings {
        &self.telemetry
    }

    pub(crate) fn runtime(&self) -> &RuntimeSettings {
        &self.runtime
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.backend.timeout_seconds == 0 {
            return Err(ConfigError::InvalidValue {
                field: "BACKEND_TIMEOUT_SECONDS",
                value: "0".to_string(),
            });
        }

        if self.locks.claim_rate_window_seconds == 0 {
            return Err(ConfigError::InvalidValue {
                field: "LOCK_CLAIM_RATE_WINDOW_SECONDS",
                value: "0".to_string(),
            });
        }

        if self.security.algorithm != "HS256" {
            return Err(ConfigError::InvalidValue {
                field: "ALGORITHM",
                value: self.security.algorithm.clone(),
            });
        }

        if !(self.runtime.strict_config || self.runtime.environment.is_production()) {
            return Ok(());
        }

        if self.backend.mode == BackendMode::Memory {
            return Err(ConfigError::InvalidValue {
                field: "BACKEND_MODE",
                value: self.backend.mode.as_str().to_string(),
            });
        }

        if self.backend.service_token.is_empty() {
            return Err(ConfigError::MissingSecret("BACKEND_SERVICE_TOKEN"));
        }

        Ok(())
    }
}
