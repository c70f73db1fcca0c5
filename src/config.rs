use std::env;

/// AppConfig
///
/// Holds the application's entire configuration state. Immutable once loaded
/// and shared with handlers through `FromRef`.
#[derive(Clone, Debug)]
pub struct AppConfig {
    // SQLite connection string.
    pub db_url: String,
    // Socket address the HTTP server binds to.
    pub bind_addr: String,
    // Password for the `admin` account seeded on first start.
    pub admin_password: String,
    // Fixed, publicly known value an admin password reset falls back to.
    pub reset_password: String,
    // When false every self-registration becomes a viewer, whatever the form says.
    pub allow_role_selection: bool,
    // Runtime environment marker. Controls log format and cookie flags.
    pub env: Env,
}

/// Env
///
/// Runtime context: pretty logs and relaxed defaults locally, JSON logs, secure
/// cookies and mandatory secrets in production.
#[derive(Clone, PartialEq, Debug)]
pub enum Env {
    Local,
    Production,
}

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:5000";
pub const DEFAULT_RESET_PASSWORD: &str = "newpassword123";

impl Default for AppConfig {
    /// default
    ///
    /// Non-panicking configuration for tests: in-memory database, local
    /// environment, the stock fallback passwords.
    fn default() -> Self {
        Self {
            db_url: "sqlite::memory:".to_string(),
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            admin_password: "admin".to_string(),
            reset_password: DEFAULT_RESET_PASSWORD.to_string(),
            allow_role_selection: true,
            env: Env::Local,
        }
    }
}

impl AppConfig {
    /// load
    ///
    /// Reads every parameter from the environment.
    ///
    /// # Panics
    /// Panics in production when `DATABASE_URL` or `ADMIN_PASSWORD` is missing,
    /// so the server never starts with the well-known local admin password.
    pub fn load() -> Self {
        let env_str = env::var("APP_ENV").unwrap_or_else(|_| "local".to_string());
        let env = match env_str.as_str() {
            "production" => Env::Production,
            _ => Env::Local,
        };

        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string());
        let reset_password =
            env::var("RESET_PASSWORD").unwrap_or_else(|_| DEFAULT_RESET_PASSWORD.to_string());
        let allow_role_selection = env::var("ALLOW_ROLE_SELECTION")
            .map(|v| parse_flag(&v))
            .unwrap_or(true);

        match env {
            Env::Local => Self {
                env: Env::Local,
                db_url: env::var("DATABASE_URL")
                    .unwrap_or_else(|_| "sqlite://blog.db".to_string()),
                bind_addr,
                admin_password: env::var("ADMIN_PASSWORD").unwrap_or_else(|_| "admin".to_string()),
                reset_password,
                allow_role_selection,
            },
            Env::Production => Self {
                env: Env::Production,
                db_url: env::var("DATABASE_URL").expect("FATAL: DATABASE_URL required in prod"),
                bind_addr,
                admin_password: env::var("ADMIN_PASSWORD")
                    .expect("FATAL: ADMIN_PASSWORD required in prod"),
                reset_password,
                allow_role_selection,
            },
        }
    }

    pub fn secure_cookies(&self) -> bool {
        self.env == Env::Production
    }
}

fn parse_flag(value: &str) -> bool {
    !matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "0" | "false" | "no" | "off"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags() {
        assert!(parse_flag("true"));
        assert!(parse_flag("1"));
        assert!(!parse_flag("false"));
        assert!(!parse_flag(" OFF "));
    }
}
