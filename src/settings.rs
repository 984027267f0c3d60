use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Mysql {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

#[derive(Debug, Deserialize)]
pub struct Http {
    #[serde(default = "default_listen")]
    pub listen: String,
    /// Origins allowed by CORS. Empty allows any origin.
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct Auth {
    pub jwt_secret: String,
    #[serde(default = "default_token_ttl_hours")]
    pub token_ttl_hours: i64,
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub mysql: Mysql,
    pub http: Http,
    pub auth: Auth,
}

fn default_max_connections() -> u32 {
    10
}

fn default_listen() -> String {
    "0.0.0.0:3001".to_string()
}

fn default_token_ttl_hours() -> i64 {
    24
}

impl Settings {
    /// Loads `path` (extension optional) and overlays `REVENUE_LEDGER__SECTION__KEY`
    /// environment variables, e.g. `REVENUE_LEDGER__AUTH__JWT_SECRET`.
    /// `REVENUE_LEDGER__HTTP__CORS_ORIGINS` takes a comma separated list.
    pub fn new(path: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(path).required(false))
            .add_source(
                Environment::with_prefix("REVENUE_LEDGER")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("http.cors_origins"),
            )
            .build()?;

        config.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::FileFormat;

    #[test]
    fn defaults_fill_optional_keys() {
        let settings: Settings = Config::builder()
            .add_source(File::from_str(
                r#"
                [mysql]
                url = "mysql://root@localhost/revenue_management"

                [http]

                [auth]
                jwt_secret = "secret"
                "#,
                FileFormat::Toml,
            ))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(settings.mysql.max_connections, 10);
        assert_eq!(settings.http.listen, "0.0.0.0:3001");
        assert_eq!(settings.auth.token_ttl_hours, 24);
        assert!(settings.http.cors_origins.is_empty());
    }

    #[test]
    fn cors_origins_are_read_as_a_list() {
        let settings: Settings = Config::builder()
            .add_source(File::from_str(
                r#"
                [mysql]
                url = "mysql://root@localhost/revenue_management"

                [http]
                cors_origins = ["http://localhost:5173", "https://ledger.example.org"]

                [auth]
                jwt_secret = "secret"
                "#,
                FileFormat::Toml,
            ))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(
            settings.http.cors_origins,
            ["http://localhost:5173", "https://ledger.example.org"]
        );
    }

    #[test]
    fn missing_secret_is_rejected() {
        let result: Result<Settings, _> = Config::builder()
            .add_source(File::from_str(
                r#"
                [mysql]
                url = "mysql://root@localhost/revenue_management"

                [http]
                listen = "127.0.0.1:8080"

                [auth]
                "#,
                FileFormat::Toml,
            ))
            .build()
            .unwrap()
            .try_deserialize();

        assert!(result.is_err());
    }
}
