use super::{ConnectionSource, ConnectionSpec};
use crate::error::Result;
use std::collections::BTreeMap;
use std::env;

/// Reads a single `default` connection from `DATABASE_URL`, or from the
/// individual `DB_*` variables when `DB_NAME` is set.
pub struct EnvConnectionSource {
    vars: BTreeMap<String, String>,
}

impl EnvConnectionSource {
    pub fn new() -> Self {
        let vars = ["DATABASE_URL", "DB_HOST", "DB_PORT", "DB_NAME", "DB_USER", "DB_PASSWORD"]
            .iter()
            .filter_map(|key| env::var(key).ok().map(|value| (key.to_string(), value)))
            .collect();
        Self { vars }
    }

    /// Build from an explicit variable set instead of the process environment
    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: vars.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }

    fn var(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    fn database_url(&self) -> Option<String> {
        if let Some(url) = self.var("DATABASE_URL") {
            return Some(url.to_string());
        }

        let db_name = self.var("DB_NAME")?;
        let db_host = self.var("DB_HOST").unwrap_or("localhost");
        let db_port = self.var("DB_PORT").unwrap_or("5432");
        let db_user = self.var("DB_USER").unwrap_or("postgres");
        let db_password = self.var("DB_PASSWORD").unwrap_or("");

        // URL-encode credentials to handle special characters
        let encoded_user = urlencoding::encode(db_user);
        let encoded_password = urlencoding::encode(db_password);

        Some(format!(
            "postgres://{}:{}@{}:{}/{}",
            encoded_user, encoded_password, db_host, db_port, db_name
        ))
    }
}

impl Default for EnvConnectionSource {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionSource for EnvConnectionSource {
    fn name(&self) -> &str {
        "environment"
    }

    fn list_connections(&self) -> Result<BTreeMap<String, ConnectionSpec>> {
        let mut connections = BTreeMap::new();
        if let Some(url) = self.database_url() {
            connections.insert("default".to_string(), ConnectionSpec::new(url));
        }
        Ok(connections)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_url_wins() {
        let source = EnvConnectionSource::from_vars([
            ("DATABASE_URL", "postgres://env/app"),
            ("DB_NAME", "ignored"),
        ]);
        let connections = source.list_connections().unwrap();
        assert_eq!(connections["default"].uri, "postgres://env/app");
    }

    #[test]
    fn test_individual_fields() {
        let source = EnvConnectionSource::from_vars([
            ("DB_NAME", "app"),
            ("DB_HOST", "db"),
            ("DB_USER", "svc"),
            ("DB_PASSWORD", "a/b"),
        ]);
        let connections = source.list_connections().unwrap();
        assert_eq!(connections["default"].uri, "postgres://svc:a%2Fb@db:5432/app");
    }

    #[test]
    fn test_no_variables_means_no_connections() {
        let source = EnvConnectionSource::from_vars(Vec::<(String, String)>::new());
        assert!(source.list_connections().unwrap().is_empty());
    }
}
