//! `ServerSettings::load()` — the three-way `env var > repository
//! service-endpoints row > built-in default` merge named in spec.md §6.

use proxypool_types::Market;

use crate::cli::Commands;

/// Host/port defaults selected by `ENVIRONMENT`, matching the teacher's
/// `ENVIRONMENT`-keyed default table.
fn builtin_defaults(environment: &str) -> (&'static str, u16) {
    match environment {
        "production" => ("0.0.0.0", 8080),
        "testing" => ("127.0.0.1", 18080),
        _ => ("127.0.0.1", 8080),
    }
}

/// Fully resolved server configuration for one process run.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub environment: String,
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub database_url: Option<String>,
    pub markets: Vec<Market>,
}

impl ServerSettings {
    /// Resolve settings from CLI/env, falling back to a service-endpoints
    /// row in the repository, then to built-in per-`ENVIRONMENT` defaults.
    ///
    /// `repository_host_port` stands in for "the service-endpoints config
    /// table" named in spec.md §6; callers pass `None` when no such row is
    /// configured (the in-memory repository carries none by default).
    pub fn load(
        serve: &Commands,
        repository_host_port: Option<(String, u16)>,
    ) -> Result<Self, String> {
        let Commands::Serve { environment, markets, host, port, log_level, database_url } = serve;

        let (default_host, default_port) = builtin_defaults(environment);
        let (repo_host, repo_port) = repository_host_port.unzip();

        let host = host
            .clone()
            .or(repo_host)
            .unwrap_or_else(|| default_host.to_string());
        let port = port.or(repo_port).unwrap_or(default_port);

        let markets = markets
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| s.parse::<Market>().map_err(|e| e.to_string()))
            .collect::<Result<Vec<_>, _>>()?;

        if markets.is_empty() {
            return Err("MARKETS resolved to an empty list".to_string());
        }

        Ok(Self {
            environment: environment.clone(),
            host,
            port,
            log_level: log_level.clone(),
            database_url: database_url.clone(),
            markets,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn serve(environment: &str, markets: &str, host: Option<&str>, port: Option<u16>) -> Commands {
        Commands::Serve {
            environment: environment.to_string(),
            markets: markets.to_string(),
            host: host.map(str::to_string),
            port,
            log_level: "info".to_string(),
            database_url: None,
        }
    }

    #[test]
    fn env_var_wins_over_repository_and_defaults() {
        let cmd = serve("production", "CN,HK", Some("10.0.0.1"), Some(9999));
        let settings = ServerSettings::load(&cmd, Some(("repo-host".into(), 1111))).unwrap();
        assert_eq!(settings.host, "10.0.0.1");
        assert_eq!(settings.port, 9999);
    }

    #[test]
    fn repository_wins_over_builtin_default() {
        let cmd = serve("production", "CN", None, None);
        let settings = ServerSettings::load(&cmd, Some(("repo-host".into(), 1111))).unwrap();
        assert_eq!(settings.host, "repo-host");
        assert_eq!(settings.port, 1111);
    }

    #[test]
    fn builtin_default_used_when_nothing_else_set() {
        let cmd = serve("production", "CN", None, None);
        let settings = ServerSettings::load(&cmd, None).unwrap();
        assert_eq!(settings.host, "0.0.0.0");
        assert_eq!(settings.port, 8080);
    }

    #[test]
    fn markets_parsed_and_trimmed() {
        let cmd = serve("development", " cn, hk , us ", None, None);
        let settings = ServerSettings::load(&cmd, None).unwrap();
        assert_eq!(settings.markets, vec![Market::Cn, Market::Hk, Market::Us]);
    }

    #[test]
    fn unknown_market_rejected() {
        let cmd = serve("development", "cn,zz", None, None);
        assert!(ServerSettings::load(&cmd, None).is_err());
    }
}
