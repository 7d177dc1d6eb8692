use serde::Deserialize;

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_TOKEN_VALIDITY_SECS: i64 = 3600; // 1 hour

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    /// Secret used to sign and verify bearer tokens. Loaded once at startup
    /// and never rotated while the process is running.
    pub jwt_secret: String,
    /// Lifetime of issued tokens, in seconds.
    pub jwt_validity_secs: i64,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            database_url: std::env::var("DB_URL")
                .or_else(|_| std::env::var("DATABASE_URL"))
                .map_err(|_| {
                    anyhow::anyhow!("DB_URL or DATABASE_URL environment variable required")
                })
                .and_then(|url| {
                    if url.trim().is_empty() {
                        anyhow::bail!("DB_URL cannot be empty");
                    }
                    if !url.starts_with("postgresql://") && !url.starts_with("postgres://") {
                        anyhow::bail!("DB_URL must start with postgresql:// or postgres://");
                    }
                    Ok(url)
                })?,
            port: std::env::var("PORT")
                .unwrap_or_else(|_| DEFAULT_PORT.to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number between 1-65535"))?,
            jwt_secret: std::env::var("JWT_SECRET")
                .map_err(|_| anyhow::anyhow!("JWT_SECRET environment variable required"))
                .and_then(|secret| {
                    if secret.trim().is_empty() {
                        anyhow::bail!("JWT_SECRET cannot be empty");
                    }
                    Ok(secret)
                })?,
            jwt_validity_secs: std::env::var("JWT_VALIDITY_SECS")
                .map(|s| {
                    s.parse::<i64>()
                        .map_err(|_| anyhow::anyhow!("JWT_VALIDITY_SECS must be a whole number"))
                        .and_then(|secs| {
                            if secs <= 0 {
                                anyhow::bail!("JWT_VALIDITY_SECS must be positive");
                            }
                            Ok(secs)
                        })
                })
                .unwrap_or(Ok(DEFAULT_TOKEN_VALIDITY_SECS))?,
        };

        // Log successful configuration load (without sensitive values)
        tracing::info!("Configuration loaded successfully");
        tracing::debug!("Database URL: {}...", url_preview(&config.database_url));
        tracing::debug!("Server Port: {}", config.port);
        tracing::debug!("Token validity: {}s", config.jwt_validity_secs);

        Ok(config)
    }
}

/// First characters of the URL for startup logging. Counts characters, not
/// bytes, so a multibyte character near the cutoff cannot split.
fn url_preview(url: &str) -> String {
    url.chars().take(20).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_preview_truncates_by_characters() {
        // "postgresql://" is 13 bytes; the accented characters that follow
        // put a char boundary astride byte 20.
        let url = "postgresql://aaaaaaéééé.example/db";
        let preview = url_preview(url);
        assert_eq!(preview.chars().count(), 20);
        assert!(url.starts_with(&preview));
    }

    #[test]
    fn test_url_preview_keeps_short_urls_whole() {
        assert_eq!(url_preview("postgres://x"), "postgres://x");
    }
}
