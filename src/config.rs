use anyhow::{Context, Result};
use std::{str::FromStr, time::Duration};

use crate::audio::session::MAX_VOLUME;

#[derive(Debug, Clone)]
pub struct Config {
    // Discord
    pub discord_token: String,
    pub guild_id: Option<u64>, // Para comandos de desarrollo

    // Sesiones
    pub default_volume: u8,
    pub max_queue_size: usize,
    pub idle_timeout: Duration,
    pub now_playing_interval: Duration,

    // Búsqueda
    pub search_ttl: Duration,
    pub search_results: usize,
    pub max_playlist_size: usize,

    // yt-dlp
    pub ytdlp_path: String,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Construye la configuración desde cualquier fuente clave → valor
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();
        let value = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let config = Self {
            // Discord
            discord_token: value("DISCORD_TOKEN").context("DISCORD_TOKEN no está definido")?,
            guild_id: value("GUILD_ID").and_then(|s| s.parse().ok()),

            // Sesiones
            default_volume: parse_or(value("DEFAULT_VOLUME"), defaults.default_volume, "DEFAULT_VOLUME")?,
            max_queue_size: parse_or(value("MAX_QUEUE_SIZE"), defaults.max_queue_size, "MAX_QUEUE_SIZE")?,
            idle_timeout: duration_or(value("IDLE_TIMEOUT"), defaults.idle_timeout, "IDLE_TIMEOUT")?,
            now_playing_interval: duration_or(
                value("NOW_PLAYING_INTERVAL"),
                defaults.now_playing_interval,
                "NOW_PLAYING_INTERVAL",
            )?,

            // Búsqueda
            search_ttl: duration_or(value("SEARCH_TTL"), defaults.search_ttl, "SEARCH_TTL")?,
            search_results: parse_or(value("SEARCH_RESULTS"), defaults.search_results, "SEARCH_RESULTS")?,
            max_playlist_size: parse_or(
                value("MAX_PLAYLIST_SIZE"),
                defaults.max_playlist_size,
                "MAX_PLAYLIST_SIZE",
            )?,

            // yt-dlp
            ytdlp_path: value("YTDLP_PATH").unwrap_or(defaults.ytdlp_path),
        };

        config.validate()?;
        Ok(config)
    }

    /// Valida rangos antes de arrancar el bot
    pub fn validate(&self) -> Result<()> {
        if self.default_volume > MAX_VOLUME {
            anyhow::bail!(
                "El volumen por defecto debe estar entre 0 y {}, recibido: {}",
                MAX_VOLUME,
                self.default_volume
            );
        }

        if self.max_queue_size == 0 {
            anyhow::bail!("MAX_QUEUE_SIZE debe ser mayor que 0");
        }

        if self.search_results == 0 {
            anyhow::bail!("SEARCH_RESULTS debe ser mayor que 0");
        }

        if self.max_playlist_size == 0 {
            anyhow::bail!("MAX_PLAYLIST_SIZE debe ser mayor que 0");
        }

        if self.idle_timeout.is_zero() || self.now_playing_interval.is_zero() || self.search_ttl.is_zero() {
            anyhow::bail!("Los intervalos de tiempo deben ser mayores que 0");
        }

        Ok(())
    }

    /// Resumen para logs, sin el token
    pub fn summary(&self) -> String {
        format!(
            "Config Summary:\n  \
            Discord: Guild {}\n  \
            Sesión: {}% vol, cola máx {}, inactividad {}, refresco {}\n  \
            Búsqueda: {} resultados, TTL {}, playlists hasta {}\n  \
            yt-dlp: {}",
            self.guild_id.map_or("global".to_string(), |id| id.to_string()),
            self.default_volume,
            self.max_queue_size,
            humantime::format_duration(self.idle_timeout),
            humantime::format_duration(self.now_playing_interval),
            self.search_results,
            humantime::format_duration(self.search_ttl),
            self.max_playlist_size,
            self.ytdlp_path
        )
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            // Discord (sin valor por defecto)
            discord_token: String::new(),
            guild_id: None,

            default_volume: 50,
            max_queue_size: 1000,
            idle_timeout: Duration::from_secs(180),
            now_playing_interval: Duration::from_secs(15),

            search_ttl: Duration::from_secs(300),
            search_results: 10,
            max_playlist_size: 100,

            ytdlp_path: "yt-dlp".to_string(),
        }
    }
}

fn parse_or<T>(raw: Option<String>, default: T, key: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match raw {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("Valor inválido para {key}: {raw}")),
        None => Ok(default),
    }
}

/// Acepta "3m", "15s", "1h 30m"...
fn duration_or(raw: Option<String>, default: Duration, key: &str) -> Result<Duration> {
    match raw {
        Some(raw) => humantime::parse_duration(raw.trim())
            .with_context(|| format!("Duración inválida para {key}: {raw}")),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults_apply_when_unset() {
        let config = load(&[("DISCORD_TOKEN", "token")]).unwrap();

        assert_eq!(config.default_volume, 50);
        assert_eq!(config.idle_timeout, Duration::from_secs(180));
        assert_eq!(config.now_playing_interval, Duration::from_secs(15));
        assert_eq!(config.search_ttl, Duration::from_secs(300));
        assert_eq!(config.search_results, 10);
        assert_eq!(config.max_queue_size, 1000);
        assert_eq!(config.ytdlp_path, "yt-dlp");
        assert_eq!(config.guild_id, None);
    }

    #[test]
    fn test_humantime_durations_and_overrides() {
        let config = load(&[
            ("DISCORD_TOKEN", "token"),
            ("GUILD_ID", "1234"),
            ("IDLE_TIMEOUT", "1m 30s"),
            ("NOW_PLAYING_INTERVAL", "5s"),
            ("DEFAULT_VOLUME", "80"),
            ("YTDLP_PATH", "/usr/local/bin/yt-dlp"),
        ])
        .unwrap();

        assert_eq!(config.guild_id, Some(1234));
        assert_eq!(config.idle_timeout, Duration::from_secs(90));
        assert_eq!(config.now_playing_interval, Duration::from_secs(5));
        assert_eq!(config.default_volume, 80);
        assert_eq!(config.ytdlp_path, "/usr/local/bin/yt-dlp");
    }

    #[test]
    fn test_missing_token_fails() {
        assert!(load(&[]).is_err());
        assert!(load(&[("DISCORD_TOKEN", "  ")]).is_err());
    }

    #[test]
    fn test_invalid_values_fail() {
        assert!(load(&[("DISCORD_TOKEN", "t"), ("DEFAULT_VOLUME", "150")]).is_err());
        assert!(load(&[("DISCORD_TOKEN", "t"), ("IDLE_TIMEOUT", "pronto")]).is_err());
        assert!(load(&[("DISCORD_TOKEN", "t"), ("MAX_QUEUE_SIZE", "0")]).is_err());
    }

    #[test]
    fn test_summary_hides_token() {
        let config = load(&[("DISCORD_TOKEN", "secreto")]).unwrap();
        let summary = config.summary();

        assert!(!summary.contains("secreto"));
        assert!(summary.contains("inactividad 3m"));
    }
}
