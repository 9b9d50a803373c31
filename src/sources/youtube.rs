use anyhow::{Context, Result};
use async_process::Command;
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use super::{classify_query, QueryKind};
use crate::audio::{engine::LoadResult, track::Track};

/// Resuelve consultas con yt-dlp
pub struct YouTubeResolver {
    ytdlp_path: String,
    search_results: usize,
    max_playlist_size: usize,
    // Limitar procesos concurrentes de yt-dlp
    rate_limiter: Semaphore,
}

/// Información extraída de yt-dlp (entrada plana o video completo)
#[derive(Debug, Deserialize)]
struct YtDlpInfo {
    id: Option<String>,
    title: Option<String>,
    duration: Option<f64>,
    uploader: Option<String>,
    channel: Option<String>,
    thumbnail: Option<String>,
    #[serde(default)]
    thumbnails: Vec<Thumbnail>,
    webpage_url: Option<String>,
    url: Option<String>,
    is_live: Option<bool>,
    live_status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Thumbnail {
    url: String,
}

/// Salida de `--dump-single-json` para playlists
#[derive(Debug, Deserialize)]
struct YtDlpPlaylist {
    title: Option<String>,
    #[serde(default)]
    entries: Vec<YtDlpInfo>,
}

impl YouTubeResolver {
    pub fn new(ytdlp_path: String, search_results: usize, max_playlist_size: usize) -> Self {
        Self {
            ytdlp_path,
            search_results,
            max_playlist_size,
            rate_limiter: Semaphore::new(3),
        }
    }

    /// Resuelve una URL, playlist o búsqueda libre
    pub async fn resolve(&self, query: &str) -> Result<LoadResult> {
        match classify_query(query) {
            QueryKind::Search => {
                let tracks = self.search(query).await?;
                Ok(if tracks.is_empty() {
                    LoadResult::Empty
                } else {
                    LoadResult::Search(tracks)
                })
            }
            QueryKind::Playlist => self.playlist(query).await,
            QueryKind::Track => match self.track(query).await? {
                Some(track) => Ok(LoadResult::Track(track)),
                None => Ok(LoadResult::Empty),
            },
        }
    }

    /// Busca videos en YouTube
    async fn search(&self, query: &str) -> Result<Vec<Track>> {
        info!("🔍 Buscando en YouTube: {}", query);

        let search_query = format!("ytsearch{}:{}", self.search_results, query);
        let stdout = self
            .run(&[
                "--dump-json",
                "--flat-playlist",
                "--skip-download",
                "--no-warnings",
                &search_query,
            ])
            .await?;

        Ok(parse_json_lines(&stdout))
    }

    /// Obtiene información de una URL específica
    async fn track(&self, url: &str) -> Result<Option<Track>> {
        debug!("📊 Obteniendo info de: {}", url);

        let stdout = self
            .run(&["--no-playlist", "--dump-json", "--no-warnings", url])
            .await?;

        Ok(parse_json_lines(&stdout).into_iter().next())
    }

    /// Obtiene las entradas de una playlist
    async fn playlist(&self, url: &str) -> Result<LoadResult> {
        info!("📋 Obteniendo playlist: {}", url);

        let limit = self.max_playlist_size.to_string();
        let stdout = self
            .run(&[
                "--flat-playlist",
                "--dump-single-json",
                "--playlist-end",
                &limit,
                "--no-warnings",
                url,
            ])
            .await?;

        let playlist: YtDlpPlaylist =
            serde_json::from_str(&stdout).context("Error al parsear playlist de yt-dlp")?;
        let tracks: Vec<Track> = playlist.entries.into_iter().filter_map(info_to_track).collect();

        if tracks.is_empty() {
            return Ok(LoadResult::Empty);
        }

        Ok(LoadResult::Playlist {
            name: playlist.title.unwrap_or_else(|| "Playlist".to_string()),
            tracks,
        })
    }

    /// Verifica que yt-dlp esté instalado
    pub async fn verify(&self) -> Result<String> {
        let version = self.run(&["--version"]).await?;
        Ok(version.trim().to_string())
    }

    async fn run(&self, args: &[&str]) -> Result<String> {
        let _permit = self.rate_limiter.acquire().await?;

        let output = Command::new(&self.ytdlp_path)
            .args(args)
            .output()
            .await
            .context("Error al ejecutar yt-dlp")?;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("yt-dlp error: {}", error.trim());
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

fn parse_json_lines(stdout: &str) -> Vec<Track> {
    stdout
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| match serde_json::from_str::<YtDlpInfo>(line) {
            Ok(info) => info_to_track(info),
            Err(e) => {
                warn!("Línea de yt-dlp inválida: {}", e);
                None
            }
        })
        .collect()
}

/// Convierte YtDlpInfo a Track; descarta entradas sin título o sin URL
fn info_to_track(info: YtDlpInfo) -> Option<Track> {
    let title = info.title?;
    let uri = info
        .webpage_url
        .or_else(|| info.url.filter(|u| u.starts_with("http")))
        .or_else(|| {
            info.id
                .as_ref()
                .map(|id| format!("https://www.youtube.com/watch?v={id}"))
        })?;

    let mut track = Track::new(title, uri);

    if let Some(author) = info.uploader.or(info.channel) {
        track = track.with_author(author);
    }

    if let Some(duration) = info.duration.filter(|d| d.is_finite() && *d > 0.0) {
        track = track.with_duration(Duration::from_secs_f64(duration));
    }

    let artwork = info
        .thumbnail
        .or_else(|| info.thumbnails.into_iter().last().map(|t| t.url));
    if let Some(artwork) = artwork {
        track = track.with_artwork(artwork);
    }

    if let Some(id) = info.id {
        track = track.with_identifier(id);
    }

    let live = info.is_live.unwrap_or(false) || info.live_status.as_deref() == Some("is_live");
    if live {
        track = track.live();
    }

    Some(track)
}
