use anyhow::Result;
use async_trait::async_trait;
use serenity::model::id::GuildId;
use std::time::Duration;

use super::track::Track;

/// Por qué terminó una pista.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackEndReason {
    Finished,
    LoadFailed,
    Stopped,
    Replaced,
    Cleanup,
}

impl TrackEndReason {
    /// Sólo un final natural o un fallo de carga deben arrancar la siguiente pista.
    /// `Stopped`/`Replaced` los provoca el propio bot (skip, stop) y ya decidió qué sigue.
    pub fn may_start_next(self) -> bool {
        matches!(self, TrackEndReason::Finished | TrackEndReason::LoadFailed)
    }
}

/// Callbacks que levanta el motor de reproducción
#[derive(Debug, Clone)]
pub enum EngineEvent {
    TrackStarted {
        guild_id: GuildId,
        track: Track,
    },
    TrackEnded {
        guild_id: GuildId,
        track: Track,
        reason: TrackEndReason,
    },
    TrackException {
        guild_id: GuildId,
        track: Track,
        message: String,
    },
    TrackStuck {
        guild_id: GuildId,
        track: Track,
        threshold: Duration,
    },
}

/// Resultado de resolver una consulta
#[derive(Debug, Clone)]
pub enum LoadResult {
    Track(Track),
    Playlist { name: String, tracks: Vec<Track> },
    Search(Vec<Track>),
    Empty,
}

/// Contrato con el motor de reproducción remoto.
///
/// El núcleo sólo le da órdenes "dispara y olvida": los errores se registran
/// en el orquestador y nunca se reintentan.
#[async_trait]
pub trait PlaybackEngine: Send + Sync {
    /// Resuelve una URL o búsqueda en pistas reproducibles
    async fn load_tracks(&self, query: &str) -> Result<LoadResult>;

    /// ¿Existe un player para la guild?
    fn has_player(&self, guild_id: GuildId) -> bool;

    /// Crea el player de la guild con el volumen inicial
    async fn create_player(&self, guild_id: GuildId, volume: u8) -> Result<()>;

    /// Reemplaza la pista actual; `None` la detiene
    async fn update_track(&self, guild_id: GuildId, track: Option<Track>) -> Result<()>;

    async fn set_volume(&self, guild_id: GuildId, volume: u8) -> Result<()>;

    async fn set_paused(&self, guild_id: GuildId, paused: bool) -> Result<()>;

    async fn is_paused(&self, guild_id: GuildId) -> bool;

    /// Pista que el motor cree estar reproduciendo
    async fn current_track(&self, guild_id: GuildId) -> Option<Track>;

    /// Posición en vivo de la pista actual
    async fn position(&self, guild_id: GuildId) -> Duration;

    /// Destruye el player de la guild
    async fn remove_player(&self, guild_id: GuildId) -> Result<()>;
}
