use anyhow::{Context as _, Result};
use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use serenity::model::id::GuildId;
use songbird::{
    input::YoutubeDl,
    tracks::{PlayMode, TrackHandle},
    Call, Event, EventContext, EventHandler as VoiceEventHandler, Songbird, TrackEvent,
};
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};
use tracing::{debug, error, info};

use super::{
    engine::{EngineEvent, LoadResult, PlaybackEngine, TrackEndReason},
    track::Track,
};
use crate::sources::YouTubeResolver;

/// Estado compartido entre el engine y los handlers de eventos de una pista
struct TrackContext {
    guild_id: GuildId,
    track: Track,
    started: AtomicBool,
    ended: AtomicBool,
    // Lo fija el engine antes de detener la pista él mismo
    end_reason: Mutex<Option<TrackEndReason>>,
}

impl TrackContext {
    fn new(guild_id: GuildId, track: Track) -> Self {
        Self {
            guild_id,
            track,
            started: AtomicBool::new(false),
            ended: AtomicBool::new(false),
            end_reason: Mutex::new(None),
        }
    }
}

struct ActiveTrack {
    handle: TrackHandle,
    context: Arc<TrackContext>,
}

impl ActiveTrack {
    fn stop(self, reason: TrackEndReason) {
        *self.context.end_reason.lock() = Some(reason);
        if let Err(e) = self.handle.stop() {
            debug!("No se pudo detener la pista: {:?}", e);
        }
    }
}

struct PlayerSlot {
    call: Arc<tokio::sync::Mutex<Call>>,
    volume: u8,
    active: Option<ActiveTrack>,
}

/// Motor de reproducción sobre songbird: un `TrackHandle` por guild.
///
/// Los eventos de songbird se traducen a [`EngineEvent`] y se envían por un canal
/// `flume`; cada pista reporta a lo sumo un inicio y un final.
pub struct SongbirdEngine {
    manager: Arc<Songbird>,
    http: reqwest::Client,
    resolver: Arc<YouTubeResolver>,
    players: DashMap<GuildId, PlayerSlot>,
    events: flume::Sender<EngineEvent>,
}

impl SongbirdEngine {
    pub fn new(
        manager: Arc<Songbird>,
        resolver: Arc<YouTubeResolver>,
        events: flume::Sender<EngineEvent>,
    ) -> Self {
        Self {
            manager,
            http: reqwest::Client::new(),
            resolver,
            players: DashMap::new(),
            events,
        }
    }

    fn active_handle(&self, guild_id: GuildId) -> Option<TrackHandle> {
        self.players
            .get(&guild_id)
            .and_then(|slot| slot.active.as_ref().map(|active| active.handle.clone()))
    }

    fn take_active(&self, guild_id: GuildId) -> Option<ActiveTrack> {
        self.players
            .get_mut(&guild_id)
            .and_then(|mut slot| slot.active.take())
    }

    async fn start(&self, guild_id: GuildId, track: Track) -> Result<()> {
        let (call, volume) = {
            let slot = self
                .players
                .get(&guild_id)
                .context("No hay player para esta guild")?;
            (slot.call.clone(), slot.volume)
        };

        let input = YoutubeDl::new(self.http.clone(), track.uri.clone());
        let context = Arc::new(TrackContext::new(guild_id, track));

        let handle = {
            let mut call = call.lock().await;
            call.play_input(input.into())
        };

        handle.set_volume(to_gain(volume))?;
        for event in [TrackEvent::Play, TrackEvent::End, TrackEvent::Error] {
            handle
                .add_event(
                    Event::Track(event),
                    TrackNotifier {
                        context: context.clone(),
                        events: self.events.clone(),
                    },
                )
                .map_err(|e| anyhow::anyhow!("Error al agregar event handler: {}", e))?;
        }

        match self.players.get_mut(&guild_id) {
            Some(mut slot) => {
                if let Some(previous) = slot.active.replace(ActiveTrack { handle, context }) {
                    previous.stop(TrackEndReason::Replaced);
                }
            }
            // El player se destruyó mientras arrancaba la pista
            None => ActiveTrack { handle, context }.stop(TrackEndReason::Cleanup),
        }

        Ok(())
    }
}

#[async_trait]
impl PlaybackEngine for SongbirdEngine {
    async fn load_tracks(&self, query: &str) -> Result<LoadResult> {
        self.resolver.resolve(query).await
    }

    fn has_player(&self, guild_id: GuildId) -> bool {
        self.players.contains_key(&guild_id)
    }

    async fn create_player(&self, guild_id: GuildId, volume: u8) -> Result<()> {
        let call = self
            .manager
            .get(guild_id)
            .context("El bot no está conectado a un canal de voz")?;

        self.players.entry(guild_id).or_insert_with(|| PlayerSlot {
            call,
            volume,
            active: None,
        });
        info!("🎛️ Player creado para guild {}", guild_id);
        Ok(())
    }

    async fn update_track(&self, guild_id: GuildId, track: Option<Track>) -> Result<()> {
        match track {
            Some(track) => {
                info!("🎵 Reproduciendo: {} ({})", track.title, track.source_id());
                self.start(guild_id, track).await
            }
            None => {
                if let Some(active) = self.take_active(guild_id) {
                    active.stop(TrackEndReason::Stopped);
                }
                Ok(())
            }
        }
    }

    async fn set_volume(&self, guild_id: GuildId, volume: u8) -> Result<()> {
        let handle = match self.players.get_mut(&guild_id) {
            Some(mut slot) => {
                slot.volume = volume;
                slot.active.as_ref().map(|active| active.handle.clone())
            }
            None => return Ok(()),
        };

        if let Some(handle) = handle {
            handle.set_volume(to_gain(volume))?;
        }
        info!("🔊 Volumen ajustado a {}%", volume);
        Ok(())
    }

    async fn set_paused(&self, guild_id: GuildId, paused: bool) -> Result<()> {
        let Some(handle) = self.active_handle(guild_id) else {
            return Ok(());
        };

        if paused {
            handle.pause()?;
            info!("⏸️ Reproducción pausada");
        } else {
            handle.play()?;
            info!("▶️ Reproducción reanudada");
        }
        Ok(())
    }

    async fn is_paused(&self, guild_id: GuildId) -> bool {
        let Some(handle) = self.active_handle(guild_id) else {
            return false;
        };
        matches!(
            handle.get_info().await.map(|state| state.playing),
            Ok(PlayMode::Pause)
        )
    }

    async fn current_track(&self, guild_id: GuildId) -> Option<Track> {
        let slot = self.players.get(&guild_id)?;
        let active = slot.active.as_ref()?;
        if active.context.ended.load(Ordering::Acquire) {
            return None;
        }
        Some(active.context.track.clone())
    }

    async fn position(&self, guild_id: GuildId) -> Duration {
        let Some(handle) = self.active_handle(guild_id) else {
            return Duration::ZERO;
        };
        handle
            .get_info()
            .await
            .map(|state| state.position)
            .unwrap_or_default()
    }

    async fn remove_player(&self, guild_id: GuildId) -> Result<()> {
        if let Some((_, slot)) = self.players.remove(&guild_id) {
            if let Some(active) = slot.active {
                active.stop(TrackEndReason::Cleanup);
            }
            info!("🧹 Player eliminado para guild {}", guild_id);
        }
        Ok(())
    }
}

/// Volumen 0-100 a ganancia de songbird (1.0 = 100%)
fn to_gain(volume: u8) -> f32 {
    f32::from(volume) / 100.0
}

/// Reenvía los eventos de una pista de songbird como [`EngineEvent`]
struct TrackNotifier {
    context: Arc<TrackContext>,
    events: flume::Sender<EngineEvent>,
}

impl TrackNotifier {
    fn emit(&self, event: EngineEvent) {
        if self.events.send(event).is_err() {
            debug!("Canal de eventos del engine cerrado");
        }
    }

    fn end(&self, fallback: TrackEndReason) {
        if self.context.ended.swap(true, Ordering::AcqRel) {
            return;
        }
        let reason = self.context.end_reason.lock().take().unwrap_or(fallback);
        self.emit(EngineEvent::TrackEnded {
            guild_id: self.context.guild_id,
            track: self.context.track.clone(),
            reason,
        });
    }
}

#[async_trait]
impl VoiceEventHandler for TrackNotifier {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        let EventContext::Track(track_list) = ctx else {
            return None;
        };

        for (state, _handle) in *track_list {
            match &state.playing {
                PlayMode::Play => {
                    // songbird vuelve a emitir Play al reanudar
                    if !self.context.started.swap(true, Ordering::AcqRel) {
                        self.emit(EngineEvent::TrackStarted {
                            guild_id: self.context.guild_id,
                            track: self.context.track.clone(),
                        });
                    }
                }
                PlayMode::End | PlayMode::Stop => self.end(TrackEndReason::Finished),
                PlayMode::Errored(err) => {
                    error!(
                        "❌ Error en track para guild {}: {:?}",
                        self.context.guild_id, err
                    );
                    if !self.context.ended.load(Ordering::Acquire) {
                        self.emit(EngineEvent::TrackException {
                            guild_id: self.context.guild_id,
                            track: self.context.track.clone(),
                            message: err.to_string(),
                        });
                    }
                    self.end(TrackEndReason::LoadFailed);
                }
                _ => {}
            }
        }

        None
    }
}
