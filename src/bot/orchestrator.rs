//! # Orchestrator
//!
//! Turns inbound [`BotEvent`]s (slash commands, button presses, playback engine
//! callbacks and voice disconnects) into [`GuildSession`] transitions plus calls
//! to the chat, engine and voice collaborators.
//!
//! Collaborator failures are logged and never retried; the session's own fields
//! are updated from the local decision regardless of whether the remote call
//! succeeded. Session locks are never held across an `.await`.

use serenity::model::id::{ChannelId, GuildId, MessageId, UserId};
use std::{sync::Arc, time::Duration};
use tracing::{debug, error, info, warn};

use super::{
    commands::Command,
    gateway::{ChatClient, VoiceGateway},
};
use crate::{
    audio::{
        engine::{EngineEvent, LoadResult, PlaybackEngine, TrackEndReason},
        queue::RepeatMode,
        session::{GuildSession, MessageRef, SessionRegistry},
        track::Track,
    },
    cache::{PendingSearch, SearchCache},
    config::Config,
    error::{SessionError, SessionResult},
    sources::{classify_query, QueryKind},
    ui::{
        buttons::ButtonAction,
        embeds::{self, QUEUE_PREVIEW},
        Panel,
    },
};

/// Eventos que recibe el orquestador
#[derive(Debug, Clone)]
pub enum BotEvent {
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
    UserCommand(CommandRequest),
    ComponentAction(ComponentRequest),
    VoiceDisconnected {
        guild_id: GuildId,
    },
}

impl From<EngineEvent> for BotEvent {
    fn from(event: EngineEvent) -> Self {
        match event {
            EngineEvent::TrackStarted { guild_id, track } => BotEvent::TrackStarted { guild_id, track },
            EngineEvent::TrackEnded {
                guild_id,
                track,
                reason,
            } => BotEvent::TrackEnded {
                guild_id,
                track,
                reason,
            },
            EngineEvent::TrackException {
                guild_id,
                track,
                message,
            } => BotEvent::TrackException {
                guild_id,
                track,
                message,
            },
            EngineEvent::TrackStuck {
                guild_id,
                track,
                threshold,
            } => BotEvent::TrackStuck {
                guild_id,
                track,
                threshold,
            },
        }
    }
}

/// Comando slash con su contexto
#[derive(Debug, Clone)]
pub struct CommandRequest {
    pub guild_id: GuildId,
    pub channel_id: ChannelId,
    pub user_id: UserId,
    pub command: Command,
}

/// Botón presionado sobre un mensaje del bot
#[derive(Debug, Clone)]
pub struct ComponentRequest {
    pub guild_id: GuildId,
    pub channel_id: ChannelId,
    pub message_id: MessageId,
    pub user_id: UserId,
    pub action: ButtonAction,
}

/// Respuesta a una interacción
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// Respuesta nueva, visible sólo para quien interactuó
    Message(Panel),
    /// Reemplaza el mensaje que contiene el botón
    Update(Panel),
    /// Confirma el botón sin cambiar nada
    Acknowledge,
    /// Panel de resultados; el llamador lo registra con el id del mensaje enviado
    Search {
        panel: Panel,
        search: PendingSearch,
    },
}

impl Reply {
    pub fn text(content: impl Into<String>) -> Self {
        Reply::Message(Panel::text(content))
    }
}

/// Tiempos y límites de las sesiones
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub idle_timeout: Duration,
    pub now_playing_interval: Duration,
    pub max_queue_size: usize,
}

impl From<&Config> for SessionSettings {
    fn from(config: &Config) -> Self {
        Self {
            idle_timeout: config.idle_timeout,
            now_playing_interval: config.now_playing_interval,
            max_queue_size: config.max_queue_size,
        }
    }
}

const NOTHING_PLAYING: &str = "❌ No hay nada reproduciéndose";

/// Despacha eventos hacia las sesiones. Es barato de clonar: los timers se
/// llevan una copia a su tarea.
#[derive(Clone)]
pub struct Orchestrator {
    pub(super) sessions: Arc<SessionRegistry>,
    pub(super) searches: Arc<SearchCache>,
    pub(super) chat: Arc<dyn ChatClient>,
    pub(super) engine: Arc<dyn PlaybackEngine>,
    pub(super) voice: Arc<dyn VoiceGateway>,
    pub(super) settings: SessionSettings,
}

impl Orchestrator {
    pub fn new(
        sessions: Arc<SessionRegistry>,
        searches: Arc<SearchCache>,
        chat: Arc<dyn ChatClient>,
        engine: Arc<dyn PlaybackEngine>,
        voice: Arc<dyn VoiceGateway>,
        settings: SessionSettings,
    ) -> Self {
        Self {
            sessions,
            searches,
            chat,
            engine,
            voice,
            settings,
        }
    }

    /// Punto de entrada único. Comandos y botones devuelven una respuesta.
    pub async fn handle(&self, event: BotEvent) -> Option<Reply> {
        match event {
            BotEvent::TrackStarted { guild_id, track } => {
                self.on_track_started(guild_id, track).await;
                None
            }
            BotEvent::TrackEnded {
                guild_id,
                track,
                reason,
            } => {
                self.on_track_ended(guild_id, track, reason).await;
                None
            }
            BotEvent::TrackException {
                guild_id,
                track,
                message,
            } => {
                error!(
                    "❌ Excepción en pista '{}' (guild {}): {}",
                    track.title, guild_id, message
                );
                let session = self.sessions.get_or_create(guild_id);
                self.delete_now_playing(&session).await;
                None
            }
            BotEvent::TrackStuck {
                guild_id,
                track,
                threshold,
            } => {
                warn!(
                    "⚠️ Pista '{}' atascada en guild {} (umbral {:?})",
                    track.title, guild_id, threshold
                );
                let session = self.sessions.get_or_create(guild_id);
                self.delete_now_playing(&session).await;
                // El motor no la detiene solo: sin siguiente pista hay que pararla
                self.skip_current(&session).await;
                None
            }
            BotEvent::VoiceDisconnected { guild_id } => {
                self.on_voice_disconnected(guild_id).await;
                None
            }
            BotEvent::UserCommand(request) => Some(self.handle_command(request).await),
            BotEvent::ComponentAction(request) => Some(self.handle_component(request).await),
        }
    }

    /// Guarda la búsqueda bajo el id del mensaje que muestra los resultados
    pub fn register_search(&self, message_id: MessageId, search: PendingSearch) {
        self.searches.put(message_id, search);
        debug!(
            "🔍 Búsqueda registrada en mensaje {} ({} activas)",
            message_id,
            self.searches.len()
        );
    }

    // Eventos del motor

    async fn on_track_started(&self, guild_id: GuildId, track: Track) {
        let session = self.sessions.get_or_create(guild_id);
        if session.current().as_ref() != Some(&track) {
            debug!(
                "Inicio de '{}' ignorado: ya no es la pista actual en guild {}",
                track.title, guild_id
            );
            return;
        }
        info!("▶️ Reproduciendo: {} en guild {}", track.title, guild_id);

        self.delete_now_playing(&session).await;
        self.delete_idle_notice(&session).await;
        session.cancel_idle();

        let Some(channel_id) = session.text_channel() else {
            return;
        };

        let position = self.engine.position(guild_id).await;
        let panel = embeds::now_playing(&track, &session.view(), position);
        let message_id = match self.chat.send_message(channel_id, &panel).await {
            Ok(message_id) => message_id,
            Err(e) => {
                error!("Error al enviar panel de reproducción: {:?}", e);
                return;
            }
        };

        let guard = session.arm_refresh(MessageRef {
            channel_id,
            message_id,
        });

        // La pista pudo terminar mientras se enviaba el panel
        if session.current().is_none() {
            self.delete_now_playing(&session).await;
            return;
        }

        self.spawn_refresh_loop(session, guard);
    }

    async fn on_track_ended(&self, guild_id: GuildId, track: Track, reason: TrackEndReason) {
        debug!("🎵 Pista terminada: {} ({:?})", track.title, reason);
        let session = self.sessions.get_or_create(guild_id);

        // La pista que la reemplaza publica su propio panel al arrancar
        if reason != TrackEndReason::Replaced {
            self.delete_now_playing(&session).await;
        }

        if reason.may_start_next() {
            self.play_next_or_idle(&session).await;
        }
    }

    async fn on_voice_disconnected(&self, guild_id: GuildId) {
        let Some(session) = self.sessions.get(guild_id) else {
            return;
        };

        info!("🔌 Desconectado de voz en guild {}, limpiando sesión", guild_id);
        debug!(
            "Sesión {}: refresco={}, inactividad={} ({} sesiones registradas)",
            guild_id,
            session.is_refreshing(),
            session.is_idle_armed(),
            self.sessions.len()
        );
        if self.engine.has_player(guild_id) {
            if let Err(e) = self.engine.remove_player(guild_id).await {
                debug!("No se pudo eliminar el player: {:?}", e);
            }
        }
        let leftovers = session.clear();
        self.delete_messages(leftovers).await;
    }

    // Comandos

    /// Ejecuta un comando slash y arma la respuesta para quien lo invocó
    pub async fn handle_command(&self, request: CommandRequest) -> Reply {
        let CommandRequest {
            guild_id,
            channel_id,
            user_id,
            command,
        } = request;
        debug!("📝 Comando {:?} en guild {}", command, guild_id);

        match command {
            Command::Play { query } => self.play(guild_id, channel_id, user_id, &query).await,
            Command::Pause => self.toggle_pause(guild_id).await,
            Command::Skip => self.skip(guild_id).await,
            Command::Stop => self.stop(guild_id).await,
            Command::Queue => Reply::Message(self.queue_panel(guild_id)),
            Command::Move { from, to } => {
                let session = self.sessions.get_or_create(guild_id);
                match session.move_track(from, to) {
                    Ok(track) => Reply::text(format!("📍 **{}** movida a la posición {}", track.title, to)),
                    Err(e) => Reply::text(format!("❌ No se pudo mover: {}", e)),
                }
            }
            Command::Remove { position } => {
                let session = self.sessions.get_or_create(guild_id);
                match session.remove(position) {
                    Ok(track) => Reply::text(format!("🗑️ **{}** eliminada de la cola", track.title)),
                    Err(e) => Reply::text(format!("❌ No se pudo eliminar: {}", e)),
                }
            }
            Command::Volume { level } => self.set_volume(guild_id, level).await,
            Command::Repeat { mode } => self.set_repeat(guild_id, mode).await,
            Command::Shuffle => {
                let session = self.sessions.get_or_create(guild_id);
                if session.queue_len() == 0 {
                    return Reply::text("❌ La cola está vacía");
                }
                let count = session.shuffle();
                Reply::text(format!("🔀 {} canciones mezcladas", count))
            }
            Command::NowPlaying => self.now_playing(guild_id).await,
            Command::Help => Reply::Message(embeds::help()),
        }
    }

    async fn play(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
        user_id: UserId,
        query: &str,
    ) -> Reply {
        let Some(voice_channel) = self.chat.voice_channel_of(guild_id, user_id).await else {
            return Reply::text("❌ Debes estar en un canal de voz para usar este comando");
        };

        let session = self.sessions.get_or_create(guild_id);
        self.delete_idle_notice(&session).await;
        session.cancel_idle();
        session.bind_text_channel(channel_id);

        if let Err(e) = self.voice.join_channel(guild_id, voice_channel).await {
            error!("Error al unirse al canal de voz: {:?}", e);
            return Reply::text(format!("❌ No pude conectarme al canal de voz: {}", e));
        }

        info!("🔍 Cargando: {}", query);
        let loaded = match self.engine.load_tracks(query).await {
            Ok(loaded) => loaded,
            Err(e) => {
                error!("Error al cargar pistas: {:?}", e);
                return Reply::text(format!("❌ Error al cargar: {}", e));
            }
        };

        match loaded {
            LoadResult::Track(track) => Reply::text(self.play_or_queue(&session, track).await),
            LoadResult::Playlist { name, tracks } => self.play_playlist(&session, &name, tracks).await,
            LoadResult::Search(tracks) if classify_query(query) != QueryKind::Search => {
                match tracks.into_iter().next() {
                    Some(track) => Reply::text(self.play_or_queue(&session, track).await),
                    None => Reply::text("❌ No se encontraron resultados"),
                }
            }
            LoadResult::Search(tracks) if !tracks.is_empty() => {
                let search = PendingSearch::new(tracks, guild_id, channel_id, user_id);
                Reply::Search {
                    panel: embeds::search_results(&search),
                    search,
                }
            }
            LoadResult::Search(_) | LoadResult::Empty => Reply::text("❌ No se encontraron resultados"),
        }
    }

    /// Crea el player si hace falta; si el motor está libre la pista suena ya,
    /// si no va a la cola
    async fn play_or_queue(&self, session: &GuildSession, track: Track) -> String {
        let guild_id = session.guild_id();
        if let Err(e) = self.ensure_player(session).await {
            error!("Error al crear player: {:?}", e);
            return format!("❌ Error al reproducir: {}", e);
        }

        if self.engine.current_track(guild_id).await.is_none() {
            session.set_current(Some(track.clone()));
            if let Err(e) = self.engine.update_track(guild_id, Some(track.clone())).await {
                error!("Error al reproducir: {:?}", e);
                return format!("❌ Error al reproducir: {}", e);
            }
            return format!("▶️ Reproduciendo **{}**", track.title);
        }

        if session.queue_len() >= self.settings.max_queue_size {
            return format!(
                "❌ La cola está llena (máximo {} canciones)",
                self.settings.max_queue_size
            );
        }

        let position = session.enqueue([track.clone()]);
        format!("✅ **{}** agregada a la cola (posición {})", track.title, position)
    }

    async fn play_playlist(&self, session: &GuildSession, name: &str, tracks: Vec<Track>) -> Reply {
        let guild_id = session.guild_id();
        if tracks.is_empty() {
            return Reply::text("❌ La playlist está vacía");
        }
        if let Err(e) = self.ensure_player(session).await {
            error!("Error al crear player: {:?}", e);
            return Reply::text(format!("❌ Error al reproducir: {}", e));
        }

        let total = tracks.len();
        let mut tracks = tracks.into_iter();

        if self.engine.current_track(guild_id).await.is_none() {
            if let Some(first) = tracks.next() {
                session.set_current(Some(first.clone()));
                if let Err(e) = self.engine.update_track(guild_id, Some(first)).await {
                    error!("Error al reproducir: {:?}", e);
                    return Reply::text(format!("❌ Error al reproducir: {}", e));
                }
            }
        }

        let room = self
            .settings
            .max_queue_size
            .saturating_sub(session.queue_len());
        let rest: Vec<Track> = tracks.collect();
        let dropped = rest.len().saturating_sub(room);
        session.enqueue(rest.into_iter().take(room));

        let mut message = format!("📋 Playlist **{}**: {} canciones agregadas", name, total - dropped);
        if dropped > 0 {
            message.push_str(&format!(" ({} omitidas: cola llena)", dropped));
        }
        Reply::text(message)
    }

    async fn toggle_pause(&self, guild_id: GuildId) -> Reply {
        if !self.engine.has_player(guild_id) {
            return Reply::text(NOTHING_PLAYING);
        }

        let paused = !self.engine.is_paused(guild_id).await;
        if let Err(e) = self.engine.set_paused(guild_id, paused).await {
            error!("Error al pausar: {:?}", e);
            return Reply::text(format!("❌ Error: {}", e));
        }

        if paused {
            Reply::text("⏸️ Reproducción pausada")
        } else {
            Reply::text("▶️ Reproducción reanudada")
        }
    }

    async fn skip(&self, guild_id: GuildId) -> Reply {
        if !self.engine.has_player(guild_id) {
            return Reply::text(NOTHING_PLAYING);
        }

        let session = self.sessions.get_or_create(guild_id);
        match self.skip_current(&session).await {
            Some(next) => Reply::text(format!("⏭️ Saltando. Siguiente: **{}**", next.title)),
            None => Reply::text("⏹️ La cola está vacía, reproducción terminada"),
        }
    }

    /// Avanza la sesión y reemplaza la pista del motor
    async fn skip_current(&self, session: &Arc<GuildSession>) -> Option<Track> {
        let guild_id = session.guild_id();
        let next = session.advance();

        if let Err(e) = self.engine.update_track(guild_id, next.clone()).await {
            error!("Error al saltar pista: {:?}", e);
        }
        if next.is_none() {
            self.arm_idle_timer(session.clone()).await;
        }
        next
    }

    async fn stop(&self, guild_id: GuildId) -> Reply {
        if self.engine.has_player(guild_id) {
            if let Err(e) = self.engine.update_track(guild_id, None).await {
                debug!("No se pudo detener la pista: {:?}", e);
            }
            if let Err(e) = self.engine.remove_player(guild_id).await {
                debug!("No se pudo eliminar el player: {:?}", e);
            }
        }

        let session = self.sessions.get_or_create(guild_id);
        let leftovers = session.clear();
        self.delete_messages(leftovers).await;

        if let Err(e) = self.voice.leave_channel(guild_id).await {
            warn!("Error al salir del canal de voz: {:?}", e);
        }

        Reply::text("⏹️ Reproducción detenida y desconectado del canal de voz")
    }

    async fn set_volume(&self, guild_id: GuildId, level: u8) -> Reply {
        if !self.engine.has_player(guild_id) {
            return Reply::text(NOTHING_PLAYING);
        }

        let session = self.sessions.get_or_create(guild_id);
        let volume = session.set_volume(level);
        if let Err(e) = self.engine.set_volume(guild_id, volume).await {
            error!("Error al ajustar volumen: {:?}", e);
            return Reply::text(format!("❌ Error al ajustar volumen: {}", e));
        }

        self.refresh_now_playing(&session).await;
        Reply::text(format!("🔊 Volumen ajustado a **{}%**", volume))
    }

    async fn set_repeat(&self, guild_id: GuildId, mode: RepeatMode) -> Reply {
        let session = self.sessions.get_or_create(guild_id);
        session.set_repeat(mode);
        self.refresh_now_playing(&session).await;
        Reply::text(format!("{} Modo de repetición: **{}**", mode.emoji(), mode))
    }

    async fn now_playing(&self, guild_id: GuildId) -> Reply {
        if !self.engine.has_player(guild_id) {
            return Reply::text(NOTHING_PLAYING);
        }
        let Some(track) = self.engine.current_track(guild_id).await else {
            return Reply::text(NOTHING_PLAYING);
        };

        let session = self.sessions.get_or_create(guild_id);
        let position = self.engine.position(guild_id).await;
        Reply::Message(embeds::now_playing(&track, &session.view(), position).without_rows())
    }

    fn queue_panel(&self, guild_id: GuildId) -> Panel {
        let session = self.sessions.get_or_create(guild_id);
        let upcoming = session.snapshot(QUEUE_PREVIEW);
        embeds::queue(&session.view(), &upcoming)
    }

    // Botones

    /// Ejecuta la acción de un botón; los de búsqueda sólo los usa quien buscó
    pub async fn handle_component(&self, request: ComponentRequest) -> Reply {
        if request.action.is_search() {
            return self.on_search_component(request).await;
        }

        let guild_id = request.guild_id;
        let session = self.sessions.get_or_create(guild_id);

        match request.action {
            ButtonAction::VolumeDown | ButtonAction::VolumeUp => {
                let delta = if request.action == ButtonAction::VolumeUp { 10 } else { -10 };
                let volume = session.adjust_volume(delta);
                if self.engine.has_player(guild_id) {
                    if let Err(e) = self.engine.set_volume(guild_id, volume).await {
                        error!("Error al ajustar volumen: {:?}", e);
                    }
                }
                self.now_playing_update(&session).await
            }
            ButtonAction::Skip => {
                if self.engine.has_player(guild_id) {
                    self.skip_current(&session).await;
                }
                Reply::Acknowledge
            }
            ButtonAction::CycleRepeat => {
                session.cycle_repeat();
                self.now_playing_update(&session).await
            }
            ButtonAction::ShowQueue => Reply::Message(self.queue_panel(guild_id)),
            _ => Reply::Acknowledge,
        }
    }

    /// Nuevo contenido del panel donde se presionó el botón
    async fn now_playing_update(&self, session: &GuildSession) -> Reply {
        let guild_id = session.guild_id();
        let Some(track) = session.current() else {
            return Reply::Acknowledge;
        };
        if !self.engine.has_player(guild_id) {
            return Reply::Acknowledge;
        }

        let position = self.engine.position(guild_id).await;
        Reply::Update(embeds::now_playing(&track, &session.view(), position))
    }

    async fn on_search_component(&self, request: ComponentRequest) -> Reply {
        let key = request.message_id;
        let search = match self.searches.authorize(key, request.user_id) {
            Ok(search) => search,
            Err(SessionError::Unauthorized) => {
                return Reply::text("🚫 Esta búsqueda pertenece a otro usuario")
            }
            Err(_) => return Reply::text("⌛ La búsqueda expiró. Vuelve a buscar con /play"),
        };

        match request.action {
            ButtonAction::SearchSelect(index) => {
                let track = match self.searches.select(key, request.user_id, index) {
                    Ok(track) => track,
                    Err(SessionError::InvalidIndex { .. }) => return Reply::Acknowledge,
                    Err(_) => return Reply::text("⌛ La búsqueda expiró. Vuelve a buscar con /play"),
                };
                let session = self.sessions.get_or_create(search.guild_id);
                let message = self.play_or_queue(&session, track).await;
                Reply::Update(Panel::text(message))
            }
            ButtonAction::SearchPrevious => match self.searches.previous_page(key) {
                Some(search) => Reply::Update(embeds::search_results(&search)),
                None => Reply::Acknowledge,
            },
            ButtonAction::SearchNext => match self.searches.next_page(key) {
                Some(search) => Reply::Update(embeds::search_results(&search)),
                None => Reply::Acknowledge,
            },
            ButtonAction::SearchCancel => {
                self.searches.delete(key);
                Reply::Update(Panel::text("❌ Búsqueda cancelada"))
            }
            _ => Reply::Acknowledge,
        }
    }

    // Utilidades

    async fn ensure_player(&self, session: &GuildSession) -> SessionResult<()> {
        let guild_id = session.guild_id();
        if !self.engine.has_player(guild_id) {
            self.engine.create_player(guild_id, session.volume()).await?;
        }
        Ok(())
    }

    /// Pista siguiente si hay; si no, arma el timer de inactividad
    async fn play_next_or_idle(&self, session: &Arc<GuildSession>) {
        match session.advance() {
            Some(next) => {
                if let Err(e) = self.engine.update_track(session.guild_id(), Some(next)).await {
                    error!("Error al reproducir siguiente pista: {:?}", e);
                }
            }
            None => self.arm_idle_timer(session.clone()).await,
        }
    }

    /// Detiene el loop de refresco y borra el panel de reproducción
    pub(super) async fn delete_now_playing(&self, session: &GuildSession) {
        if let Some(message) = session.take_now_playing() {
            self.delete_message(message).await;
        }
    }

    pub(super) async fn delete_idle_notice(&self, session: &GuildSession) {
        if let Some(message) = session.take_idle_notice() {
            self.delete_message(message).await;
        }
    }

    pub(super) async fn delete_messages(&self, messages: Vec<MessageRef>) {
        for message in messages {
            self.delete_message(message).await;
        }
    }

    async fn delete_message(&self, message: MessageRef) {
        if let Err(e) = self
            .chat
            .delete_message(message.channel_id, message.message_id)
            .await
        {
            debug!("No se pudo borrar el mensaje {}: {:?}", message.message_id, e);
        }
    }
}
