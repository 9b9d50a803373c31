//! # Bot Module
//!
//! Discord side of the player: slash command registration, interaction routing
//! and voice state tracking.
//!
//! ## Architecture
//!
//! [`GuildPlayerBot`] implements Serenity's [`EventHandler`] and forwards every
//! interaction to the shared [`Orchestrator`], which owns the per-guild sessions.
//! The orchestrator is assembled from [`OrchestratorParts`] on the first event,
//! once Serenity's HTTP client and cache are available.
//! Playback engine callbacks arrive on a `flume` channel and are drained by
//! [`spawn_dispatcher`] one at a time, in the order the engine emitted them.

use flume::Receiver;
use serenity::{
    all::{Context, EventHandler, GuildId, Interaction, Ready, VoiceState},
    async_trait,
};
use std::sync::{Arc, OnceLock};
use tracing::{debug, error, info};

pub mod commands;
pub mod gateway;
pub mod handlers;
pub mod orchestrator;
mod timers;

pub use orchestrator::{BotEvent, Orchestrator};

use crate::{
    audio::{
        engine::{EngineEvent, PlaybackEngine},
        session::SessionRegistry,
    },
    cache::SearchCache,
    config::Config,
};
use gateway::{SerenityChat, VoiceGateway};
use orchestrator::SessionSettings;

/// Piezas del orquestador que existen antes de conectar con Discord
#[derive(Clone)]
pub struct OrchestratorParts {
    pub sessions: Arc<SessionRegistry>,
    pub searches: Arc<SearchCache>,
    pub engine: Arc<dyn PlaybackEngine>,
    pub voice: Arc<dyn VoiceGateway>,
    pub settings: SessionSettings,
}

/// Handler de eventos de Discord.
///
/// El cache de serenity nace dentro del `Client`, así que el orquestador (que
/// lo necesita para leer estados de voz) se arma con el primer `Context`.
pub struct GuildPlayerBot {
    config: Arc<Config>,
    parts: OrchestratorParts,
    events: Receiver<EngineEvent>,
    orchestrator: OnceLock<Orchestrator>,
}

impl GuildPlayerBot {
    pub fn new(config: Arc<Config>, parts: OrchestratorParts, events: Receiver<EngineEvent>) -> Self {
        Self {
            config,
            parts,
            events,
            orchestrator: OnceLock::new(),
        }
    }

    fn orchestrator(&self, ctx: &Context) -> &Orchestrator {
        self.orchestrator.get_or_init(|| {
            let parts = self.parts.clone();
            let chat = Arc::new(SerenityChat::new(ctx.http.clone(), ctx.cache.clone()));
            let orchestrator = Orchestrator::new(
                parts.sessions,
                parts.searches,
                chat,
                parts.engine,
                parts.voice,
                parts.settings,
            );
            spawn_dispatcher(orchestrator.clone(), self.events.clone());
            info!("🎛️ Orquestador de sesiones listo");
            orchestrator
        })
    }
}

#[async_trait]
impl EventHandler for GuildPlayerBot {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("🤖 {} está en línea!", ready.user.name);
        info!("📊 Conectado a {} servidores", ready.guilds.len());
        self.orchestrator(&ctx);

        info!("📝 Registrando comandos slash...");
        let guild_id = self.config.guild_id.map(GuildId::new);
        if let Err(e) = commands::register_commands(&ctx.http, guild_id).await {
            error!("❌ Error registrando comandos: {:?}", e);
        }
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        let orchestrator = self.orchestrator(&ctx);
        match interaction {
            Interaction::Command(command_interaction) => {
                if let Err(e) = handlers::handle_command(&ctx, command_interaction, orchestrator).await {
                    error!("Error manejando comando: {:?}", e);
                }
            }
            Interaction::Component(component_interaction) => {
                if let Err(e) =
                    handlers::handle_component(&ctx, component_interaction, orchestrator).await
                {
                    error!("Error manejando componente: {:?}", e);
                }
            }
            _ => {}
        }
    }

    /// Sólo interesa el propio bot saliendo de voz (kick, desconexión manual)
    async fn voice_state_update(&self, ctx: Context, _old: Option<VoiceState>, new: VoiceState) {
        let current_user_id = ctx.cache.current_user().id;
        if new.user_id != current_user_id || new.channel_id.is_some() {
            return;
        }
        let Some(guild_id) = new.guild_id else {
            return;
        };

        info!("🔌 Bot desconectado en guild {}", guild_id);
        self.orchestrator(&ctx)
            .handle(BotEvent::VoiceDisconnected { guild_id })
            .await;
    }
}

/// Consume los eventos del motor hasta que se cierre el canal
pub fn spawn_dispatcher(orchestrator: Orchestrator, events: Receiver<EngineEvent>) {
    tokio::spawn(async move {
        while let Ok(event) = events.recv_async().await {
            orchestrator.handle(BotEvent::from(event)).await;
        }
        debug!("Canal de eventos del motor cerrado");
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        audio::{engine::LoadResult, track::Track},
        bot::gateway::{ChatClient, MockVoiceGateway},
        ui::Panel,
    };
    use anyhow::Result;
    use serenity::all::{ChannelId, MessageId, UserId};
    use std::time::Duration;

    struct SilentChat;

    #[async_trait]
    impl ChatClient for SilentChat {
        async fn send_message(&self, _: ChannelId, _: &Panel) -> Result<MessageId> {
            Ok(MessageId::new(1))
        }
        async fn update_message(&self, _: ChannelId, _: MessageId, _: &Panel) -> Result<()> {
            Ok(())
        }
        async fn delete_message(&self, _: ChannelId, _: MessageId) -> Result<()> {
            Ok(())
        }
        async fn voice_channel_of(&self, _: GuildId, _: UserId) -> Option<ChannelId> {
            None
        }
    }

    /// Motor que sólo registra las pistas pedidas
    #[derive(Default)]
    struct RecordingEngine {
        played: parking_lot::Mutex<Vec<Option<String>>>,
    }

    #[async_trait]
    impl PlaybackEngine for RecordingEngine {
        async fn load_tracks(&self, _: &str) -> Result<LoadResult> {
            Ok(LoadResult::Empty)
        }
        fn has_player(&self, _: GuildId) -> bool {
            true
        }
        async fn create_player(&self, _: GuildId, _: u8) -> Result<()> {
            Ok(())
        }
        async fn update_track(&self, _: GuildId, track: Option<Track>) -> Result<()> {
            self.played.lock().push(track.map(|t| t.title));
            Ok(())
        }
        async fn set_volume(&self, _: GuildId, _: u8) -> Result<()> {
            Ok(())
        }
        async fn set_paused(&self, _: GuildId, _: bool) -> Result<()> {
            Ok(())
        }
        async fn is_paused(&self, _: GuildId) -> bool {
            false
        }
        async fn current_track(&self, _: GuildId) -> Option<Track> {
            None
        }
        async fn position(&self, _: GuildId) -> Duration {
            Duration::ZERO
        }
        async fn remove_player(&self, _: GuildId) -> Result<()> {
            Ok(())
        }
    }

    fn orchestrator(sessions: Arc<SessionRegistry>, engine: Arc<RecordingEngine>) -> Orchestrator {
        Orchestrator::new(
            sessions,
            Arc::new(SearchCache::new(Duration::from_secs(300))),
            Arc::new(SilentChat),
            engine,
            Arc::new(MockVoiceGateway::new()),
            SessionSettings {
                idle_timeout: Duration::from_secs(180),
                now_playing_interval: Duration::from_secs(15),
                max_queue_size: 10,
            },
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispatcher_forwards_engine_events() {
        let engine = Arc::new(RecordingEngine::default());
        let sessions = Arc::new(SessionRegistry::new(50));
        let guild_id = GuildId::new(1);
        let session = sessions.get_or_create(guild_id);
        session.set_current(Some(Track::new("A", "https://example.com/a")));
        session.enqueue([Track::new("B", "https://example.com/b")]);

        let (tx, rx) = flume::unbounded();
        spawn_dispatcher(orchestrator(sessions, engine.clone()), rx);
        tx.send(EngineEvent::TrackEnded {
            guild_id,
            track: Track::new("A", "https://example.com/a"),
            reason: crate::audio::engine::TrackEndReason::Finished,
        })
        .unwrap();

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(engine.played.lock().clone(), vec![Some("B".to_string())]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispatcher_keeps_engine_order_for_late_start() {
        let engine = Arc::new(RecordingEngine::default());
        let sessions = Arc::new(SessionRegistry::new(50));
        let guild_id = GuildId::new(1);
        let track = Track::new("A", "https://example.com/a");
        let session = sessions.get_or_create(guild_id);
        session.set_current(Some(track.clone()));

        let (tx, rx) = flume::unbounded();
        spawn_dispatcher(orchestrator(sessions, engine), rx);
        tx.send(EngineEvent::TrackEnded {
            guild_id,
            track: track.clone(),
            reason: crate::audio::engine::TrackEndReason::Finished,
        })
        .unwrap();
        tx.send(EngineEvent::TrackStarted { guild_id, track }).unwrap();

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(session.current().is_none());
        assert!(session.is_idle_armed());
        assert!(!session.is_refreshing());
    }
}
