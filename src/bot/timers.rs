use std::sync::Arc;
use tokio::time::{interval_at, sleep, Instant};
use tracing::{debug, error, info, warn};

use super::orchestrator::Orchestrator;
use crate::{
    audio::session::{GuildSession, MessageRef, TimerGuard},
    ui::embeds,
};

impl Orchestrator {
    /// Edita el panel de reproducción cada `now_playing_interval` hasta que
    /// el token se cancele o la generación quede obsoleta
    pub(super) fn spawn_refresh_loop(&self, session: Arc<GuildSession>, guard: TimerGuard) {
        let orchestrator = self.clone();
        let period = self.settings.now_playing_interval;

        tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            loop {
                tokio::select! {
                    _ = guard.token.cancelled() => break,
                    _ = ticker.tick() => {
                        if !orchestrator.refresh_tick(&session, guard.generation).await {
                            break;
                        }
                    }
                }
            }
            debug!("⏹️ Loop de refresco terminado en guild {}", session.guild_id());
        });
    }

    /// Un tick del loop; `false` si ya no hay nada que refrescar
    async fn refresh_tick(&self, session: &GuildSession, generation: u64) -> bool {
        let Some((message, track)) = session.refresh_target(generation) else {
            return false;
        };

        let position = self.engine.position(session.guild_id()).await;
        let panel = embeds::now_playing(&track, &session.view(), position);
        if let Err(e) = self
            .chat
            .update_message(message.channel_id, message.message_id, &panel)
            .await
        {
            debug!("No se pudo refrescar el panel {}: {:?}", message.message_id, e);
        }
        true
    }

    /// Refresco inmediato tras cambiar volumen o repetición
    pub(super) async fn refresh_now_playing(&self, session: &GuildSession) {
        let Some(message) = session.now_playing_message() else {
            return;
        };
        let Some(track) = session.current() else {
            return;
        };

        let position = self.engine.position(session.guild_id()).await;
        let panel = embeds::now_playing(&track, &session.view(), position);
        if let Err(e) = self
            .chat
            .update_message(message.channel_id, message.message_id, &panel)
            .await
        {
            debug!("No se pudo refrescar el panel {}: {:?}", message.message_id, e);
        }
    }

    /// Publica el aviso de inactividad y arma el timer de desconexión.
    /// El timer se arma aunque el aviso no se pueda publicar.
    pub(super) async fn arm_idle_timer(&self, session: Arc<GuildSession>) {
        let timeout = self.settings.idle_timeout;
        self.delete_idle_notice(&session).await;

        let notice = match session.text_channel() {
            Some(channel_id) => match self.chat.send_message(channel_id, &embeds::idle(timeout)).await {
                Ok(message_id) => Some(MessageRef {
                    channel_id,
                    message_id,
                }),
                Err(e) => {
                    warn!("No se pudo publicar el aviso de inactividad: {:?}", e);
                    None
                }
            },
            None => None,
        };

        let guard = session.arm_idle(notice);
        info!(
            "💤 Cola terminada en guild {}, desconexión en {}",
            session.guild_id(),
            humantime::format_duration(timeout)
        );

        let orchestrator = self.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = guard.token.cancelled() => {
                    debug!("⏱️ Timer de inactividad cancelado en guild {}", session.guild_id());
                }
                _ = sleep(timeout) => {
                    orchestrator.idle_timeout(&session, guard.generation).await;
                }
            }
        });
    }

    async fn idle_timeout(&self, session: &GuildSession, generation: u64) {
        let guild_id = session.guild_id();
        if !session.claim_idle(generation) {
            return;
        }
        // Algo volvió a sonar entre el disparo y el reclamo
        if session.current().is_some() {
            debug!("⏱️ Timer de inactividad descartado: hay pista en guild {}", guild_id);
            return;
        }

        info!("👋 Desconectando por inactividad en guild {}", guild_id);
        self.delete_idle_notice(session).await;

        if self.engine.has_player(guild_id) {
            if let Err(e) = self.engine.update_track(guild_id, None).await {
                debug!("No se pudo detener la pista: {:?}", e);
            }
            if let Err(e) = self.engine.remove_player(guild_id).await {
                error!("Error al eliminar el player: {:?}", e);
            }
        }

        let leftovers = session.clear();
        self.delete_messages(leftovers).await;

        if let Err(e) = self.voice.leave_channel(guild_id).await {
            warn!("Error al salir del canal de voz: {:?}", e);
        }
    }
}
