use anyhow::{Context as _, Result};
use async_trait::async_trait;
use serenity::{
    all::{Cache, ChannelId, GuildId, Http, MessageId, UserId},
    builder::{CreateMessage, EditMessage},
};
use songbird::{error::JoinError, Songbird};
use std::sync::Arc;
use tracing::{debug, info};

use crate::ui::Panel;

/// Operaciones de chat que necesita el orquestador
#[async_trait]
pub trait ChatClient: Send + Sync {
    async fn send_message(&self, channel_id: ChannelId, panel: &Panel) -> Result<MessageId>;

    async fn update_message(
        &self,
        channel_id: ChannelId,
        message_id: MessageId,
        panel: &Panel,
    ) -> Result<()>;

    async fn delete_message(&self, channel_id: ChannelId, message_id: MessageId) -> Result<()>;

    /// Canal de voz en el que está el usuario, si está en alguno
    async fn voice_channel_of(&self, guild_id: GuildId, user_id: UserId) -> Option<ChannelId>;
}

/// Conexión de voz del bot
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VoiceGateway: Send + Sync {
    async fn join_channel(&self, guild_id: GuildId, channel_id: ChannelId) -> Result<()>;

    async fn leave_channel(&self, guild_id: GuildId) -> Result<()>;
}

/// Chat sobre la API REST y el cache de serenity
pub struct SerenityChat {
    http: Arc<Http>,
    cache: Arc<Cache>,
}

impl SerenityChat {
    pub fn new(http: Arc<Http>, cache: Arc<Cache>) -> Self {
        Self { http, cache }
    }
}

#[async_trait]
impl ChatClient for SerenityChat {
    async fn send_message(&self, channel_id: ChannelId, panel: &Panel) -> Result<MessageId> {
        let mut builder = CreateMessage::new()
            .embeds(panel.embeds())
            .components(panel.components());
        if let Some(content) = &panel.content {
            builder = builder.content(content);
        }

        let message = channel_id
            .send_message(&self.http, builder)
            .await
            .context("Error al enviar mensaje")?;
        Ok(message.id)
    }

    async fn update_message(
        &self,
        channel_id: ChannelId,
        message_id: MessageId,
        panel: &Panel,
    ) -> Result<()> {
        let builder = EditMessage::new()
            .content(panel.content.clone().unwrap_or_default())
            .embeds(panel.embeds())
            .components(panel.components());

        channel_id
            .edit_message(&self.http, message_id, builder)
            .await
            .context("Error al editar mensaje")?;
        Ok(())
    }

    async fn delete_message(&self, channel_id: ChannelId, message_id: MessageId) -> Result<()> {
        channel_id
            .delete_message(&self.http, message_id)
            .await
            .context("Error al borrar mensaje")?;
        Ok(())
    }

    async fn voice_channel_of(&self, guild_id: GuildId, user_id: UserId) -> Option<ChannelId> {
        let guild = self.cache.guild(guild_id)?;
        guild
            .voice_states
            .get(&user_id)
            .and_then(|state| state.channel_id)
    }
}

/// Voz sobre el manager de songbird
pub struct SongbirdVoice {
    manager: Arc<Songbird>,
}

impl SongbirdVoice {
    pub fn new(manager: Arc<Songbird>) -> Self {
        Self { manager }
    }
}

#[async_trait]
impl VoiceGateway for SongbirdVoice {
    async fn join_channel(&self, guild_id: GuildId, channel_id: ChannelId) -> Result<()> {
        self.manager
            .join(guild_id, channel_id)
            .await
            .context("Error al unirse al canal de voz")?;
        info!("🔊 Conectado al canal de voz {} en guild {}", channel_id, guild_id);
        Ok(())
    }

    async fn leave_channel(&self, guild_id: GuildId) -> Result<()> {
        match self.manager.remove(guild_id).await {
            Ok(()) => {
                info!("👋 Desconectado del canal de voz en guild {}", guild_id);
                Ok(())
            }
            Err(JoinError::NoCall) => {
                debug!("Sin conexión de voz que cerrar en guild {}", guild_id);
                Ok(())
            }
            Err(e) => Err(e).context("Error al salir del canal de voz"),
        }
    }
}
