use anyhow::Result;
use serenity::{
    all::{CommandInteraction, ComponentInteraction, Context},
    builder::{CreateInteractionResponse, CreateInteractionResponseMessage, EditInteractionResponse},
};
use tracing::{debug, warn};

use super::{
    commands::Command,
    orchestrator::{CommandRequest, ComponentRequest, Orchestrator, Reply},
};
use crate::ui::{buttons::ButtonAction, Panel};

/// Maneja un comando slash: difiere, delega en el orquestador y edita la respuesta
pub async fn handle_command(
    ctx: &Context,
    command: CommandInteraction,
    orchestrator: &Orchestrator,
) -> Result<()> {
    let Some(guild_id) = command.guild_id else {
        return respond_ephemeral(ctx, &command, "❌ Este comando sólo funciona en servidores").await;
    };
    let Some(parsed) = Command::from_interaction(&command) else {
        warn!("Comando no reconocido: {}", command.data.name);
        return respond_ephemeral(ctx, &command, "❌ Comando no reconocido").await;
    };

    // Discord exige respuesta en 3 segundos; cargar pistas puede tardar más
    command.create_response(&ctx.http, deferred_response()).await?;

    let request = CommandRequest {
        guild_id,
        channel_id: command.channel_id,
        user_id: command.user.id,
        command: parsed,
    };
    let reply = orchestrator.handle_command(request).await;

    match reply {
        Reply::Search { panel, search } => {
            let message = command
                .edit_response(&ctx.http, edit_response(&panel))
                .await?;
            orchestrator.register_search(message.id, search);
        }
        Reply::Message(panel) | Reply::Update(panel) => {
            command.edit_response(&ctx.http, edit_response(&panel)).await?;
        }
        Reply::Acknowledge => {
            command
                .edit_response(&ctx.http, EditInteractionResponse::new().content("✅"))
                .await?;
        }
    }

    Ok(())
}

/// Maneja un botón de los paneles del bot
pub async fn handle_component(
    ctx: &Context,
    component: ComponentInteraction,
    orchestrator: &Orchestrator,
) -> Result<()> {
    let (Some(guild_id), Some(action)) = (
        component.guild_id,
        ButtonAction::parse(&component.data.custom_id),
    ) else {
        debug!("Botón ignorado: {}", component.data.custom_id);
        component
            .create_response(&ctx.http, CreateInteractionResponse::Acknowledge)
            .await?;
        return Ok(());
    };

    let request = ComponentRequest {
        guild_id,
        channel_id: component.channel_id,
        message_id: component.message.id,
        user_id: component.user.id,
        action,
    };

    let response = match orchestrator.handle_component(request).await {
        Reply::Update(panel) => CreateInteractionResponse::UpdateMessage(response_message(&panel)),
        Reply::Message(panel) | Reply::Search { panel, .. } => {
            CreateInteractionResponse::Message(response_message(&panel).ephemeral(true))
        }
        Reply::Acknowledge => CreateInteractionResponse::Acknowledge,
    };
    component.create_response(&ctx.http, response).await?;

    Ok(())
}

/// Respuesta diferida privada: la respuesta final hereda la visibilidad
fn deferred_response() -> CreateInteractionResponse {
    CreateInteractionResponse::Defer(CreateInteractionResponseMessage::new().ephemeral(true))
}

async fn respond_ephemeral(ctx: &Context, command: &CommandInteraction, content: &str) -> Result<()> {
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new()
                    .content(content)
                    .ephemeral(true),
            ),
        )
        .await?;
    Ok(())
}

fn response_message(panel: &Panel) -> CreateInteractionResponseMessage {
    CreateInteractionResponseMessage::new()
        .content(panel.content.clone().unwrap_or_default())
        .embeds(panel.embeds())
        .components(panel.components())
}

fn edit_response(panel: &Panel) -> EditInteractionResponse {
    EditInteractionResponse::new()
        .content(panel.content.clone().unwrap_or_default())
        .embeds(panel.embeds())
        .components(panel.components())
}
