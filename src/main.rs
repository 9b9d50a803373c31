use anyhow::Result;
use serenity::{model::gateway::GatewayIntents, Client};
use songbird::{SerenityInit, Songbird};
use std::sync::Arc;
use tracing::{error, info};

mod audio;
mod bot;
mod cache;
mod config;
mod error;
mod sources;
mod ui;

use crate::audio::{session::SessionRegistry, songbird_engine::SongbirdEngine};
use crate::bot::{gateway::SongbirdVoice, orchestrator::SessionSettings, GuildPlayerBot, OrchestratorParts};
use crate::cache::SearchCache;
use crate::config::Config;
use crate::sources::YouTubeResolver;

#[tokio::main]
async fn main() -> Result<()> {
    // Inicializar logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("guild_player=debug".parse()?)
                .add_directive("serenity=info".parse()?)
                .add_directive("songbird=info".parse()?),
        )
        .init();

    info!("🎵 Iniciando Guild Player v{}", env!("CARGO_PKG_VERSION"));

    // Cargar configuración
    let config = Arc::new(Config::load()?);
    info!("{}", config.summary());

    let resolver = Arc::new(YouTubeResolver::new(
        config.ytdlp_path.clone(),
        config.search_results,
        config.max_playlist_size,
    ));

    // Manejar health check si es necesario
    if std::env::args().any(|arg| arg == "--health-check") {
        return health_check(&resolver).await;
    }

    // Intents mínimos: slash commands y estados de voz
    let intents = GatewayIntents::GUILDS | GatewayIntents::GUILD_VOICE_STATES;

    let manager = Songbird::serenity();
    let (events_tx, events_rx) = flume::unbounded();
    let engine = Arc::new(SongbirdEngine::new(manager.clone(), resolver, events_tx));

    let parts = OrchestratorParts {
        sessions: Arc::new(SessionRegistry::new(config.default_volume)),
        searches: Arc::new(SearchCache::new(config.search_ttl)),
        engine,
        voice: Arc::new(SongbirdVoice::new(manager.clone())),
        settings: SessionSettings::from(config.as_ref()),
    };
    let handler = GuildPlayerBot::new(config.clone(), parts, events_rx);

    // Construir cliente
    let mut client = Client::builder(&config.discord_token, intents)
        .event_handler(handler)
        .register_songbird_with(manager)
        .await?;

    // Manejar shutdown graceful
    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Error al registrar Ctrl+C: {:?}", e);
            return;
        }
        info!("⚠️ Señal de shutdown recibida, cerrando...");
        shard_manager.shutdown_all().await;
    });

    // Iniciar bot
    info!("🚀 Bot iniciado exitosamente");
    if let Err(why) = client.start().await {
        error!("Error al ejecutar cliente: {:?}", why);
    }

    Ok(())
}

async fn health_check(resolver: &YouTubeResolver) -> Result<()> {
    let version = resolver.verify().await?;
    println!("OK (yt-dlp {})", version);
    Ok(())
}
