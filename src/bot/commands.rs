use anyhow::Result;
use serenity::{
    all::{Command as SlashCommand, CommandDataOptionValue, CommandInteraction, Http},
    builder::{CreateCommand, CreateCommandOption},
    model::{application::CommandOptionType, id::GuildId},
};
use tracing::info;

use crate::audio::{queue::RepeatMode, session::MAX_VOLUME};

/// Comando slash ya interpretado
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Play { query: String },
    Pause,
    Skip,
    Stop,
    Queue,
    Move { from: usize, to: usize },
    Remove { position: usize },
    Volume { level: u8 },
    Repeat { mode: RepeatMode },
    Shuffle,
    NowPlaying,
    Help,
}

impl Command {
    pub fn from_interaction(command: &CommandInteraction) -> Option<Self> {
        Self::parse(&command.data.name, |key| {
            command
                .data
                .options
                .iter()
                .find(|option| option.name == key)
                .map(|option| &option.value)
        })
    }

    /// Interpreta nombre + opciones; `None` si falta una opción obligatoria
    pub fn parse<'a>(
        name: &str,
        option: impl Fn(&str) -> Option<&'a CommandDataOptionValue>,
    ) -> Option<Self> {
        let string = |key: &str| option(key).and_then(|value| value.as_str()).map(str::to_string);
        // Las posiciones negativas se convierten en 0, que la cola rechaza
        let position = |key: &str| {
            option(key)
                .and_then(CommandDataOptionValue::as_i64)
                .map(|value| usize::try_from(value).unwrap_or(0))
        };

        let command = match name {
            "play" => Command::Play {
                query: string("query")?,
            },
            "pause" => Command::Pause,
            "skip" => Command::Skip,
            "stop" => Command::Stop,
            "queue" => Command::Queue,
            "move" => Command::Move {
                from: position("from")?,
                to: position("to")?,
            },
            "remove" => Command::Remove {
                position: position("position")?,
            },
            "volume" => {
                let level = option("level").and_then(CommandDataOptionValue::as_i64)?;
                Command::Volume {
                    level: level.clamp(0, i64::from(MAX_VOLUME)) as u8,
                }
            }
            "repeat" => Command::Repeat {
                mode: string("mode")
                    .and_then(|mode| RepeatMode::parse(&mode))
                    .unwrap_or_default(),
            },
            "shuffle" => Command::Shuffle,
            "nowplaying" => Command::NowPlaying,
            "help" => Command::Help,
            _ => return None,
        };
        Some(command)
    }
}

/// Registra los comandos en una guild (propagación inmediata) o globalmente
pub async fn register_commands(http: &Http, guild_id: Option<GuildId>) -> Result<()> {
    let commands = all_commands();
    let count = commands.len();

    match guild_id {
        Some(guild_id) => {
            guild_id.set_commands(http, commands).await?;
            info!("✅ {} comandos registrados para guild {}", count, guild_id);
        }
        None => {
            SlashCommand::set_global_commands(http, commands).await?;
            info!("✅ {} comandos globales registrados", count);
        }
    }

    Ok(())
}

fn all_commands() -> Vec<CreateCommand> {
    vec![
        play_command(),
        CreateCommand::new("pause").description("Pausa o reanuda la reproducción"),
        CreateCommand::new("skip").description("Salta a la siguiente canción"),
        CreateCommand::new("stop").description("Detiene la música, vacía la cola y sale del canal"),
        CreateCommand::new("queue").description("Muestra la cola de reproducción"),
        move_command(),
        remove_command(),
        volume_command(),
        repeat_command(),
        CreateCommand::new("shuffle").description("Mezcla la cola"),
        CreateCommand::new("nowplaying").description("Muestra la canción actual"),
        CreateCommand::new("help").description("Muestra la lista de comandos"),
    ]
}

fn play_command() -> CreateCommand {
    CreateCommand::new("play")
        .description("Reproduce una canción o playlist")
        .add_option(
            CreateCommandOption::new(
                CommandOptionType::String,
                "query",
                "URL o término de búsqueda",
            )
            .required(true),
        )
}

fn move_command() -> CreateCommand {
    CreateCommand::new("move")
        .description("Mueve una canción dentro de la cola")
        .add_option(
            CreateCommandOption::new(CommandOptionType::Integer, "from", "Posición actual")
                .min_int_value(1)
                .required(true),
        )
        .add_option(
            CreateCommandOption::new(CommandOptionType::Integer, "to", "Nueva posición")
                .min_int_value(1)
                .required(true),
        )
}

fn remove_command() -> CreateCommand {
    CreateCommand::new("remove")
        .description("Quita una canción de la cola")
        .add_option(
            CreateCommandOption::new(
                CommandOptionType::Integer,
                "position",
                "Posición en la cola",
            )
            .min_int_value(1)
            .required(true),
        )
}

fn volume_command() -> CreateCommand {
    CreateCommand::new("volume")
        .description("Ajusta el volumen")
        .add_option(
            CreateCommandOption::new(CommandOptionType::Integer, "level", "Volumen (0-100)")
                .min_int_value(0)
                .max_int_value(u64::from(MAX_VOLUME))
                .required(true),
        )
}

fn repeat_command() -> CreateCommand {
    CreateCommand::new("repeat")
        .description("Cambia el modo de repetición")
        .add_option(
            CreateCommandOption::new(CommandOptionType::String, "mode", "Modo de repetición")
                .add_string_choice("Desactivado", "off")
                .add_string_choice("Una canción", "one")
                .add_string_choice("Toda la cola", "all")
                .required(true),
        )
}
