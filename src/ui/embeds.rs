use std::time::Duration;

use super::{
    buttons::{now_playing_controls, search_controls},
    format_duration, progress_bar, Embed, Panel,
};
use crate::{
    audio::{session::SessionView, track::Track},
    cache::PendingSearch,
};

/// Paleta de colores estandarizada para el bot
pub mod colors {
    use serenity::all::Colour;

    pub const SUCCESS_GREEN: Colour = Colour::from_rgb(67, 181, 129);
    pub const INFO_BLUE: Colour = Colour::from_rgb(52, 144, 220);
    pub const MUSIC_PURPLE: Colour = Colour::from_rgb(138, 43, 226);
    pub const NEUTRAL_GRAY: Colour = Colour::from_rgb(108, 117, 125);
    pub const SEARCH_CORAL: Colour = Colour::from_rgb(255, 107, 107);
}

/// Footer estandarizado para todos los embeds
const STANDARD_FOOTER: &str = "🎵 Guild Player";

const PROGRESS_BAR_WIDTH: usize = 16;

/// Entradas de la cola que se muestran en `/queue`
pub const QUEUE_PREVIEW: usize = 10;

fn duration_label(track: &Track) -> String {
    if track.is_stream {
        "🔴 En vivo".to_string()
    } else {
        format_duration(track.duration())
    }
}

/// Panel "Reproduciendo Ahora" con progreso en vivo y controles
pub fn now_playing(track: &Track, view: &SessionView, position: Duration) -> Panel {
    let mut description = format!("**[{}]({})**", track.title, track.uri);
    if let Some(author) = track.author.as_deref().filter(|a| !a.is_empty()) {
        description.push_str(&format!("\n{author}"));
    }

    if track.is_stream {
        description.push_str("\n\n`🔴 EN VIVO`");
    } else {
        description.push_str(&format!(
            "\n\n{}\n`{} / {}`",
            progress_bar(position, track.duration(), PROGRESS_BAR_WIDTH),
            format_duration(position),
            format_duration(track.duration())
        ));
    }

    let embed = Embed::new("🎵 Reproduciendo Ahora", colors::SUCCESS_GREEN)
        .url(track.uri.clone())
        .description(description)
        .thumbnail(track.artwork_url.clone())
        .field("🔊 Volumen", format!("{}%", view.volume), true)
        .field("🔁 Repetir", format!("{} {}", view.repeat.emoji(), view.repeat), true)
        .field("📋 Cola", format!("{} canciones", view.queue_len), true)
        .footer(STANDARD_FOOTER);

    Panel::with_embed(embed).with_rows(now_playing_controls(view))
}

/// Panel de la cola: pista actual, primeras entradas y cuántas más quedan
pub fn queue(view: &SessionView, upcoming: &[Track]) -> Panel {
    let mut description = match &view.current {
        Some(current) => format!(
            "**Sonando:** [{}]({}) `{}`\n\n",
            current.title,
            current.uri,
            duration_label(current)
        ),
        None => "No hay nada reproduciéndose.\n\n".to_string(),
    };

    if upcoming.is_empty() {
        description.push_str("La cola está vacía.");
    } else {
        for (i, track) in upcoming.iter().enumerate() {
            description.push_str(&format!(
                "`{}.` [{}]({}) `{}`\n",
                i + 1,
                track.title,
                track.uri,
                duration_label(track)
            ));
        }
        if view.queue_len > upcoming.len() {
            description.push_str(&format!(
                "\n... y {} canciones más",
                view.queue_len - upcoming.len()
            ));
        }
    }

    let embed = Embed::new("📋 Cola de Reproducción", colors::INFO_BLUE)
        .description(description)
        .footer(format!(
            "{} canciones • {} • Repetir: {}",
            view.queue_len,
            format_duration(view.queue_duration),
            view.repeat
        ));

    Panel::with_embed(embed)
}

/// Página actual de resultados con un botón por resultado
pub fn search_results(search: &PendingSearch) -> Panel {
    let offset = search.page_offset();
    let description = search
        .page_tracks()
        .iter()
        .enumerate()
        .map(|(i, track)| {
            let author = track.author.as_deref().unwrap_or("Desconocido");
            format!(
                "`{}.` **{}**\n{} • `{}`",
                offset + i + 1,
                track.title,
                author,
                duration_label(track)
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    let embed = Embed::new("🔍 Resultados de Búsqueda", colors::SEARCH_CORAL)
        .description(description)
        .footer(format!(
            "Página {}/{} • {} resultados",
            search.current_page + 1,
            search.total_pages(),
            search.results.len()
        ));

    Panel::with_embed(embed).with_rows(search_controls(search))
}

/// Aviso publicado cuando la cola se agota
pub fn idle(timeout: Duration) -> Panel {
    let embed = Embed::new("💤 Cola terminada", colors::NEUTRAL_GRAY)
        .description(format!(
            "No quedan canciones. Me desconectaré en {} si nadie pide música.",
            humantime::format_duration(timeout)
        ))
        .footer("Usa /play para seguir escuchando");

    Panel::with_embed(embed)
}

pub fn help() -> Panel {
    let commands = [
        ("/play <búsqueda o URL>", "Reproduce o agrega a la cola"),
        ("/pause", "Pausa o reanuda"),
        ("/skip", "Salta a la siguiente canción"),
        ("/stop", "Detiene, vacía la cola y sale del canal"),
        ("/queue", "Muestra la cola"),
        ("/move <desde> <hasta>", "Mueve una canción de la cola"),
        ("/remove <posición>", "Quita una canción de la cola"),
        ("/volume <0-100>", "Ajusta el volumen"),
        ("/repeat <off|one|all>", "Cambia el modo de repetición"),
        ("/shuffle", "Mezcla la cola"),
        ("/nowplaying", "Muestra la canción actual"),
    ];

    let embed = commands.iter().fold(
        Embed::new("📖 Comandos", colors::MUSIC_PURPLE).footer(STANDARD_FOOTER),
        |embed, (name, value)| embed.field(*name, *value, false),
    );

    Panel::with_embed(embed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::queue::RepeatMode;
    use serenity::model::id::{ChannelId, GuildId, UserId};

    fn track(title: &str) -> Track {
        Track::new(title, format!("https://example.com/{title}"))
            .with_duration(Duration::from_secs(200))
    }

    fn view(queue_len: usize) -> SessionView {
        SessionView {
            current: Some(track("Actual")),
            queue_len,
            queue_duration: Duration::from_secs(200 * queue_len as u64),
            repeat: RepeatMode::All,
            volume: 70,
        }
    }

    #[test]
    fn test_now_playing_shows_progress_and_settings() {
        let panel = now_playing(&track("A"), &view(2), Duration::from_secs(100));
        let embed = panel.embed.unwrap();

        assert!(embed.description.contains("`1:40 / 3:20`"));
        assert!(embed.description.contains('●'));
        assert_eq!(embed.fields[0].1, "70%");
        assert_eq!(embed.fields[2].1, "2 canciones");
        assert_eq!(panel.rows.len(), 1);
    }

    #[test]
    fn test_now_playing_stream_has_no_progress() {
        let panel = now_playing(&track("Radio").live(), &view(0), Duration::from_secs(100));
        let description = panel.embed.unwrap().description;

        assert!(description.contains("EN VIVO"));
        assert!(!description.contains('●'));
    }

    #[test]
    fn test_queue_lists_preview_and_overflow() {
        let upcoming: Vec<Track> = (1..=QUEUE_PREVIEW).map(|i| track(&format!("T{i}"))).collect();

        let panel = queue(&view(15), &upcoming);
        let description = panel.embed.unwrap().description;

        assert!(description.contains("`10.` [T10]"));
        assert!(description.contains("... y 5 canciones más"));
    }

    #[test]
    fn test_queue_empty() {
        let panel = queue(&view(0), &[]);

        assert!(panel.embed.unwrap().description.contains("La cola está vacía."));
    }

    #[test]
    fn test_search_results_numbering_follows_page() {
        let results = (1..=7).map(|i| track(&format!("T{i}"))).collect();
        let mut search =
            PendingSearch::new(results, GuildId::new(1), ChannelId::new(2), UserId::new(3));
        search.current_page = 1;

        let panel = search_results(&search);
        let embed = panel.embed.unwrap();

        assert!(embed.description.starts_with("`6.` **T6**"));
        assert_eq!(embed.footer.as_deref(), Some("Página 2/2 • 7 resultados"));
    }
}
