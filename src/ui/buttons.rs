use serenity::all::ButtonStyle;

use super::Button;
use crate::{audio::session::SessionView, cache::PendingSearch};

/// IDs personalizados para los botones
pub mod button_ids {
    pub const VOLUME_DOWN: &str = "np_voldown";
    pub const VOLUME_UP: &str = "np_volup";
    pub const SKIP: &str = "np_skip";
    pub const REPEAT: &str = "np_repeat";
    pub const QUEUE: &str = "np_queue";

    pub const SEARCH_SELECT_PREFIX: &str = "search_select:";
    pub const SEARCH_PREVIOUS: &str = "search_prev";
    pub const SEARCH_NEXT: &str = "search_next";
    pub const SEARCH_CANCEL: &str = "search_cancel";
}

/// Acción asociada a un botón del bot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonAction {
    VolumeDown,
    VolumeUp,
    Skip,
    CycleRepeat,
    ShowQueue,
    /// Índice dentro de la página visible
    SearchSelect(usize),
    SearchPrevious,
    SearchNext,
    SearchCancel,
}

impl ButtonAction {
    pub fn parse(custom_id: &str) -> Option<Self> {
        if let Some(index) = custom_id.strip_prefix(button_ids::SEARCH_SELECT_PREFIX) {
            return index.parse().ok().map(ButtonAction::SearchSelect);
        }

        let action = match custom_id {
            button_ids::VOLUME_DOWN => ButtonAction::VolumeDown,
            button_ids::VOLUME_UP => ButtonAction::VolumeUp,
            button_ids::SKIP => ButtonAction::Skip,
            button_ids::REPEAT => ButtonAction::CycleRepeat,
            button_ids::QUEUE => ButtonAction::ShowQueue,
            button_ids::SEARCH_PREVIOUS => ButtonAction::SearchPrevious,
            button_ids::SEARCH_NEXT => ButtonAction::SearchNext,
            button_ids::SEARCH_CANCEL => ButtonAction::SearchCancel,
            _ => return None,
        };
        Some(action)
    }

    /// Los botones de búsqueda dependen de la entrada del cache
    pub fn is_search(self) -> bool {
        matches!(
            self,
            ButtonAction::SearchSelect(_)
                | ButtonAction::SearchPrevious
                | ButtonAction::SearchNext
                | ButtonAction::SearchCancel
        )
    }
}

/// Controles del panel "Reproduciendo Ahora"
pub fn now_playing_controls(view: &SessionView) -> Vec<Vec<Button>> {
    let repeat_label = format!("{} Repetir", view.repeat.emoji());

    vec![vec![
        Button::new(button_ids::VOLUME_DOWN, "🔉 -10", ButtonStyle::Secondary)
            .disabled(view.volume == 0),
        Button::new(button_ids::SKIP, "⏭️ Saltar", ButtonStyle::Secondary),
        Button::new(button_ids::REPEAT, repeat_label, ButtonStyle::Secondary),
        Button::new(button_ids::VOLUME_UP, "🔊 +10", ButtonStyle::Secondary)
            .disabled(view.volume >= crate::audio::session::MAX_VOLUME),
        Button::new(button_ids::QUEUE, "📋 Cola", ButtonStyle::Secondary),
    ]]
}

/// Un botón numerado por resultado de la página más la navegación
pub fn search_controls(search: &PendingSearch) -> Vec<Vec<Button>> {
    let offset = search.page_offset();
    let picks = search
        .page_tracks()
        .iter()
        .enumerate()
        .map(|(i, _)| {
            Button::new(
                format!("{}{}", button_ids::SEARCH_SELECT_PREFIX, i),
                (offset + i + 1).to_string(),
                ButtonStyle::Primary,
            )
        })
        .collect();

    let navigation = vec![
        Button::new(button_ids::SEARCH_PREVIOUS, "◀️ Anterior", ButtonStyle::Secondary)
            .disabled(!search.has_previous()),
        Button::new(button_ids::SEARCH_NEXT, "Siguiente ▶️", ButtonStyle::Secondary)
            .disabled(!search.has_next()),
        Button::new(button_ids::SEARCH_CANCEL, "Cancelar", ButtonStyle::Danger),
    ];

    vec![picks, navigation]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{queue::RepeatMode, track::Track};
    use serenity::model::id::{ChannelId, GuildId, UserId};
    use std::time::Duration;

    #[test]
    fn test_parse_custom_ids() {
        assert_eq!(ButtonAction::parse("np_volup"), Some(ButtonAction::VolumeUp));
        assert_eq!(ButtonAction::parse("np_repeat"), Some(ButtonAction::CycleRepeat));
        assert_eq!(
            ButtonAction::parse("search_select:3"),
            Some(ButtonAction::SearchSelect(3))
        );
        assert_eq!(ButtonAction::parse("search_select:x"), None);
        assert_eq!(ButtonAction::parse("music_play_pause"), None);
        assert!(ButtonAction::SearchCancel.is_search());
        assert!(!ButtonAction::Skip.is_search());
    }

    #[test]
    fn test_volume_buttons_disable_at_bounds() {
        let mut view = SessionView {
            current: None,
            queue_len: 0,
            queue_duration: Duration::ZERO,
            repeat: RepeatMode::Off,
            volume: 100,
        };

        let rows = now_playing_controls(&view);
        assert!(!rows[0][0].disabled);
        assert!(rows[0][3].disabled);

        view.volume = 0;
        let rows = now_playing_controls(&view);
        assert!(rows[0][0].disabled);
        assert!(!rows[0][3].disabled);
    }

    #[test]
    fn test_search_controls_on_last_page() {
        let results = (1..=7)
            .map(|i| Track::new(format!("T{i}"), format!("https://example.com/{i}")))
            .collect();
        let mut search =
            PendingSearch::new(results, GuildId::new(1), ChannelId::new(2), UserId::new(3));
        search.current_page = 1;

        let rows = search_controls(&search);

        let labels: Vec<_> = rows[0].iter().map(|b| b.label.as_str()).collect();
        assert_eq!(labels, vec!["6", "7"]);
        assert_eq!(rows[0][1].custom_id, "search_select:1");
        assert!(!rows[1][0].disabled);
        assert!(rows[1][1].disabled);
    }
}
