use rand::seq::SliceRandom;
use std::{collections::VecDeque, fmt, time::Duration};
use tracing::debug;

use super::track::Track;
use crate::error::{SessionError, SessionResult};

/// Política de repetición de la sesión.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RepeatMode {
    #[default]
    Off,
    One,
    All,
}

impl RepeatMode {
    /// Siguiente modo del botón de repetición: Off → One → All → Off
    pub fn cycle(self) -> Self {
        match self {
            RepeatMode::Off => RepeatMode::One,
            RepeatMode::One => RepeatMode::All,
            RepeatMode::All => RepeatMode::Off,
        }
    }

    /// Interpreta el valor de la opción `mode` del comando `/repeat`
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "off" => Some(RepeatMode::Off),
            "one" => Some(RepeatMode::One),
            "all" => Some(RepeatMode::All),
            _ => None,
        }
    }

    pub fn emoji(self) -> &'static str {
        match self {
            RepeatMode::Off => "➡️",
            RepeatMode::One => "🔂",
            RepeatMode::All => "🔁",
        }
    }
}

impl fmt::Display for RepeatMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RepeatMode::Off => "Desactivado",
            RepeatMode::One => "Una canción",
            RepeatMode::All => "Toda la cola",
        };
        f.write_str(label)
    }
}

/// Cola FIFO de una guild con la pista actual y la política de repetición.
///
/// No hace locking: [`GuildSession`](super::session::GuildSession) la envuelve
/// en su mutex y es la única que la muta.
#[derive(Debug, Default)]
pub struct TrackQueue {
    items: VecDeque<Track>,
    current: Option<Track>,
    repeat: RepeatMode,
}

impl TrackQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Agrega pistas al final respetando el orden
    pub fn enqueue<I>(&mut self, tracks: I) -> usize
    where
        I: IntoIterator<Item = Track>,
    {
        let before = self.items.len();
        self.items.extend(tracks);
        debug!("➕ {} pistas agregadas a la cola", self.items.len() - before);
        self.items.len()
    }

    /// Decide qué suena después de que termina (o se salta) la pista actual.
    ///
    /// - `One` con pista actual: la devuelve otra vez sin tocar la cola.
    /// - `All` con pista actual: la reencola al final antes de avanzar.
    /// - Cola vacía: limpia la pista actual y devuelve `None`.
    /// - En otro caso saca la cabeza de la cola y la vuelve actual.
    pub fn advance(&mut self) -> Option<Track> {
        if self.repeat == RepeatMode::One {
            if let Some(current) = &self.current {
                debug!("🔂 Repitiendo: {}", current.title);
                return Some(current.clone());
            }
        }

        if self.repeat == RepeatMode::All {
            if let Some(finished) = self.current.take() {
                debug!("🔁 Reencolando: {}", finished.title);
                self.items.push_back(finished);
            }
        }

        match self.items.pop_front() {
            Some(next) => {
                self.current = Some(next.clone());
                Some(next)
            }
            None => {
                self.current = None;
                None
            }
        }
    }

    /// Mueve la pista en `from` para que quede en `to` (ambas 1-based)
    pub fn move_track(&mut self, from: usize, to: usize) -> SessionResult<Track> {
        let len = self.items.len();
        self.check_position(from)?;
        self.check_position(to)?;

        let track = self
            .items
            .remove(from - 1)
            .ok_or(SessionError::InvalidIndex { position: from, len })?;
        self.items.insert(to - 1, track.clone());
        debug!("📍 Pista movida de {} a {}", from, to);

        Ok(track)
    }

    /// Elimina la pista en `position` (1-based)
    pub fn remove(&mut self, position: usize) -> SessionResult<Track> {
        self.check_position(position)?;
        let len = self.items.len();
        self.items
            .remove(position - 1)
            .ok_or(SessionError::InvalidIndex { position, len })
    }

    /// Mezcla la cola (Fisher-Yates); la pista actual no participa
    pub fn shuffle(&mut self) {
        let mut rng = rand::thread_rng();
        self.items.make_contiguous().shuffle(&mut rng);
    }

    /// Hasta `max_items` pistas desde la cabeza, para mostrar
    pub fn snapshot(&self, max_items: usize) -> Vec<Track> {
        self.items.iter().take(max_items).cloned().collect()
    }

    /// Vacía todo y vuelve a `Off`
    pub fn clear(&mut self) {
        self.items.clear();
        self.current = None;
        self.repeat = RepeatMode::Off;
    }

    pub fn set_current(&mut self, track: Option<Track>) {
        self.current = track;
    }

    pub fn current(&self) -> Option<&Track> {
        self.current.as_ref()
    }

    pub fn repeat(&self) -> RepeatMode {
        self.repeat
    }

    pub fn set_repeat(&mut self, mode: RepeatMode) {
        self.repeat = mode;
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Duración total de lo que queda en cola (sin streams)
    pub fn total_duration(&self) -> Duration {
        self.items
            .iter()
            .filter(|track| !track.is_stream)
            .map(Track::duration)
            .sum()
    }

    fn check_position(&self, position: usize) -> SessionResult<()> {
        let len = self.items.len();
        if position < 1 || position > len {
            return Err(SessionError::InvalidIndex { position, len });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn track(title: &str) -> Track {
        Track::new(title, format!("https://example.com/{title}"))
    }

    fn queue_of(titles: &[&str]) -> TrackQueue {
        let mut queue = TrackQueue::new();
        queue.enqueue(titles.iter().map(|t| track(t)));
        queue
    }

    fn titles(queue: &TrackQueue) -> Vec<String> {
        queue.snapshot(usize::MAX).into_iter().map(|t| t.title).collect()
    }

    #[test]
    fn test_advance_without_repeat_pops_in_order() {
        let mut queue = queue_of(&["A", "B", "C"]);

        assert_eq!(queue.advance().map(|t| t.title), Some("A".to_string()));
        assert_eq!(titles(&queue), vec!["B", "C"]);

        assert_eq!(queue.advance().map(|t| t.title), Some("B".to_string()));
        assert_eq!(titles(&queue), vec!["C"]);
        assert_eq!(queue.current().map(|t| t.title.as_str()), Some("B"));
    }

    #[test]
    fn test_advance_on_empty_queue_clears_current() {
        let mut queue = TrackQueue::new();
        queue.set_current(Some(track("T")));

        assert_eq!(queue.advance(), None);
        assert!(queue.current().is_none());
    }

    #[test]
    fn test_repeat_one_replays_current_without_shrinking() {
        let mut queue = queue_of(&["B", "C"]);
        queue.set_current(Some(track("A")));
        queue.set_repeat(RepeatMode::One);

        for _ in 0..5 {
            assert_eq!(queue.advance().map(|t| t.title), Some("A".to_string()));
            assert_eq!(queue.len(), 2);
        }
    }

    #[test]
    fn test_repeat_one_without_current_falls_through_to_queue() {
        let mut queue = queue_of(&["A"]);
        queue.set_repeat(RepeatMode::One);

        assert_eq!(queue.advance().map(|t| t.title), Some("A".to_string()));
        assert_eq!(queue.advance().map(|t| t.title), Some("A".to_string()));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_repeat_all_requeues_single_current() {
        let mut queue = TrackQueue::new();
        queue.set_current(Some(track("T")));
        queue.set_repeat(RepeatMode::All);

        assert_eq!(queue.advance().map(|t| t.title), Some("T".to_string()));
        assert!(queue.is_empty());
        assert_eq!(queue.current().map(|t| t.title.as_str()), Some("T"));
    }

    #[test]
    fn test_repeat_all_cycles_queue_indefinitely() {
        let mut queue = queue_of(&["A", "B", "C"]);
        queue.set_repeat(RepeatMode::All);

        let played: Vec<String> = (0..9)
            .filter_map(|_| queue.advance())
            .map(|t| t.title)
            .collect();
        assert_eq!(played, vec!["A", "B", "C", "A", "B", "C", "A", "B", "C"]);

        // Tras N llamadas más el estado vuelve a ser idéntico
        let before = (titles(&queue), queue.current().cloned());
        for _ in 0..3 {
            queue.advance();
        }
        assert_eq!((titles(&queue), queue.current().cloned()), before);
    }

    #[test]
    fn test_move_scenario_and_inverse() {
        let mut queue = queue_of(&["A", "B", "C"]);

        let moved = queue.move_track(1, 3).unwrap();
        assert_eq!(moved.title, "A");
        assert_eq!(titles(&queue), vec!["B", "C", "A"]);

        queue.move_track(3, 1).unwrap();
        assert_eq!(titles(&queue), vec!["A", "B", "C"]);
    }

    #[test]
    fn test_move_inverse_law_for_all_valid_pairs() {
        let original = ["A", "B", "C", "D", "E"];
        for from in 1..=original.len() {
            for to in 1..=original.len() {
                let mut queue = queue_of(&original);
                queue.move_track(from, to).unwrap();
                assert_eq!(queue.snapshot(5)[to - 1].title, original[from - 1]);
                queue.move_track(to, from).unwrap();
                assert_eq!(titles(&queue), original.to_vec(), "move({from},{to})");
            }
        }
    }

    #[test]
    fn test_move_out_of_range_is_rejected_without_mutation() {
        let mut queue = queue_of(&["A", "B", "C"]);

        assert_eq!(
            queue.move_track(0, 2),
            Err(SessionError::InvalidIndex { position: 0, len: 3 })
        );
        assert_eq!(
            queue.move_track(2, 4),
            Err(SessionError::InvalidIndex { position: 4, len: 3 })
        );
        assert_eq!(titles(&queue), vec!["A", "B", "C"]);
    }

    #[test]
    fn test_remove_bounds_and_result() {
        let mut queue = queue_of(&["A", "B", "C", "D"]);

        assert!(queue.remove(0).is_err());
        assert!(queue.remove(5).is_err());
        assert_eq!(queue.len(), 4);

        let removed = queue.remove(2).unwrap();
        assert_eq!(removed.title, "B");
        assert_eq!(titles(&queue), vec!["A", "C", "D"]);
    }

    #[test]
    fn test_shuffle_is_a_permutation_excluding_current() {
        let mut queue = queue_of(&["A", "B", "C", "D", "E", "F"]);
        queue.set_current(Some(track("X")));

        queue.shuffle();

        let mut shuffled = titles(&queue);
        shuffled.sort();
        assert_eq!(shuffled, vec!["A", "B", "C", "D", "E", "F"]);
        assert_eq!(queue.current().map(|t| t.title.as_str()), Some("X"));
    }

    #[test]
    fn test_snapshot_is_bounded_and_non_mutating() {
        let queue = queue_of(&["A", "B", "C"]);

        assert_eq!(queue.snapshot(2).len(), 2);
        assert_eq!(queue.snapshot(10).len(), 3);
        assert_eq!(queue.len(), 3);
    }

    #[test]
    fn test_repeat_mode_cycle_and_parse() {
        assert_eq!(RepeatMode::Off.cycle(), RepeatMode::One);
        assert_eq!(RepeatMode::One.cycle(), RepeatMode::All);
        assert_eq!(RepeatMode::All.cycle(), RepeatMode::Off);
        assert_eq!(RepeatMode::parse("ALL"), Some(RepeatMode::All));
        assert_eq!(RepeatMode::parse("loop"), None);
    }
}
