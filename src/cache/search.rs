use dashmap::DashMap;
use serenity::model::id::{ChannelId, GuildId, MessageId, UserId};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

use crate::{
    audio::track::Track,
    error::{SessionError, SessionResult},
};

/// Resultados por página del panel de búsqueda
pub const PAGE_SIZE: usize = 5;

/// Resultados de una búsqueda esperando que el usuario elija
#[derive(Debug, Clone, PartialEq)]
pub struct PendingSearch {
    pub results: Vec<Track>,
    pub current_page: usize,
    pub guild_id: GuildId,
    pub channel_id: ChannelId,
    pub user_id: UserId,
    pub created_at: Instant,
}

impl PendingSearch {
    pub fn new(results: Vec<Track>, guild_id: GuildId, channel_id: ChannelId, user_id: UserId) -> Self {
        Self {
            results,
            current_page: 0,
            guild_id,
            channel_id,
            user_id,
            created_at: Instant::now(),
        }
    }

    pub fn total_pages(&self) -> usize {
        self.results.len().div_ceil(PAGE_SIZE)
    }

    /// Pistas de la página actual; vacío si la página quedó fuera de rango
    pub fn page_tracks(&self) -> &[Track] {
        let start = self.current_page * PAGE_SIZE;
        if start >= self.results.len() {
            return &[];
        }
        let end = (start + PAGE_SIZE).min(self.results.len());
        &self.results[start..end]
    }

    /// Posición global (0-based) del primer resultado de la página
    pub fn page_offset(&self) -> usize {
        self.current_page * PAGE_SIZE
    }

    pub fn has_previous(&self) -> bool {
        self.current_page > 0
    }

    pub fn has_next(&self) -> bool {
        self.current_page + 1 < self.total_pages()
    }

    fn is_expired(&self, ttl: Duration) -> bool {
        self.created_at.elapsed() > ttl
    }
}

/// Búsquedas pendientes indexadas por el id del mensaje que las muestra.
///
/// La expiración es perezosa: cada `put` barre las entradas vencidas, así que
/// una entrada vencida puede seguir respondiendo a `get` hasta el próximo `put`.
#[derive(Debug)]
pub struct SearchCache {
    entries: DashMap<MessageId, PendingSearch>,
    ttl: Duration,
}

impl SearchCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    /// Barre las entradas vencidas y guarda la nueva
    pub fn put(&self, key: MessageId, search: PendingSearch) {
        let ttl = self.ttl;
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(ttl));
        let swept = before - self.entries.len();
        if swept > 0 {
            debug!("🧹 {} búsquedas expiradas eliminadas", swept);
        }

        self.entries.insert(key, search);
    }

    pub fn get(&self, key: MessageId) -> Option<PendingSearch> {
        self.entries.get(&key).map(|entry| entry.clone())
    }

    pub fn delete(&self, key: MessageId) -> bool {
        self.entries.remove(&key).is_some()
    }

    /// Busca la entrada y verifica que la interacción venga de quien buscó
    pub fn authorize(&self, key: MessageId, user_id: UserId) -> SessionResult<PendingSearch> {
        let search = self.get(key).ok_or(SessionError::NotFound)?;
        if search.user_id != user_id {
            return Err(SessionError::Unauthorized);
        }
        Ok(search)
    }

    pub fn next_page(&self, key: MessageId) -> Option<PendingSearch> {
        let mut entry = self.entries.get_mut(&key)?;
        if entry.has_next() {
            entry.current_page += 1;
        }
        Some(entry.clone())
    }

    pub fn previous_page(&self, key: MessageId) -> Option<PendingSearch> {
        let mut entry = self.entries.get_mut(&key)?;
        if entry.has_previous() {
            entry.current_page -= 1;
        }
        Some(entry.clone())
    }

    /// Resuelve el botón `index` de la página actual y consume la búsqueda.
    /// Un índice fuera de la página no consume nada.
    pub fn select(&self, key: MessageId, user_id: UserId, index: usize) -> SessionResult<Track> {
        let track = {
            let entry = self.entries.get(&key).ok_or(SessionError::NotFound)?;
            if entry.user_id != user_id {
                return Err(SessionError::Unauthorized);
            }
            let position = entry.page_offset() + index;
            entry
                .results
                .get(position)
                .cloned()
                .ok_or(SessionError::InvalidIndex {
                    position: position + 1,
                    len: entry.results.len(),
                })?
        };

        // Dos clics simultáneos: sólo el primero se lleva la pista
        self.entries
            .remove(&key)
            .map(|_| track)
            .ok_or(SessionError::NotFound)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const TTL: Duration = Duration::from_secs(300);

    fn results(count: usize) -> Vec<Track> {
        (1..=count)
            .map(|i| Track::new(format!("T{i}"), format!("https://example.com/{i}")))
            .collect()
    }

    fn pending(count: usize, user: u64) -> PendingSearch {
        PendingSearch::new(
            results(count),
            GuildId::new(1),
            ChannelId::new(2),
            UserId::new(user),
        )
    }

    fn titles(tracks: &[Track]) -> Vec<&str> {
        tracks.iter().map(|t| t.title.as_str()).collect()
    }

    #[test]
    fn test_pagination_of_seven_results() {
        let mut search = pending(7, 1);

        assert_eq!(search.total_pages(), 2);
        assert_eq!(titles(search.page_tracks()), vec!["T1", "T2", "T3", "T4", "T5"]);

        search.current_page = 1;
        assert_eq!(titles(search.page_tracks()), vec!["T6", "T7"]);

        search.current_page = 2;
        assert!(search.page_tracks().is_empty());
    }

    #[test]
    fn test_total_pages_edges() {
        assert_eq!(pending(0, 1).total_pages(), 0);
        assert_eq!(pending(5, 1).total_pages(), 1);
        assert_eq!(pending(6, 1).total_pages(), 2);
        assert_eq!(pending(10, 1).total_pages(), 2);
    }

    #[test]
    fn test_page_navigation_stays_in_bounds() {
        let cache = SearchCache::new(TTL);
        let key = MessageId::new(100);
        cache.put(key, pending(7, 1));

        assert_eq!(cache.previous_page(key).unwrap().current_page, 0);
        assert_eq!(cache.next_page(key).unwrap().current_page, 1);
        assert_eq!(cache.next_page(key).unwrap().current_page, 1);
        assert_eq!(cache.previous_page(key).unwrap().current_page, 0);
        assert!(cache.next_page(MessageId::new(999)).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_entries_are_swept_on_put() {
        let cache = SearchCache::new(TTL);
        cache.put(MessageId::new(1), pending(3, 1));

        tokio::time::advance(Duration::from_secs(301)).await;

        // Antes del siguiente put la entrada vencida sigue visible
        assert!(cache.get(MessageId::new(1)).is_some());

        cache.put(MessageId::new(2), pending(3, 1));
        assert!(cache.get(MessageId::new(1)).is_none());
        assert!(cache.get(MessageId::new(2)).is_some());
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fresh_entries_survive_sweep() {
        let cache = SearchCache::new(TTL);
        cache.put(MessageId::new(1), pending(3, 1));

        tokio::time::advance(Duration::from_secs(120)).await;
        cache.put(MessageId::new(2), pending(3, 1));

        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_other_user_is_rejected_without_mutation() {
        let cache = SearchCache::new(TTL);
        let key = MessageId::new(100);
        cache.put(key, pending(7, 1));

        assert_eq!(cache.authorize(key, UserId::new(2)).unwrap_err(), SessionError::Unauthorized);
        assert_eq!(cache.select(key, UserId::new(2), 0), Err(SessionError::Unauthorized));
        assert!(cache.get(key).is_some());
    }

    #[test]
    fn test_missing_entry_is_not_found() {
        let cache = SearchCache::new(TTL);

        assert_eq!(
            cache.authorize(MessageId::new(1), UserId::new(1)).unwrap_err(),
            SessionError::NotFound
        );
        assert_eq!(cache.select(MessageId::new(1), UserId::new(1), 0), Err(SessionError::NotFound));
    }

    #[test]
    fn test_select_is_page_relative_and_consumes_entry() {
        let cache = SearchCache::new(TTL);
        let key = MessageId::new(100);
        cache.put(key, pending(7, 1));
        cache.next_page(key);

        let track = cache.select(key, UserId::new(1), 1).unwrap();

        assert_eq!(track.title, "T7");
        assert!(cache.get(key).is_none());
    }

    #[test]
    fn test_select_out_of_page_keeps_entry() {
        let cache = SearchCache::new(TTL);
        let key = MessageId::new(100);
        cache.put(key, pending(7, 1));
        cache.next_page(key);

        assert!(matches!(
            cache.select(key, UserId::new(1), 3),
            Err(SessionError::InvalidIndex { position: 9, len: 7 })
        ));
        assert!(cache.get(key).is_some());
    }

    #[test]
    fn test_delete() {
        let cache = SearchCache::new(TTL);
        cache.put(MessageId::new(1), pending(1, 1));

        assert!(cache.delete(MessageId::new(1)));
        assert!(!cache.delete(MessageId::new(1)));
    }
}
