//! # Guild Sessions
//!
//! One [`GuildSession`] per guild holds the queue, the repeat policy, the volume
//! and the handles of the transient UI/timer resources (now-playing refresh loop
//! and idle timer). Every field lives behind a single `parking_lot::Mutex` that is
//! only held for in-memory work, never across an `.await`.
//!
//! Timers are represented by a [`TimerGuard`]: a `CancellationToken` plus a
//! generation number. Arming a timer cancels the previous token of the same kind,
//! and a firing timer must [`claim`](GuildSession::claim_idle) its generation
//! under the lock before acting, so a superseded timer can never take effect.
//!
//! The [`SessionRegistry`] maps guilds to sessions. Sessions are created lazily
//! and never removed: idle sessions are cleared in place and reused.

use dashmap::DashMap;
use parking_lot::Mutex;
use serenity::model::id::{ChannelId, GuildId, MessageId};
use std::{sync::Arc, time::Duration};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::{
    queue::{RepeatMode, TrackQueue},
    track::Track,
};
use crate::error::SessionResult;

pub const MAX_VOLUME: u8 = 100;

/// Referencia a un mensaje publicado por el bot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageRef {
    pub channel_id: ChannelId,
    pub message_id: MessageId,
}

/// Token de cancelación + generación de un timer armado
#[derive(Debug, Clone)]
pub struct TimerGuard {
    pub token: CancellationToken,
    pub generation: u64,
}

#[derive(Debug, Default)]
struct TimerSlot {
    token: Option<CancellationToken>,
    generation: u64,
}

impl TimerSlot {
    fn arm(&mut self) -> TimerGuard {
        self.cancel();
        self.generation += 1;
        let token = CancellationToken::new();
        self.token = Some(token.clone());
        TimerGuard {
            token,
            generation: self.generation,
        }
    }

    /// Idempotente: cancelar un slot vacío no hace nada
    fn cancel(&mut self) -> bool {
        match self.token.take() {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    fn claim(&mut self, generation: u64) -> bool {
        let current = self.generation == generation
            && self
                .token
                .as_ref()
                .is_some_and(|token| !token.is_cancelled());
        if current {
            self.token = None;
        }
        current
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation == generation
            && self
                .token
                .as_ref()
                .is_some_and(|token| !token.is_cancelled())
    }

    fn is_active(&self) -> bool {
        self.token.is_some()
    }
}

#[derive(Debug)]
struct SessionState {
    queue: TrackQueue,
    volume: u8,
    text_channel: Option<ChannelId>,
    now_playing_message: Option<MessageRef>,
    refresh: TimerSlot,
    idle_message: Option<MessageRef>,
    idle: TimerSlot,
}

impl SessionState {
    fn new(volume: u8) -> Self {
        Self {
            queue: TrackQueue::new(),
            volume,
            text_channel: None,
            now_playing_message: None,
            refresh: TimerSlot::default(),
            idle_message: None,
            idle: TimerSlot::default(),
        }
    }
}

/// Foto consistente del estado para renderizar paneles
#[derive(Debug, Clone, PartialEq)]
pub struct SessionView {
    pub current: Option<Track>,
    pub queue_len: usize,
    pub queue_duration: Duration,
    pub repeat: RepeatMode,
    pub volume: u8,
}

/// Estado de reproducción de una guild.
#[derive(Debug)]
pub struct GuildSession {
    guild_id: GuildId,
    default_volume: u8,
    state: Mutex<SessionState>,
}

impl GuildSession {
    pub fn new(guild_id: GuildId, default_volume: u8) -> Self {
        let default_volume = default_volume.min(MAX_VOLUME);
        Self {
            guild_id,
            default_volume,
            state: Mutex::new(SessionState::new(default_volume)),
        }
    }

    pub fn guild_id(&self) -> GuildId {
        self.guild_id
    }

    // Cola

    /// Agrega pistas al final; devuelve el nuevo largo de la cola
    pub fn enqueue<I>(&self, tracks: I) -> usize
    where
        I: IntoIterator<Item = Track>,
    {
        self.state.lock().queue.enqueue(tracks)
    }

    /// Única autoridad sobre "qué suena después". Si no queda nada también
    /// detiene el loop de refresco, ya que no hay pista actual que mostrar.
    pub fn advance(&self) -> Option<Track> {
        let mut state = self.state.lock();
        let next = state.queue.advance();
        if next.is_none() && state.refresh.cancel() {
            debug!("⏹️ Loop de refresco detenido: cola agotada en {}", self.guild_id);
        }
        next
    }

    pub fn move_track(&self, from: usize, to: usize) -> SessionResult<Track> {
        self.state.lock().queue.move_track(from, to)
    }

    pub fn remove(&self, position: usize) -> SessionResult<Track> {
        self.state.lock().queue.remove(position)
    }

    /// Mezcla la cola y devuelve cuántas pistas tiene
    pub fn shuffle(&self) -> usize {
        let mut state = self.state.lock();
        state.queue.shuffle();
        state.queue.len()
    }

    pub fn snapshot(&self, max_items: usize) -> Vec<Track> {
        self.state.lock().queue.snapshot(max_items)
    }

    pub fn queue_len(&self) -> usize {
        self.state.lock().queue.len()
    }

    pub fn current(&self) -> Option<Track> {
        self.state.lock().queue.current().cloned()
    }

    pub fn set_current(&self, track: Option<Track>) {
        let mut state = self.state.lock();
        if track.is_none() {
            state.refresh.cancel();
        }
        state.queue.set_current(track);
    }

    pub fn set_repeat(&self, mode: RepeatMode) {
        self.state.lock().queue.set_repeat(mode);
    }

    /// Avanza el modo de repetición y devuelve el nuevo
    pub fn cycle_repeat(&self) -> RepeatMode {
        let mut state = self.state.lock();
        let next = state.queue.repeat().cycle();
        state.queue.set_repeat(next);
        next
    }

    pub fn volume(&self) -> u8 {
        self.state.lock().volume
    }

    pub fn set_volume(&self, volume: u8) -> u8 {
        let mut state = self.state.lock();
        state.volume = volume.min(MAX_VOLUME);
        state.volume
    }

    /// Suma `delta` saturando en 0..=100
    pub fn adjust_volume(&self, delta: i16) -> u8 {
        let mut state = self.state.lock();
        let volume = (i16::from(state.volume) + delta).clamp(0, i16::from(MAX_VOLUME));
        state.volume = volume as u8;
        state.volume
    }

    pub fn text_channel(&self) -> Option<ChannelId> {
        self.state.lock().text_channel
    }

    pub fn bind_text_channel(&self, channel_id: ChannelId) {
        self.state.lock().text_channel = Some(channel_id);
    }

    pub fn view(&self) -> SessionView {
        let state = self.state.lock();
        SessionView {
            current: state.queue.current().cloned(),
            queue_len: state.queue.len(),
            queue_duration: state.queue.total_duration(),
            repeat: state.queue.repeat(),
            volume: state.volume,
        }
    }

    // Now playing

    /// Arma un nuevo loop de refresco cancelando el anterior
    pub fn arm_refresh(&self, message: MessageRef) -> TimerGuard {
        let mut state = self.state.lock();
        state.now_playing_message = Some(message);
        state.refresh.arm()
    }

    /// Detiene el loop y se queda con el mensaje para borrarlo (idempotente)
    pub fn take_now_playing(&self) -> Option<MessageRef> {
        let mut state = self.state.lock();
        state.refresh.cancel();
        state.now_playing_message.take()
    }

    pub fn now_playing_message(&self) -> Option<MessageRef> {
        self.state.lock().now_playing_message
    }

    /// Lo que necesita un tick del loop: mensaje y pista, sólo si el loop sigue vigente
    pub fn refresh_target(&self, generation: u64) -> Option<(MessageRef, Track)> {
        let state = self.state.lock();
        if !state.refresh.is_current(generation) {
            return None;
        }
        let message = state.now_playing_message?;
        let track = state.queue.current().cloned()?;
        Some((message, track))
    }

    pub fn is_refreshing(&self) -> bool {
        self.state.lock().refresh.is_active()
    }

    // Idle

    /// Arma el timer de inactividad reemplazando cualquier timer previo
    pub fn arm_idle(&self, notice: Option<MessageRef>) -> TimerGuard {
        let mut state = self.state.lock();
        state.idle_message = notice;
        state.idle.arm()
    }

    pub fn cancel_idle(&self) -> bool {
        self.state.lock().idle.cancel()
    }

    pub fn take_idle_notice(&self) -> Option<MessageRef> {
        self.state.lock().idle_message.take()
    }

    /// El timer que dispara reclama su generación; falla si fue cancelado o reemplazado
    pub fn claim_idle(&self, generation: u64) -> bool {
        self.state.lock().idle.claim(generation)
    }

    pub fn is_idle_armed(&self) -> bool {
        self.state.lock().idle.is_active()
    }

    /// Vuelve la sesión a su estado inicial: vacía la cola, resetea pista actual,
    /// repetición y volumen, y cancela ambos timers. Devuelve los paneles que
    /// quedaron publicados para que el llamador los borre.
    pub fn clear(&self) -> Vec<MessageRef> {
        let mut state = self.state.lock();
        state.refresh.cancel();
        state.idle.cancel();
        state.queue.clear();
        state.volume = self.default_volume;

        let leftovers = [state.now_playing_message.take(), state.idle_message.take()]
            .into_iter()
            .flatten()
            .collect();
        info!("🗑️ Sesión limpiada en guild {}", self.guild_id);
        leftovers
    }
}

/// Registro global guild → sesión.
#[derive(Debug)]
pub struct SessionRegistry {
    sessions: DashMap<GuildId, Arc<GuildSession>>,
    default_volume: u8,
}

impl SessionRegistry {
    pub fn new(default_volume: u8) -> Self {
        Self {
            sessions: DashMap::new(),
            default_volume,
        }
    }

    /// Devuelve la sesión existente o crea una nueva de forma atómica.
    /// El lock del shard se suelta antes de devolver el `Arc`.
    pub fn get_or_create(&self, guild_id: GuildId) -> Arc<GuildSession> {
        self.sessions
            .entry(guild_id)
            .or_insert_with(|| {
                debug!("🆕 Sesión creada para guild {}", guild_id);
                Arc::new(GuildSession::new(guild_id, self.default_volume))
            })
            .clone()
    }

    pub fn get(&self, guild_id: GuildId) -> Option<Arc<GuildSession>> {
        self.sessions.get(&guild_id).map(|session| session.clone())
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn guild() -> GuildId {
        GuildId::new(1)
    }

    fn message(id: u64) -> MessageRef {
        MessageRef {
            channel_id: ChannelId::new(10),
            message_id: MessageId::new(id),
        }
    }

    fn track(title: &str) -> Track {
        Track::new(title, format!("https://example.com/{title}"))
    }

    #[test]
    fn test_new_session_defaults() {
        let session = GuildSession::new(guild(), 50);
        let view = session.view();

        assert_eq!(view.volume, 50);
        assert_eq!(view.queue_len, 0);
        assert_eq!(view.repeat, RepeatMode::Off);
        assert!(view.current.is_none());
        assert!(!session.is_refreshing());
        assert!(!session.is_idle_armed());
    }

    #[test]
    fn test_arming_refresh_cancels_previous_loop() {
        let session = GuildSession::new(guild(), 50);

        let first = session.arm_refresh(message(1));
        let second = session.arm_refresh(message(2));

        assert!(first.token.is_cancelled());
        assert!(!second.token.is_cancelled());
        assert_eq!(session.now_playing_message(), Some(message(2)));
    }

    #[test]
    fn test_take_now_playing_is_idempotent() {
        let session = GuildSession::new(guild(), 50);
        let guard = session.arm_refresh(message(1));

        assert_eq!(session.take_now_playing(), Some(message(1)));
        assert_eq!(session.take_now_playing(), None);
        assert!(guard.token.is_cancelled());
        assert!(!session.is_refreshing());
    }

    #[test]
    fn test_exhausted_advance_stops_refresh_loop() {
        let session = GuildSession::new(guild(), 50);
        session.set_current(Some(track("A")));
        let guard = session.arm_refresh(message(1));

        assert_eq!(session.advance(), None);
        assert!(guard.token.is_cancelled());
        assert!(session.current().is_none());
    }

    #[test]
    fn test_refresh_target_requires_current_generation() {
        let session = GuildSession::new(guild(), 50);
        session.set_current(Some(track("A")));
        let stale = session.arm_refresh(message(1));
        let fresh = session.arm_refresh(message(2));

        assert!(session.refresh_target(stale.generation).is_none());
        let (msg, current) = session.refresh_target(fresh.generation).unwrap();
        assert_eq!(msg, message(2));
        assert_eq!(current.title, "A");
    }

    #[test]
    fn test_superseded_idle_timer_cannot_claim() {
        let session = GuildSession::new(guild(), 50);

        let first = session.arm_idle(None);
        let second = session.arm_idle(Some(message(3)));

        assert!(first.token.is_cancelled());
        assert!(!session.claim_idle(first.generation));
        assert!(session.claim_idle(second.generation));
        // Una sola vez
        assert!(!session.claim_idle(second.generation));
    }

    #[test]
    fn test_cancelled_idle_timer_cannot_claim() {
        let session = GuildSession::new(guild(), 50);
        let guard = session.arm_idle(None);

        assert!(session.cancel_idle());
        assert!(!session.cancel_idle());
        assert!(!session.claim_idle(guard.generation));
    }

    #[test]
    fn test_clear_resets_everything_and_returns_panels() {
        let session = GuildSession::new(guild(), 50);
        session.enqueue(vec![track("A"), track("B")]);
        session.set_current(Some(track("X")));
        session.set_repeat(RepeatMode::All);
        session.set_volume(80);
        let refresh = session.arm_refresh(message(1));
        let idle = session.arm_idle(Some(message(2)));

        let leftovers = session.clear();

        assert_eq!(leftovers, vec![message(1), message(2)]);
        assert!(refresh.token.is_cancelled());
        assert!(idle.token.is_cancelled());
        let view = session.view();
        assert_eq!(view.queue_len, 0);
        assert!(view.current.is_none());
        assert_eq!(view.repeat, RepeatMode::Off);
        assert_eq!(view.volume, 50);
    }

    #[test]
    fn test_volume_is_clamped() {
        let session = GuildSession::new(guild(), 50);

        assert_eq!(session.set_volume(150), 100);
        assert_eq!(session.adjust_volume(10), 100);
        session.set_volume(5);
        assert_eq!(session.adjust_volume(-10), 0);
        assert_eq!(session.adjust_volume(10), 10);
    }

    #[test]
    fn test_registry_returns_same_session() {
        let registry = SessionRegistry::new(50);

        let a = registry.get_or_create(guild());
        let b = registry.get_or_create(guild());

        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.len(), 1);
        assert!(registry.get(GuildId::new(2)).is_none());
    }

    #[test]
    fn test_registry_concurrent_creation_yields_one_session() {
        let registry = Arc::new(SessionRegistry::new(50));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = registry.clone();
                std::thread::spawn(move || registry.get_or_create(guild()))
            })
            .collect();
        let sessions: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(registry.len(), 1);
        assert!(sessions.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    }
}
