use std::time::Duration;

/// Pista reproducible tal como la entrega el motor de reproducción.
///
/// Es un valor inmutable: se clona libremente entre la cola, la sesión y la UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    pub title: String,
    pub uri: String,
    pub duration_ms: u64,
    pub is_stream: bool,
    pub author: Option<String>,
    pub artwork_url: Option<String>,
    /// Identificador de la fuente (id de video), ver [`Track::source_id`]
    pub identifier: Option<String>,
}

impl Track {
    pub fn new(title: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            uri: uri.into(),
            duration_ms: 0,
            is_stream: false,
            author: None,
            artwork_url: None,
            identifier: None,
        }
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration_ms = duration.as_millis() as u64;
        self
    }

    pub fn with_author(mut self, author: String) -> Self {
        self.author = Some(author);
        self
    }

    pub fn with_artwork(mut self, artwork_url: String) -> Self {
        self.artwork_url = Some(artwork_url);
        self
    }

    pub fn with_identifier(mut self, identifier: String) -> Self {
        self.identifier = Some(identifier);
        self
    }

    pub fn live(mut self) -> Self {
        self.is_stream = true;
        self
    }

    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }

    /// Id de la fuente para logs; la URI si la fuente no dio uno
    pub fn source_id(&self) -> &str {
        self.identifier.as_deref().unwrap_or(&self.uri)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_id_prefers_identifier() {
        let track = Track::new("A", "https://youtu.be/abc123");
        assert_eq!(track.source_id(), "https://youtu.be/abc123");

        let track = track.with_identifier("abc123".to_string());
        assert_eq!(track.source_id(), "abc123");
    }
}
