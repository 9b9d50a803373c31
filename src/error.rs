//! # Error Types
//!
//! Errores del núcleo de sesiones. Los adaptadores (serenity, songbird, yt-dlp)
//! usan `anyhow`; al cruzar hacia el orquestador se convierten en
//! [`SessionError::Collaborator`] para que decida qué responderle al usuario.

use thiserror::Error;

/// Errores que pueden producir las operaciones de cola y de búsqueda.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Posición 1-based fuera de `[1, len]`.
    #[error("posición {position} fuera de rango (la cola tiene {len} canciones)")]
    InvalidIndex { position: usize, len: usize },

    /// No hay nada sobre lo que actuar (búsqueda expirada, nada sonando).
    #[error("no encontrado")]
    NotFound,

    /// La interacción viene de un usuario distinto al que inició la búsqueda.
    #[error("la búsqueda pertenece a otro usuario")]
    Unauthorized,

    /// Falló una llamada a un colaborador externo (chat, motor, voz).
    #[error("error de colaborador: {0}")]
    Collaborator(String),
}

impl From<anyhow::Error> for SessionError {
    fn from(err: anyhow::Error) -> Self {
        Self::Collaborator(format!("{err:#}"))
    }
}

pub type SessionResult<T> = std::result::Result<T, SessionError>;
