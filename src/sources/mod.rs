pub mod youtube;

pub use youtube::YouTubeResolver;

/// Qué tipo de consulta escribió el usuario en `/play`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    Search,
    Track,
    Playlist,
}

/// Clasifica la consulta: texto libre, URL de una pista o URL de playlist
pub fn classify_query(query: &str) -> QueryKind {
    let Ok(url) = url::Url::parse(query.trim()) else {
        return QueryKind::Search;
    };

    if !matches!(url.scheme(), "http" | "https") {
        return QueryKind::Search;
    }

    let has_list = url.query_pairs().any(|(key, _)| key == "list");
    let has_video = url.query_pairs().any(|(key, _)| key == "v");

    // watch?v=...&list=... reproduce sólo el video
    if url.path().starts_with("/playlist") || url.path().contains("/sets/") || (has_list && !has_video)
    {
        QueryKind::Playlist
    } else {
        QueryKind::Track
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_classification() {
        assert_eq!(classify_query("never gonna give you up"), QueryKind::Search);
        assert_eq!(classify_query("ftp://example.com/song.mp3"), QueryKind::Search);
        assert_eq!(
            classify_query("https://www.youtube.com/watch?v=dQw4w9WgXcQ"),
            QueryKind::Track
        );
        assert_eq!(
            classify_query("https://www.youtube.com/watch?v=dQw4w9WgXcQ&list=RDdQw4w9WgXcQ"),
            QueryKind::Track
        );
        assert_eq!(
            classify_query("https://www.youtube.com/playlist?list=PL123"),
            QueryKind::Playlist
        );
        assert_eq!(
            classify_query("https://soundcloud.com/artist/sets/album"),
            QueryKind::Playlist
        );
        assert_eq!(classify_query("https://example.com/stream.mp3"), QueryKind::Track);
    }
}
