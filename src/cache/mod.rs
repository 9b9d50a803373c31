//! # Cache Module
//!
//! Transient search-result cache for the `/play` search panel.
//!
//! A free-text `/play` answers with a paginated list of results. The list is kept
//! in a [`SearchCache`] keyed by the id of the reply message, so the panel's
//! buttons (select, previous, next, cancel) can find it again. Entries belong to
//! the user who searched and expire after a TTL (5 minutes by default).
//!
//! ## Expiration
//!
//! Eviction is lazy: expired entries are swept on every insert. Between inserts
//! an expired entry may still be returned; this window is accepted.
//!
//! ```env
//! SEARCH_TTL=5m               # Time-to-live of a pending search
//! SEARCH_RESULTS=10           # Results requested per search
//! ```

pub mod search;

pub use search::{PendingSearch, SearchCache, PAGE_SIZE};
