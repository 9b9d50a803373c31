//! # Audio Module
//!
//! Per-guild playback state and the playback engine contract.
//!
//! ### [`track`] / [`queue`]
//! - Immutable [`Track`](track::Track) values and the FIFO queue with its repeat policy
//! - Pure algorithms: advance, move, remove, shuffle, snapshot
//!
//! ### [`session`]
//! - One [`GuildSession`](session::GuildSession) per guild behind a single lock
//! - Now-playing refresh loop and idle timer handles
//! - The process-wide [`SessionRegistry`](session::SessionRegistry)
//!
//! ### [`engine`] / [`songbird_engine`]
//! - The [`PlaybackEngine`](engine::PlaybackEngine) contract the bot drives
//! - A songbird implementation reporting track callbacks as
//!   [`EngineEvent`](engine::EngineEvent)s over a channel

pub mod engine;
pub mod queue;
pub mod session;
pub mod songbird_engine;
pub mod track;
