//! dubsync - Audio/Video Re-synchronization
//!
//! Aligns a replacement audio track (for example a translated dub) to a
//! video by cross-correlating it with the video's own audio, then remuxes
//! the untouched video stream with the shifted audio using ffmpeg.

pub mod cli;
pub mod config;
pub mod error;
pub mod job;
pub mod media;
pub mod audio;
pub mod align;
pub mod reference;
pub mod workflow;

pub use align::AlignmentResult;
pub use error::{Result, SyncError};
pub use job::{MediaFile, SyncJob};
pub use workflow::{SyncReport, Synchronizer};
