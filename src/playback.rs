//! Explicit playback handle: whoever drives audio owns one and passes it by reference.
//!
//! Playing a new clip always stops the current one first, so at most one clip is
//! audible per session.
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use crate::media::data_uri::{DataUri, DataUriError};

type Result<T> = std::result::Result<T, PlaybackError>;

#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("Invalid audio URI: {0}")]
    InvalidUri(#[from] DataUriError),

    #[error("Cannot play {mime_type}, expected audio")]
    NotAudio { mime_type: String },

    #[error("Audio sink failed: {0}")]
    Sink(#[from] io::Error),
}

/// Something that can render one clip at a time.
pub trait AudioSink {
    fn start(&mut self, clip: &DataUri) -> io::Result<()>;

    fn halt(&mut self) -> io::Result<()>;
}

pub struct PlaybackSession<S> {
    sink: S,
    current: Option<String>,
}

impl<S: AudioSink> PlaybackSession<S> {
    pub fn new(sink: S) -> Self {
        Self { sink, current: None }
    }

    /// Stops whatever is playing and starts `uri`.
    pub fn play(&mut self, uri: &str) -> Result<()> {
        let clip: DataUri = uri.parse()?;
        if !clip.essence().starts_with("audio/") {
            return Err(PlaybackError::NotAudio {
                mime_type: clip.mime_type().to_string(),
            });
        }

        self.stop()?;

        self.sink.start(&clip)?;
        debug!("Playing {} bytes of {}", clip.data().len(), clip.mime_type());
        self.current = Some(clip.mime_type().to_string());

        Ok(())
    }

    pub fn stop(&mut self) -> Result<()> {
        if self.current.take().is_some() {
            self.sink.halt()?;
        }

        Ok(())
    }

    pub fn is_playing(&self) -> bool {
        self.current.is_some()
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }
}

/// Writes the current clip to a file for an external player to pick up; stopping removes it.
pub struct WavFileSink {
    path: PathBuf,
}

impl WavFileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AudioSink for WavFileSink {
    fn start(&mut self, clip: &DataUri) -> io::Result<()> {
        std::fs::write(&self.path, clip.data())
    }

    fn halt(&mut self) -> io::Result<()> {
        match std::fs::remove_file(&self.path) {
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }
}
