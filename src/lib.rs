//! Homework tutor backend: explains a photographed problem in text and speech.
pub mod config;
pub mod conversation;
pub mod genai;
pub mod handler;
pub mod media;
pub mod playback;
pub mod tutor;
