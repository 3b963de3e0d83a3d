//! Niko - voice turn controller for a persona assistant
//!
//! This library provides the core functionality for Niko:
//! - Turn control (listen, generate, speak, back to idle)
//! - Persona and tone instructions
//! - Gemini text generation
//! - `OpenAI` speech synthesis and Whisper transcription
//! - Microphone capture and speaker playback
//! - HTTP/WebSocket API for a front end
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                    Interfaces                        │
//! │        CLI (talk / serve)  │  HTTP + WebSocket       │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │                 Turn Controller                      │
//! │   idle → listening → processing → idle              │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │                   Services                           │
//! │  Capture  │  Gemini  │  OpenAI TTS  │  Audio sink   │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod api;
pub mod config;
pub mod controller;
pub mod error;
pub mod llm;
pub mod persona;
pub mod turn;
pub mod voice;

pub use config::Config;
pub use controller::{OverlapPolicy, Services, TurnController};
pub use error::{Error, Result, Stage};
pub use persona::{PersonaConfig, Tone};
pub use turn::{Turn, TurnEvent, TurnOutcome, TurnStatus};
