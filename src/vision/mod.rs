//! Scene description via a vision-language model.
//!
//! This module provides:
//! * [`Describer`] — async trait implemented by all description backends.
//! * [`OllamaDescriber`] — multimodal `/api/chat` call to a local Ollama
//!   server (Gemma 3 on the board).
//! * [`DescribeError`] — error variants for description calls.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use sightspeak::capture::CapturedFrame;
//! use sightspeak::config::AppConfig;
//! use sightspeak::vision::{Describer, OllamaDescriber};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = AppConfig::default();
//!     let describer = OllamaDescriber::from_config(&config.vision, "outputs");
//!
//!     let frame = CapturedFrame {
//!         path: "captures/capture_20250101_120000.png".into(),
//!         captured_at: std::time::SystemTime::now(),
//!     };
//!     let text = describer
//!         .describe(&frame, &config.vision.prompt)
//!         .await
//!         .unwrap();
//!     println!("{text}");
//! }
//! ```

pub mod describer;

pub use describer::{parse_chat_response, DescribeError, Describer, OllamaDescriber};
