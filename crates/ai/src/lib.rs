#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::doc_markdown)]

//! # AI
//!
//! Generative AI integration for content classification.
//!
//! This crate provides:
//! - The [`AIProvider`] trait every endpoint client implements
//! - A Google Gemini provider ([`GeminiProvider`])
//! - Robust extraction of a JSON object from free-form model output
//!
//! ## Example
//!
//! ```rust,ignore
//! use ai::{AIMessage, AIProvider, GeminiProvider, GenerateOptions};
//!
//! let provider = GeminiProvider::new(std::env::var("GEMINI_API_KEY")?)?;
//! let response = provider
//!     .generate_text("gemini-3-flash-preview", &[AIMessage::user("Hi")], &GenerateOptions::default())
//!     .await?;
//! ```

pub mod error;
pub mod gemini;
pub mod provider;

pub use error::{AiError, AiResult};
pub use gemini::GeminiProvider;
pub use provider::{
    extract_json, parse_ai_response, AIMessage, AIProvider, AIResponse, AIRole, GenerateOptions,
    TokenUsage,
};
