//! Model adapter implementations for Joi.
//!
//! All adapters implement the `joi_core::ModelAdapter` trait.
//! The router selects the correct adapter for a session's model selector.

pub mod gemini;
mod http;
pub mod openai;
pub mod router;
pub mod sse;

pub use gemini::GeminiAdapter;
pub use openai::OpenAiAdapter;
pub use router::{AdapterRouter, build_from_config};
