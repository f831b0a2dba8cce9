//! # brandgraph-inference
//!
//! External-collaborator gateways for brandgraph: embedding generation,
//! candidate extraction, and node-pair relation inference over an
//! Ollama-compatible HTTP API, plus deterministic mocks for tests.
//!
//! Backends are constructed once at process start (from explicit config or
//! the environment) and passed into components as trait objects — nothing
//! in this crate holds ambient global state.

pub mod extraction;
pub mod pair_inference;

#[cfg(feature = "ollama")]
pub mod ollama;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

// Re-export core types
pub use brandgraph_core::*;

pub use extraction::{extraction_prompt, parse_extraction_response};
pub use pair_inference::{parse_relation_response, relation_prompt};

#[cfg(feature = "ollama")]
pub use ollama::OllamaBackend;

#[cfg(any(test, feature = "mock"))]
pub use mock::{MockDocumentGate, MockInference};
