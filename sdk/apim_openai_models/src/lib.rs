//! # apim_openai_models
//!
//! Chat completions for Azure OpenAI deployments reached through an API
//! Management gateway, built on [`apim_openai_core`].
//!
//! - [`chat`] - request/response types, [`chat::complete`] and [`chat::complete_stream`]
//! - [`stream`] - Server-Sent Events decoding and chunk types

pub mod chat;
pub mod stream;
