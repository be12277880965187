//! # docchat
//!
//! A session-scoped streaming document Q&A pipeline: upload a document,
//! obtain an opaque session handle, then ask natural-language questions
//! whose answers stream back token-by-token.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌───────────────┐   ┌──────────────┐
//! │ SessionStore │──▶│ Query builder │──▶│  Streaming   │──▶ backend
//! │  (handle)    │   │ (validation)  │   │    proxy     │◀── stream
//! └──────────────┘   └───────────────┘   └──────┬───────┘
//!                                               │ bytes, unbuffered
//!                                        ┌──────▼───────┐
//!                                        │ FrameParser  │
//!                                        │ +Accumulator │
//!                                        └──────┬───────┘
//!                                        ┌──────▼───────┐
//!                                        │  Submission  │──▶ presentation
//!                                        │  controller  │
//!                                        └──────────────┘
//! ```
//!
//! One query is in flight at a time; submitting again cancels the previous
//! read loop. The frame parser reassembles `data:` lines no matter how the
//! transport fragments the bytes, and every decoded payload is surfaced
//! immediately for incremental rendering.
//!
//! ## Quick Start
//!
//! ```bash
//! docchat serve                     # start the streaming proxy
//! docchat upload statement.pdf      # upload, persist the session handle
//! docchat ask "what is the total?"  # stream an answer to stdout
//! docchat reset                     # clear the session handle
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`error`] | submission error taxonomy |
//! | [`session`] | durable session-handle store |
//! | [`query`] | query types and request validation |
//! | [`frame`] | incremental frame parser and answer accumulator |
//! | [`transport`] | query transport seam and HTTP implementation |
//! | [`submit`] | submission state machine and cancellation |
//! | [`server`] | streaming proxy HTTP server |
//! | [`upload`] | upload client for the extraction endpoint |

pub mod config;
pub mod error;
pub mod frame;
pub mod query;
pub mod server;
pub mod session;
pub mod submit;
pub mod transport;
pub mod upload;
