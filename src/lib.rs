//! # Winkeyd - UDP bridge daemon for WinKeyer-compatible CW keyers
//!
//! Winkeyd translates a simple text/escape-command UDP protocol used by Morse
//! keying clients into the byte-level command/status protocol of a
//! serial-attached WinKeyer-compatible keyer module, and feeds the keyer's
//! status stream back to clients as flow control and echoed characters.
//!
//! ## Features
//!
//! - **Escape Commands**: Speed, weighting, PTT lead-in, timed tune, and
//!   stop/abort over single UDP datagrams.
//! - **Text Keying**: Plain Morse text with inline `+`/`-` speed nudges,
//!   prosign merges, and `~` word-gap spans.
//! - **Flow Control**: Honors the keyer's buffer-2/3-full (xoff) status so the
//!   hardware buffer is never overrun.
//! - **Multi-Client Echo**: Characters echoed by the keyer are broadcast to
//!   every client seen so far, each send bounded by a timeout.
//! - **Daemon Mode**: Background service support (Unix) with pid file and
//!   TTY-aware logging.
//! - **Async Design**: Single cooperative Tokio task; strict per-iteration
//!   ordering keeps the wire protocol deterministic.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use winkeyd::bridge::Bridge;
//! use winkeyd::config::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.toml").await?;
//!     let mut bridge = Bridge::new(config).await?;
//!     bridge.connect_device(None)?;
//!     bridge.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! - [`bridge`] - The bridge engine: datagram parsing, text encoding, the
//!   outgoing queue, keyer state, and the event loop
//! - [`keyer`] - Serial keyer device link, command builders, status decoding
//! - [`config`] - Configuration management
//! - [`logutil`] - Log sanitization helpers
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │  UDP clients    │ ← text + escape commands, echo datagrams back
//! └─────────────────┘
//!          │
//! ┌─────────────────┐
//! │   Bridge loop   │ ← parse / encode / queue / tune timer / echo
//! └─────────────────┘
//!          │
//! ┌─────────────────┐
//! │   Keyer link    │ ← byte commands out, status bytes in
//! └─────────────────┘
//! ```

pub mod bridge;
pub mod config;
pub mod keyer;
pub mod logutil;
