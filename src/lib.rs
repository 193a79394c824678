//! preflight - command-line middleware
//!
//! # Overview
//!
//! preflight sits between a line editor and the shell. At the moment a
//! typed line would execute, the host hands it to [`Pipeline::dispatch`];
//! plugins selected by glob patterns get to look at it, rewrite it, or
//! block it, and the host executes whatever comes back.
//!
//! ```text
//! host line editor
//!       |
//!       v
//! dispatch(line) ──> route ──> plugin 1 ──> plugin 2 ──> ...
//!       |              |          rewrite      block
//!       v              v
//! {line, blocked}   detect()  (quote-aware, substitution-aware)
//! ```
//!
//! # Core Concepts
//!
//! ## Patterns
//!
//! A plugin registers with glob patterns. A wildcard pattern is matched
//! against the whole line; a bare word like `aws` selects lines that
//! actually *invoke* that command - a word inside quotes, in a `grep`
//! argument, or in the value of a `NAME=value` assignment does not count.
//!
//! ## Rewrite and block
//!
//! Handlers return an [`Outcome`]. Rewrites thread forward: later plugins
//! in the same cycle see the rewritten line. A block stops the cycle and
//! replaces the line with a harmless no-op. A plugin that panics is
//! treated as having no opinion.
//!
//! ```
//! use std::sync::Arc;
//! use preflight::{Outcome, Pipeline};
//!
//! let mut pipeline = Pipeline::new();
//! pipeline
//!     .register(
//!         "prod-guard",
//!         &["deploy *"],
//!         Arc::new(|line: &str| {
//!             if line.contains("--env prod") {
//!                 Outcome::Block {
//!                     reason: "refusing a prod deploy from this shell".to_string(),
//!                 }
//!             } else {
//!                 Outcome::Pass
//!             }
//!         }),
//!     )
//!     .unwrap();
//!
//! let result = pipeline.dispatch("deploy --env prod api");
//! assert!(result.blocked);
//! assert_ne!(result.line, "deploy --env prod api");
//! ```
//!
//! ## Detection
//!
//! [`detect`] is the shared command-position parser: quote-aware, it
//! understands `|`, `;`, `&&`, `||`, `$( ... )` and backtick substitution,
//! and hands plugins the exact segment (with byte spans) where their
//! command occurs. The built-in [`plugins::S3Rewriter`] consumes it to
//! qualify bucket references in `aws s3` invocations.

pub mod cache;
pub mod config;
pub mod detect;
pub mod lexer;
pub mod pattern;
pub mod pipeline;
pub mod plugins;
pub mod registry;
pub mod repl;
pub mod session;
pub mod trace;

pub use cache::{DetectCache, DEFAULT_CACHE_CAPACITY};
pub use config::{Config, ConfigError};
pub use detect::{detect, ContextKind, DetectedCommand};
pub use lexer::{lex, LexError, Separator, Token, TokenKind};
pub use pattern::{Pattern, PatternError};
pub use pipeline::{Dispatch, Pipeline, NOOP_LINE};
pub use registry::{Handler, Outcome, Plugin, Registry};
pub use session::{SessionError, SessionGuard};
