//! The dispatch loop: the rewrite/block protocol over routed plugins.
//!
//! One line in, one outcome out. Every routed plugin sees the current line
//! in router order; a rewrite threads forward to the plugins after it, a
//! block stops the loop and replaces the line with a no-op. A plugin that
//! dies of an internal error is treated as having no opinion - one broken
//! plugin must not freeze command entry. An explicit block is honored
//! unconditionally. That asymmetry is the protocol, not an accident.

use std::cell::Cell;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use serde::Serialize;

use crate::cache::{DetectCache, DEFAULT_CACHE_CAPACITY};
use crate::pattern::PatternError;
use crate::registry::{Handler, Outcome, Plugin, Registry};

/// Replacement for a blocked line: runs, does nothing, succeeds, keeps the
/// host's history and state machinery consistent.
pub const NOOP_LINE: &str = "true";

/// Result of one dispatch cycle.
#[derive(Debug, Clone, Serialize)]
pub struct Dispatch {
    /// The line the host should execute
    pub line: String,
    /// Whether a plugin blocked the original line
    pub blocked: bool,
    /// Diagnostic text from a blocking plugin
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

thread_local! {
    static IN_DISPATCH: Cell<bool> = const { Cell::new(false) };
}

struct ReentryGuard;

impl ReentryGuard {
    fn acquire() -> Option<Self> {
        IN_DISPATCH.with(|flag| {
            if flag.get() {
                None
            } else {
                flag.set(true);
                Some(ReentryGuard)
            }
        })
    }
}

impl Drop for ReentryGuard {
    fn drop(&mut self) {
        IN_DISPATCH.with(|flag| flag.set(false));
    }
}

/// The middleware pipeline: registry, cache, and the dispatch loop.
pub struct Pipeline {
    registry: Registry,
    cache: DetectCache,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl Pipeline {
    pub fn new() -> Self {
        Self::with_cache_capacity(DEFAULT_CACHE_CAPACITY)
    }

    pub fn with_cache_capacity(capacity: usize) -> Self {
        Pipeline {
            registry: Registry::new(),
            cache: DetectCache::new(capacity),
        }
    }

    pub fn register(
        &mut self,
        name: &str,
        patterns: &[&str],
        handler: Handler,
    ) -> Result<(), PatternError> {
        self.registry.register(name, patterns, handler)
    }

    pub fn unregister(&mut self, name: &str) -> bool {
        self.registry.unregister(name)
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Candidate plugins for a line, in dispatch order.
    pub fn route(&mut self, line: &str) -> Vec<Arc<Plugin>> {
        self.registry.route(line, &mut self.cache)
    }

    /// Run `line` through every routed plugin and report what the host
    /// should execute. This is the single entry point a host line editor
    /// calls at the moment a line would otherwise run; on `blocked` the
    /// host must not execute the original line.
    pub fn dispatch(&mut self, line: &str) -> Dispatch {
        let _guard = match ReentryGuard::acquire() {
            Some(guard) => guard,
            None => {
                // Dispatch re-entered from inside a plugin's call chain:
                // fall through to plain execution instead of looping.
                return Dispatch {
                    line: line.to_string(),
                    blocked: false,
                    message: None,
                };
            }
        };

        let routed = self.registry.route(line, &mut self.cache);
        let mut current = line.to_string();

        for plugin in routed {
            let handler = Arc::clone(&plugin.handler);
            let outcome = catch_unwind(AssertUnwindSafe(|| handler(&current)));
            match outcome {
                Err(_) => {
                    crate::trace!("plugin '{}' failed internally; ignored", plugin.name);
                }
                Ok(Outcome::Pass) => {}
                Ok(Outcome::Rewrite(new)) => {
                    if new != current {
                        crate::trace!("plugin '{}': {current} -> {new}", plugin.name);
                        current = new;
                    }
                }
                Ok(Outcome::Block { reason }) => {
                    crate::trace!("plugin '{}' blocked the line", plugin.name);
                    return Dispatch {
                        line: NOOP_LINE.to_string(),
                        blocked: true,
                        message: Some(reason),
                    };
                }
            }
        }

        Dispatch {
            line: current,
            blocked: false,
            message: None,
        }
    }
}
