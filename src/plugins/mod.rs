//! Built-in plugins.
//!
//! Plugins are plain handler functions over the current line; anything can
//! register one. The set shipped here is what the interactive binary
//! installs by default.

pub mod s3;

pub use s3::S3Rewriter;

use crate::config::Config;
use crate::pipeline::Pipeline;

/// Register the built-in plugin set against a pipeline.
pub fn register_builtin(pipeline: &mut Pipeline, config: &Config) {
    let rewriter = S3Rewriter::from_config(config);
    if let Err(e) = pipeline.register("s3-uri", &["aws"], rewriter.into_handler()) {
        crate::trace!("failed to register s3-uri: {e}");
    }
}
