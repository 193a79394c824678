//! Object-storage URI rewriting.
//!
//! Qualifies bare bucket references in `aws s3` invocations so that
//! `aws s3 ls bucket-name` becomes `aws s3 ls s3://bucket-name` before it
//! runs. Classification is heuristic: flags and their values, local paths,
//! and probable local filenames are left alone, and for `rm` a bare bucket
//! name is deliberately left untouched - it is ambiguous between "delete
//! one object with that name" and "delete a bucket", and guessing either
//! way destroys data.
//!
//! As a side effect, any `aws s3` invocation also checks the cached
//! session-validity marker and triggers re-authentication when it has gone
//! stale.

use std::ops::Range;
use std::sync::Arc;

use crate::config::{self, Config};
use crate::detect::{detect, DetectedCommand};
use crate::lexer::{lex, Token};
use crate::registry::{Handler, Outcome};
use crate::session::SessionGuard;

/// Command word this plugin watches for
const COMMAND: &str = "aws";
/// Object-storage subcommand marker
const MARKER: &str = "s3";

/// How an action treats its bucket-ish arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ActionKind {
    /// `mb`/`rb`: exactly one bucket argument, first plausible token wins
    Bucket,
    /// `cp`/`mv`/`sync`/`ls`: every argument is evaluated
    Object,
    /// `rm`: only `bucket/key` forms are qualified
    Remove,
}

fn action_kind(action: &str) -> Option<ActionKind> {
    match action {
        "mb" | "rb" => Some(ActionKind::Bucket),
        "cp" | "mv" | "sync" | "ls" => Some(ActionKind::Object),
        "rm" => Some(ActionKind::Remove),
        _ => None,
    }
}

pub struct S3Rewriter {
    scheme: String,
    session: Option<SessionGuard>,
}

impl S3Rewriter {
    pub fn new(scheme: &str) -> Self {
        S3Rewriter {
            scheme: scheme.to_string(),
            session: None,
        }
    }

    pub fn with_session(mut self, session: SessionGuard) -> Self {
        self.session = Some(session);
        self
    }

    pub fn from_config(config: &Config) -> Self {
        let session = config::state_dir().map(|dir| {
            SessionGuard::new(
                dir.join(format!("session-{}", SessionGuard::profile())),
                config.session_ttl_secs,
                config.reauth_command.clone(),
            )
        });
        S3Rewriter {
            scheme: config.scheme.clone(),
            session,
        }
    }

    pub fn into_handler(self) -> Handler {
        Arc::new(move |line| self.apply(line))
    }

    /// Inspect one line; rewrite it when a bucket reference was qualified.
    pub fn apply(&self, line: &str) -> Outcome {
        let patterns = [COMMAND.to_string()];
        let found = match detect(line, &patterns) {
            Some(found) => found,
            None => return Outcome::Pass,
        };

        // Non-overlapping contexts only, left to right; overlaps can occur
        // when the token fallback matched more than once.
        let mut contexts: Vec<&DetectedCommand> = found.iter().collect();
        contexts.sort_by_key(|c| c.span.start);
        let mut kept: Vec<&DetectedCommand> = Vec::new();
        for ctx in contexts {
            if kept.last().map_or(true, |prev| ctx.span.start >= prev.span.end) {
                kept.push(ctx);
            }
        }

        let mut new_line = line.to_string();
        let mut changed = false;
        let mut saw_marker = false;

        // Splice from the rightmost context so earlier spans stay valid
        for ctx in kept.iter().rev() {
            let tokens = match lex(&ctx.text) {
                Ok(tokens) => tokens,
                Err(_) => continue,
            };
            if tokens.get(1).map_or(false, |t| t.is_word() && t.text == MARKER) {
                saw_marker = true;
            }
            if let Some(corrected) = rewrite(&ctx.text, &tokens, 0, &self.scheme) {
                new_line.replace_range(ctx.span.clone(), &corrected);
                changed = true;
            }
        }

        if saw_marker {
            self.check_session();
        }

        if changed {
            Outcome::Rewrite(new_line)
        } else {
            Outcome::Pass
        }
    }

    fn check_session(&self) {
        if let Some(session) = &self.session {
            if let Err(e) = session.ensure_valid() {
                eprintln!("preflight: session validation failed: {e}");
            }
        }
    }
}

/// Apply the qualification heuristics to one command segment.
///
/// `tokens[start]` is the command word itself; the token after it must be
/// the object-storage marker followed by a recognized action. Returns the
/// corrected segment text only when at least one argument changed, so
/// callers can tell "inspected, nothing to do" from a redundant rewrite.
pub fn rewrite(source: &str, tokens: &[Token], start: usize, scheme: &str) -> Option<String> {
    let marker = tokens.get(start + 1)?;
    if !marker.is_word() || marker.text != MARKER {
        return None;
    }
    let action = tokens.get(start + 2)?;
    if !action.is_word() {
        return None;
    }
    let kind = action_kind(&action.text)?;

    let mut replacements: Vec<(Range<usize>, String)> = Vec::new();
    let mut skip_next = false;
    for tok in &tokens[start + 3..] {
        if tok.is_operator() {
            // Past the end of this invocation
            break;
        }
        if skip_next {
            skip_next = false;
            continue;
        }
        // Quoted arguments arrive unwrapped; the span still covers the
        // quotes, so a replacement drops them.
        let arg = tok.text.as_str();
        if arg.starts_with(scheme) {
            continue;
        }
        if is_flag(arg) {
            if !arg.contains('=') {
                skip_next = true;
            }
            continue;
        }
        if arg.starts_with("./") || arg.starts_with('/') {
            continue;
        }
        let qualify = match kind {
            ActionKind::Bucket => is_bucket_name(arg),
            ActionKind::Object => {
                if !arg.contains('/') && has_file_extension(arg) {
                    // Probable local file
                    false
                } else {
                    is_bucket_name(arg) || is_bucket_path(arg)
                }
            }
            ActionKind::Remove => arg.contains('/') && is_bucket_path(arg),
        };
        if qualify {
            replacements.push((tok.span.clone(), format!("{scheme}{arg}")));
            if kind == ActionKind::Bucket {
                break;
            }
        }
    }

    if replacements.is_empty() {
        return None;
    }
    let mut out = source.to_string();
    for (span, text) in replacements.iter().rev() {
        out.replace_range(span.clone(), text);
    }
    Some(out)
}

fn is_flag(arg: &str) -> bool {
    arg.len() > 1 && arg.starts_with('-')
}

/// DNS-compatible bucket name: 3-63 chars, lowercase alphanumerics with
/// interior dots and dashes, alphanumeric at both ends.
fn is_bucket_name(arg: &str) -> bool {
    let len = arg.len();
    if !(3..=63).contains(&len) {
        return false;
    }
    let bytes = arg.as_bytes();
    let edge = |b: u8| b.is_ascii_lowercase() || b.is_ascii_digit();
    edge(bytes[0])
        && edge(bytes[len - 1])
        && arg
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'.' || b == b'-')
}

/// `bucket/key...` with a plausible bucket before the first slash.
fn is_bucket_path(arg: &str) -> bool {
    match arg.split_once('/') {
        Some((bucket, _)) => is_bucket_name(bucket),
        None => false,
    }
}

/// A short alphabetic extension suggests a local file.
fn has_file_extension(arg: &str) -> bool {
    match arg.rsplit_once('.') {
        Some((stem, ext)) => {
            !stem.is_empty() && (1..=4).contains(&ext.len()) && ext.chars().all(|c| c.is_ascii_alphabetic())
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apply(line: &str) -> Outcome {
        S3Rewriter::new("s3://").apply(line)
    }

    fn rewritten(line: &str) -> String {
        match apply(line) {
            Outcome::Rewrite(new) => new,
            other => panic!("expected rewrite for '{line}', got {other:?}"),
        }
    }

    fn unchanged(line: &str) {
        assert_eq!(apply(line), Outcome::Pass, "expected no change for '{line}'");
    }

    #[test]
    fn ls_qualifies_a_bare_bucket() {
        assert_eq!(rewritten("aws s3 ls bucket-name"), "aws s3 ls s3://bucket-name");
    }

    #[test]
    fn rm_leaves_a_bare_bucket_alone() {
        unchanged("aws s3 rm bucket-name");
    }

    #[test]
    fn rm_qualifies_a_bucket_path() {
        assert_eq!(
            rewritten("aws s3 rm bucket-name/file.txt"),
            "aws s3 rm s3://bucket-name/file.txt"
        );
    }

    #[test]
    fn rm_skips_explicit_local_paths() {
        unchanged("aws s3 rm ./bucket-name/file.txt");
        unchanged("aws s3 rm /tmp/bucket-name/file.txt");
    }

    #[test]
    fn already_qualified_arguments_are_skipped() {
        unchanged("aws s3 ls s3://bucket-name");
        unchanged("aws s3 cp s3://a/x s3://b/x");
    }

    #[test]
    fn rewriting_its_own_output_changes_nothing() {
        let first = rewritten("aws s3 cp report.pdf backup-bucket/reports");
        unchanged(&first);
    }

    #[test]
    fn mb_qualifies_the_first_plausible_bucket_only() {
        assert_eq!(
            rewritten("aws s3 mb new-bucket other-bucket"),
            "aws s3 mb s3://new-bucket other-bucket"
        );
    }

    #[test]
    fn rb_qualifies_a_bucket() {
        assert_eq!(rewritten("aws s3 rb old-bucket"), "aws s3 rb s3://old-bucket");
    }

    #[test]
    fn probable_local_files_are_skipped_for_object_actions() {
        assert_eq!(
            rewritten("aws s3 cp file.txt my-bucket"),
            "aws s3 cp file.txt s3://my-bucket"
        );
    }

    #[test]
    fn flag_values_are_skipped() {
        assert_eq!(
            rewritten("aws s3 cp --profile prod file.txt my-bucket"),
            "aws s3 cp --profile prod file.txt s3://my-bucket"
        );
    }

    #[test]
    fn equals_form_flags_do_not_consume_the_next_token() {
        assert_eq!(
            rewritten("aws s3 ls --output=json my-bucket"),
            "aws s3 ls --output=json s3://my-bucket"
        );
    }

    #[test]
    fn sync_qualifies_the_remote_side() {
        assert_eq!(
            rewritten("aws s3 sync . backup-bucket"),
            "aws s3 sync . s3://backup-bucket"
        );
    }

    #[test]
    fn quoted_arguments_are_unwrapped() {
        assert_eq!(
            rewritten("aws s3 cp \"my file.txt\" backup-bucket"),
            "aws s3 cp \"my file.txt\" s3://backup-bucket"
        );
        assert_eq!(
            rewritten("aws s3 ls 'backup-bucket'"),
            "aws s3 ls s3://backup-bucket"
        );
    }

    #[test]
    fn unknown_actions_are_ignored() {
        unchanged("aws s3 presign bucket-name/file.txt");
        unchanged("aws s3api get-object bucket-name out.txt");
    }

    #[test]
    fn non_s3_aws_commands_are_ignored() {
        unchanged("aws ec2 describe-instances");
    }

    #[test]
    fn rewrite_reaches_past_a_pipe() {
        assert_eq!(
            rewritten("kubectl get pods | aws s3 cp - bucket/out.txt"),
            "kubectl get pods | aws s3 cp - s3://bucket/out.txt"
        );
    }

    #[test]
    fn stdin_dash_is_not_a_flag() {
        assert_eq!(
            rewritten("aws s3 cp - my-bucket/out.txt"),
            "aws s3 cp - s3://my-bucket/out.txt"
        );
    }

    #[test]
    fn rewrite_stops_at_a_segment_boundary() {
        assert_eq!(
            rewritten("aws s3 ls my-bucket && echo done"),
            "aws s3 ls s3://my-bucket && echo done"
        );
    }

    #[test]
    fn uppercase_or_short_names_are_not_buckets() {
        unchanged("aws s3 ls MyBucket");
        unchanged("aws s3 ls ab");
    }

    #[test]
    fn dotted_names_look_like_files_and_are_skipped() {
        // `cp`-family treats a dotted, slash-free token as a probable
        // local file even when it would be a valid bucket name.
        unchanged("aws s3 ls data.bak");
    }

    #[test]
    fn substitution_context_is_rewritten_in_place() {
        assert_eq!(
            rewritten("RESULT=$(aws s3 ls my-bucket)"),
            "RESULT=$(aws s3 ls s3://my-bucket)"
        );
    }

    #[test]
    fn quoted_invocation_is_not_rewritten() {
        unchanged("foo \"aws s3 ls my-bucket\"");
    }

    #[test]
    fn rewrite_signals_no_change_distinctly() {
        let tokens = lex("aws s3 ls s3://bucket-name").unwrap();
        assert_eq!(rewrite("aws s3 ls s3://bucket-name", &tokens, 0, "s3://"), None);
        let tokens = lex("aws s3 ls bucket-name").unwrap();
        assert_eq!(
            rewrite("aws s3 ls bucket-name", &tokens, 0, "s3://").as_deref(),
            Some("aws s3 ls s3://bucket-name")
        );
    }
}
