//! Plugin registry and pattern router.
//!
//! The registry stores plugins in registration order and derives a pattern
//! index from them: pattern -> ordered, deduplicated owner set. Routing
//! matches a line against every distinct pattern; every pattern that
//! matches contributes its owners, first-registered-pattern-first.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashSet;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::cache::DetectCache;
use crate::detect::detect;
use crate::pattern::{Pattern, PatternError};

/// What a plugin has to say about a line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// No opinion; the line passes through unchanged
    Pass,
    /// Replace the line before it executes
    Rewrite(String),
    /// Prevent the line from executing at all
    Block { reason: String },
}

pub type Handler = Arc<dyn Fn(&str) -> Outcome + Send + Sync>;

/// A registered plugin: a name, a first-class handler, and the patterns
/// that select it.
pub struct Plugin {
    pub name: String,
    pub handler: Handler,
    pub patterns: Vec<String>,
}

struct IndexEntry {
    pattern: Pattern,
    owners: Vec<usize>,
}

#[derive(Default)]
pub struct Registry {
    plugins: Vec<Arc<Plugin>>,
    index: Vec<IndexEntry>,
    fingerprint: u64,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a plugin. Re-registering an existing name replaces it in
    /// place. An empty pattern list is honored for compatibility but
    /// matches every line, which deserves a warning.
    pub fn register(
        &mut self,
        name: &str,
        patterns: &[&str],
        handler: Handler,
    ) -> Result<(), PatternError> {
        let mut patterns: Vec<String> = patterns.iter().map(|p| p.to_string()).collect();
        if patterns.is_empty() {
            crate::trace!("plugin '{name}' registered without patterns; it will match every line");
            patterns.push("*".to_string());
        }
        for raw in &patterns {
            Pattern::new(raw)?;
        }
        let plugin = Arc::new(Plugin {
            name: name.to_string(),
            handler,
            patterns,
        });
        match self.plugins.iter_mut().find(|p| p.name == name) {
            Some(existing) => *existing = plugin,
            None => self.plugins.push(plugin),
        }
        self.rebuild();
        Ok(())
    }

    /// Remove a plugin by name. Returns whether anything was removed.
    pub fn unregister(&mut self, name: &str) -> bool {
        let before = self.plugins.len();
        self.plugins.retain(|p| p.name != name);
        let removed = self.plugins.len() != before;
        if removed {
            self.rebuild();
        }
        removed
    }

    /// Rebuild the derived pattern index from the plugin list. Same plugin
    /// list, same index; registration mutations call this themselves.
    pub fn rebuild(&mut self) {
        self.index.clear();
        for (idx, plugin) in self.plugins.iter().enumerate() {
            for raw in &plugin.patterns {
                let pos = match self.index.iter().position(|e| e.pattern.as_str() == raw) {
                    Some(pos) => pos,
                    None => {
                        // Validated at registration
                        let pattern = match Pattern::new(raw) {
                            Ok(p) => p,
                            Err(_) => continue,
                        };
                        self.index.push(IndexEntry {
                            pattern,
                            owners: Vec::new(),
                        });
                        self.index.len() - 1
                    }
                };
                if !self.index[pos].owners.contains(&idx) {
                    self.index[pos].owners.push(idx);
                }
            }
        }
        let mut hasher = DefaultHasher::new();
        for entry in &self.index {
            entry.pattern.as_str().hash(&mut hasher);
        }
        self.fingerprint = hasher.finish();
    }

    /// Fingerprint of the active pattern set; changes on every mutation
    /// that affects routing.
    pub fn fingerprint(&self) -> u64 {
        self.fingerprint
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    pub fn plugin_names(&self) -> Vec<&str> {
        self.plugins.iter().map(|p| p.name.as_str()).collect()
    }

    fn literal_words(&self) -> Vec<String> {
        self.index
            .iter()
            .filter(|e| e.pattern.is_literal())
            .map(|e| e.pattern.as_str().to_string())
            .collect()
    }

    /// Plugins whose patterns match `line`, deduplicated by plugin,
    /// ordered first-registered-pattern-first. Detection results are
    /// memoized in `cache` under the current fingerprint.
    pub fn route(&self, line: &str, cache: &mut DetectCache) -> Vec<Arc<Plugin>> {
        if self.index.is_empty() {
            return Vec::new();
        }
        let detected = match cache.get(line, self.fingerprint) {
            Some(cached) => cached,
            None => {
                let computed = detect(line, &self.literal_words());
                cache.insert(line, self.fingerprint, computed.clone());
                computed
            }
        };
        let detected_words: HashSet<&str> = detected
            .as_deref()
            .unwrap_or(&[])
            .iter()
            .map(|d| d.pattern.as_str())
            .collect();

        let mut seen = HashSet::new();
        let mut routed = Vec::new();
        for entry in &self.index {
            let hit = if entry.pattern.is_literal() {
                detected_words.contains(entry.pattern.as_str())
            } else {
                entry.pattern.matches_line(line)
            };
            if !hit {
                continue;
            }
            for &idx in &entry.owners {
                if seen.insert(idx) {
                    routed.push(Arc::clone(&self.plugins[idx]));
                }
            }
        }
        routed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop() -> Handler {
        Arc::new(|_line: &str| Outcome::Pass)
    }

    fn route_names(registry: &Registry, line: &str) -> Vec<String> {
        let mut cache = DetectCache::new(16);
        registry
            .route(line, &mut cache)
            .iter()
            .map(|p| p.name.clone())
            .collect()
    }

    #[test]
    fn empty_registry_routes_nothing() {
        let registry = Registry::new();
        assert!(route_names(&registry, "aws s3 ls").is_empty());
    }

    #[test]
    fn literal_pattern_routes_via_detection() {
        let mut registry = Registry::new();
        registry.register("s3-uri", &["aws"], noop()).unwrap();
        assert_eq!(route_names(&registry, "aws s3 ls bucket"), vec!["s3-uri"]);
        assert!(route_names(&registry, "kubectl get pods").is_empty());
    }

    #[test]
    fn assignment_value_occurrence_is_not_routed() {
        let mut registry = Registry::new();
        registry.register("s3-uri", &["aws"], noop()).unwrap();
        assert!(route_names(&registry, "PROFILE=aws").is_empty());
        assert!(route_names(&registry, "K8S_CLUSTER_NAME=prd.k8s.example.com").is_empty());
    }

    #[test]
    fn wildcard_pattern_routes_via_glob() {
        let mut registry = Registry::new();
        registry.register("guard", &["*--env prod*"], noop()).unwrap();
        assert_eq!(
            route_names(&registry, "deploy --env prod --force"),
            vec!["guard"]
        );
        assert!(route_names(&registry, "deploy --env dev").is_empty());
    }

    #[test]
    fn shared_pattern_fires_all_owners_in_order() {
        let mut registry = Registry::new();
        registry.register("first", &["aws"], noop()).unwrap();
        registry.register("second", &["aws"], noop()).unwrap();
        assert_eq!(
            route_names(&registry, "aws s3 ls bucket"),
            vec!["first", "second"]
        );
    }

    #[test]
    fn plugin_with_several_matching_patterns_routes_once() {
        let mut registry = Registry::new();
        registry
            .register("s3-uri", &["aws", "aws *"], noop())
            .unwrap();
        assert_eq!(route_names(&registry, "aws s3 ls bucket"), vec!["s3-uri"]);
    }

    #[test]
    fn order_is_first_registered_pattern_first() {
        let mut registry = Registry::new();
        registry.register("k8s", &["kubectl"], noop()).unwrap();
        registry.register("s3-uri", &["aws"], noop()).unwrap();
        assert_eq!(
            route_names(&registry, "kubectl get pods | aws s3 cp - bucket/out.txt"),
            vec!["k8s", "s3-uri"]
        );
    }

    #[test]
    fn unregister_then_register_reproduces_routing() {
        let mut registry = Registry::new();
        registry.register("k8s", &["kubectl"], noop()).unwrap();
        registry.register("s3-uri", &["aws"], noop()).unwrap();
        let before = route_names(&registry, "aws s3 ls bucket");
        let fp_before = registry.fingerprint();

        assert!(registry.unregister("s3-uri"));
        assert!(route_names(&registry, "aws s3 ls bucket").is_empty());

        registry.register("s3-uri", &["aws"], noop()).unwrap();
        assert_eq!(route_names(&registry, "aws s3 ls bucket"), before);
        assert_eq!(registry.fingerprint(), fp_before);
    }

    #[test]
    fn empty_pattern_list_matches_everything() {
        let mut registry = Registry::new();
        registry.register("catch-all", &[], noop()).unwrap();
        assert_eq!(route_names(&registry, "literally anything"), vec!["catch-all"]);
    }

    #[test]
    fn fingerprint_changes_with_the_pattern_set() {
        let mut registry = Registry::new();
        registry.register("s3-uri", &["aws"], noop()).unwrap();
        let fp1 = registry.fingerprint();
        registry.register("k8s", &["kubectl"], noop()).unwrap();
        assert_ne!(registry.fingerprint(), fp1);
    }

    #[test]
    fn invalid_pattern_is_rejected_without_registering() {
        let mut registry = Registry::new();
        assert!(registry.register("bad", &["a["], noop()).is_err());
        assert!(registry.is_empty());
    }

    #[test]
    fn reregistering_a_name_replaces_it() {
        let mut registry = Registry::new();
        registry.register("s3-uri", &["aws"], noop()).unwrap();
        registry.register("s3-uri", &["kubectl"], noop()).unwrap();
        assert_eq!(registry.len(), 1);
        assert!(route_names(&registry, "aws s3 ls bucket").is_empty());
        assert_eq!(route_names(&registry, "kubectl get pods"), vec!["s3-uri"]);
    }
}
