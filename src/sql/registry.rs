use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use super::{Dialect, DialectRewriter, QueryRewriter};

/// Rewriters by lower-cased name. Pre-populated with the built-in dialects;
/// adapters may register their own, replacing an existing entry.
pub struct DialectRegistry {
    rewriters: RwLock<HashMap<String, Arc<dyn QueryRewriter>>>,
}

impl DialectRegistry {
    pub fn new() -> Self {
        let mut rewriters: HashMap<String, Arc<dyn QueryRewriter>> = HashMap::new();
        for dialect in Dialect::ALL {
            rewriters.insert(dialect.name().to_string(), Arc::new(DialectRewriter::new(dialect)));
        }
        Self {
            rewriters: RwLock::new(rewriters),
        }
    }

    pub fn register(&self, name: &str, rewriter: Arc<dyn QueryRewriter>) {
        self.rewriters.write().insert(name.to_lowercase(), rewriter);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn QueryRewriter>> {
        self.rewriters.read().get(&name.to_lowercase()).cloned()
    }

    /// The ANSI rewriter.
    pub fn default_rewriter(&self) -> Arc<dyn QueryRewriter> {
        self.get(Dialect::Ansi.name())
            .unwrap_or_else(|| Arc::new(DialectRewriter::default()))
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.rewriters.read().keys().cloned().collect();
        names.sort();
        names
    }
}

impl Default for DialectRegistry {
    fn default() -> Self {
        Self::new()
    }
}
