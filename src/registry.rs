// 🗂️ Module Registry - typed lookup of listing modules by id
// Built once at startup; nothing is dispatched by name at runtime

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleId(String);

impl ModuleId {
    pub fn new(id: impl Into<String>) -> Self {
        ModuleId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Anything that can re-render its listing on demand
#[async_trait]
pub trait ListingModule: Send + Sync {
    fn id(&self) -> &ModuleId;

    async fn reload(&self, scroll_to_top: bool);
}

#[derive(Default, Clone)]
pub struct ModuleRegistry {
    modules: HashMap<ModuleId, Arc<dyn ListingModule>>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a module; ids must be unique
    pub fn register(&mut self, module: Arc<dyn ListingModule>) -> Result<(), ModuleId> {
        let id = module.id().clone();
        if self.modules.contains_key(&id) {
            return Err(id);
        }
        self.modules.insert(id, module);
        Ok(())
    }

    pub fn get(&self, id: &ModuleId) -> Option<Arc<dyn ListingModule>> {
        self.modules.get(id).cloned()
    }

    pub fn ids(&self) -> Vec<ModuleId> {
        let mut ids: Vec<ModuleId> = self.modules.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}
