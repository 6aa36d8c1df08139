//! Attribute Storage
//!
//! Legacy fallback modelled on a hidden element with the userData
//! behaviour: attributes live on the element and are explicitly loaded
//! from and saved to a named store.

use super::{BackendKind, StorageBackend};
use crate::core::error::{Result, StorageError};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Element carrying named attributes persisted per store name
#[derive(Debug)]
pub struct UserDataElement {
    directory: PathBuf,
    attributes: RwLock<HashMap<String, String>>,
}

impl UserDataElement {
    /// Attach an element whose stores live under `directory`
    pub fn attach<P: AsRef<Path>>(directory: P) -> Result<Self> {
        let directory = directory.as_ref().to_path_buf();
        fs::create_dir_all(&directory).map_err(|e| {
            StorageError::ElementUnavailable(format!("{}: {}", directory.display(), e))
        })?;

        Ok(Self {
            directory,
            attributes: RwLock::new(HashMap::new()),
        })
    }

    fn store_path(&self, store_name: &str) -> PathBuf {
        self.directory.join(format!("{}.userdata.json", store_name))
    }

    /// Replace the element's attributes with the named store's contents
    pub fn load(&self, store_name: &str) -> Result<()> {
        let path = self.store_path(store_name);
        let loaded: HashMap<String, String> = if path.exists() {
            let contents = fs::read_to_string(&path)?;
            serde_json::from_str(&contents)?
        } else {
            HashMap::new()
        };

        *self.attributes.write() = loaded;
        Ok(())
    }

    /// Persist the element's attributes under the named store
    pub fn save(&self, store_name: &str) -> Result<()> {
        let json = serde_json::to_string(&*self.attributes.read())?;
        fs::write(self.store_path(store_name), json)?;
        Ok(())
    }

    pub fn get_attribute(&self, name: &str) -> Option<String> {
        self.attributes.read().get(name).cloned()
    }

    pub fn set_attribute(&self, name: &str, value: &str) {
        self.attributes
            .write()
            .insert(name.to_string(), value.to_string());
    }

    pub fn remove_attribute(&self, name: &str) {
        self.attributes.write().remove(name);
    }
}

/// [`StorageBackend`] over a [`UserDataElement`] bound to one store name
#[derive(Debug)]
pub struct AttributeStorage {
    element: UserDataElement,
    store_name: String,
}

impl AttributeStorage {
    pub fn new(element: UserDataElement, store_name: &str) -> Self {
        Self {
            element,
            store_name: store_name.to_string(),
        }
    }

    pub fn store_name(&self) -> &str {
        &self.store_name
    }
}

impl StorageBackend for AttributeStorage {
    fn kind(&self) -> BackendKind {
        BackendKind::Attribute
    }

    fn get_item(&self, key: &str) -> Result<Option<String>> {
        self.element.load(&self.store_name)?;
        Ok(self.element.get_attribute(key))
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        debug!("attribute set key={}, store={}", key, self.store_name);
        self.element.load(&self.store_name)?;
        self.element.set_attribute(key, value);
        self.element.save(&self.store_name)
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        self.element.load(&self.store_name)?;
        self.element.remove_attribute(key);
        self.element.save(&self.store_name)
    }
}
