//! Mutation log carried by every model

/// Modified property names plus the flags that steer `Update` and `Create`
///
/// Generated `set_<field>` setters call [`ChangeTracker::mark_modified`]; `Model::set`
/// (used by the hydrator) does not, so freshly hydrated models start clean.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeTracker {
    modified: Vec<String>,
    /// Write every column on update, modified or not
    pub ignore_modified_properties: bool,
    /// Write every column when an update finds nothing modified
    pub update_unmodified: bool,
    /// Run association write-back after the primary update
    pub update_references: bool,
}

impl Default for ChangeTracker {
    fn default() -> Self {
        Self {
            modified: Vec::new(),
            ignore_modified_properties: false,
            update_unmodified: false,
            update_references: true,
        }
    }
}

impl ChangeTracker {
    pub fn mark_modified(&mut self, property: &str) {
        if !self.is_modified(property) {
            self.modified.push(property.to_string());
        }
    }

    pub fn is_modified(&self, property: &str) -> bool {
        self.modified.iter().any(|p| p == property)
    }

    /// Modified property names in the order they were first set
    pub fn modified(&self) -> &[String] {
        &self.modified
    }

    pub fn has_modifications(&self) -> bool {
        !self.modified.is_empty()
    }

    pub fn clear_modified(&mut self) {
        self.modified.clear();
    }
}
