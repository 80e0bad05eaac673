//! Configuration access port trait.

use crate::domain::error::TreeTraderError;

pub trait ConfigPort {
    fn get_string(&self, section: &str, key: &str) -> Option<String>;
    fn get_usize(&self, section: &str, key: &str, default: usize) -> usize;
    fn get_double(&self, section: &str, key: &str, default: f64) -> f64;

    fn require_string(&self, section: &str, key: &str) -> Result<String, TreeTraderError> {
        self.get_string(section, key)
            .ok_or_else(|| TreeTraderError::ConfigMissing {
                section: section.to_string(),
                key: key.to_string(),
            })
    }
}
