use std::path::Path;

use crate::{error::Result, types::StitchedCoordinates};

impl StitchedCoordinates {
    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, self.to_json_string()?)?;
        Ok(())
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_string(&json)
    }

    /// Parse and re-check that every name has an origin
    pub fn from_json_string(json: &str) -> Result<Self> {
        let parsed: Self = serde_json::from_str(json)?;
        Self::new(parsed.names, parsed.origins)
    }
}
