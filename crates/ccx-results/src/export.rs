//! JSON export of parsed result files.

use std::fs;
use std::path::Path;

use crate::entities::ResultEntity;
use crate::error::Result;
use crate::result::ResultFile;

impl<E: ResultEntity> ResultFile<E> {
    /// Pretty-printed JSON of all result sets, step infos and available times.
    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Writes [`to_json_string`](Self::to_json_string) to `path`, creating
    /// missing parent directories.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }

        let bytes = serde_json::to_vec_pretty(self)?;
        fs::write(path, bytes)?;
        Ok(())
    }
}
