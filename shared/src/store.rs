//! JSON snapshot persistence.
//!
//! The registry and ledger only need durable key-value semantics, so state is
//! written as one JSON document per component. Writes go through a temp file
//! and rename so a crash mid-write cannot truncate the snapshot.

use std::fs;
use std::marker::PhantomData;
use std::path::PathBuf;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::error::Result;

pub struct JsonStore<T> {
    path: PathBuf,
    _marker: PhantomData<T>,
}

impl<T> JsonStore<T>
where
    T: Serialize + DeserializeOwned,
{
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _marker: PhantomData,
        }
    }

    /// Load the snapshot, or `None` if nothing has been written yet.
    pub fn load(&self) -> Result<Option<T>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(&self.path)?;
        Ok(Some(serde_json::from_str(&raw)?))
    }

    pub fn save(&self, value: &T) -> Result<()> {
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, serde_json::to_string_pretty(value)?)?;
        fs::rename(&tmp, &self.path)?;
        debug!("Snapshot written to {:?}", self.path);
        Ok(())
    }
}
