//! Extra string metadata carried by handle setups.
//!
//! Xinfos are `key=value` pairs travelling with a handle's format. A few
//! keys are understood by the handle itself:
//!
//! - `osc-freq`: oscillator frequency, overrides the source's
//! - `volume`: playback gain in `(0, 1]`
//! - `fine-tune`: tuning offset in cents

use super::{DataHandle, DataSource, HandleSetup};
use crate::error::Result;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Xinfo key overriding the oscillator frequency.
pub const OSC_FREQ: &str = "osc-freq";
/// Xinfo key holding the playback volume.
pub const VOLUME: &str = "volume";
/// Xinfo key holding the fine tuning in cents.
pub const FINE_TUNE: &str = "fine-tune";

/// Sorted `key=value` metadata, cheap to clone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Xinfos {
    entries: Arc<BTreeMap<String, String>>,
}

impl Xinfos {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `key=value` entries. Entries without `=`, with an empty key or
    /// an empty value are skipped.
    pub fn parse<'a>(entries: impl IntoIterator<Item = &'a str>) -> Self {
        let mut xinfos = Self::new();
        for entry in entries {
            if let Some((key, value)) = split_entry(entry) {
                xinfos.set(key, value);
            }
        }
        xinfos
    }

    /// Builder form of [`set`](Self::set).
    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Value of `key` parsed as a float, `None` if missing or not a number.
    pub fn get_float(&self, key: &str) -> Option<f32> {
        self.get(key)?.trim().parse().ok()
    }

    /// Set `key` to `value`. An empty value removes the key.
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        let value = value.into();
        if value.is_empty() {
            self.remove(key);
        } else if self.get(key) != Some(value.as_str()) {
            Arc::make_mut(&mut self.entries).insert(key.to_string(), value);
        }
    }

    pub fn set_float(&mut self, key: &str, value: f32) {
        self.set(key, value.to_string());
    }

    pub fn remove(&mut self, key: &str) {
        if self.entries.contains_key(key) {
            Arc::make_mut(&mut self.entries).remove(key);
        }
    }

    pub fn clear(&mut self) {
        if !self.entries.is_empty() {
            self.entries = Arc::default();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Entries formatted as `key=value`, sorted by key.
    pub fn to_strings(&self) -> Vec<String> {
        self.iter().map(|(k, v)| format!("{}={}", k, v)).collect()
    }
}

fn split_entry(entry: &str) -> Option<(&str, &str)> {
    let (key, value) = entry.split_once('=')?;
    (!key.is_empty() && !value.is_empty()).then_some((key, value))
}

/// Key named by a removal entry, `key` or `key=`.
fn removal_key(entry: &str) -> Option<&str> {
    let key = entry.strip_suffix('=').unwrap_or(entry);
    (!key.is_empty() && !key.contains('=')).then_some(key)
}

/// Edit applied by an [`XinfoHandle`] on open.
enum XinfoEdit {
    Add(Xinfos),
    Remove(Vec<String>),
    Clear,
}

/// Decorator passing its source through with edited xinfos.
pub struct XinfoHandle {
    src: Arc<DataHandle>,
    edit: XinfoEdit,
}

impl XinfoHandle {
    /// Add `key=value` entries on top of the source's xinfos. Malformed
    /// entries are ignored.
    pub fn add<'a>(
        src: Arc<DataHandle>,
        entries: impl IntoIterator<Item = &'a str>,
    ) -> Arc<DataHandle> {
        Self::wrap(src, XinfoEdit::Add(Xinfos::parse(entries)))
    }

    /// Remove the keys named by `entries` (`key` or `key=`).
    pub fn remove<'a>(
        src: Arc<DataHandle>,
        entries: impl IntoIterator<Item = &'a str>,
    ) -> Arc<DataHandle> {
        let keys = entries
            .into_iter()
            .filter_map(removal_key)
            .map(str::to_string)
            .collect();
        Self::wrap(src, XinfoEdit::Remove(keys))
    }

    /// Drop every xinfo of the source.
    pub fn clear(src: Arc<DataHandle>) -> Arc<DataHandle> {
        Self::wrap(src, XinfoEdit::Clear)
    }

    fn wrap(src: Arc<DataHandle>, edit: XinfoEdit) -> Arc<DataHandle> {
        let name = format!("{}#xinfo", src.name());
        DataHandle::new(name, Self { src, edit })
    }
}

impl DataSource for XinfoHandle {
    fn open(&self, _name: &str) -> Result<HandleSetup> {
        self.src.open()?;
        let mut setup = self.src.setup();
        match &self.edit {
            XinfoEdit::Add(added) => {
                for (key, value) in added.iter() {
                    setup.xinfos.set(key, value);
                }
            }
            XinfoEdit::Remove(keys) => {
                for key in keys {
                    setup.xinfos.remove(key);
                }
            }
            XinfoEdit::Clear => setup.xinfos.clear(),
        }
        Ok(setup)
    }

    fn read(&self, _setup: &HandleSetup, offset: i64, values: &mut [f32]) -> Result<usize> {
        self.src.read(offset, values)
    }

    fn close(&self) {
        self.src.close();
    }

    fn source(&self) -> Option<&Arc<DataHandle>> {
        Some(&self.src)
    }
}
