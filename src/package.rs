//! Descriptor of one completed backup artifact.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;

/// Format of [Package::time], safe to use as a path component.
pub const TIME_FORMAT: &str = "%Y.%m.%d.%H.%M.%S";

/// A backup of one trigger at one point in time.
///
/// Packages are persisted in the retention history of every storage they were
/// transferred to, so they have to survive a serialization round trip.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Package {
    trigger: String,
    time: String,
    extension: String,
    #[serde(default)]
    chunk_suffixes: Vec<String>,
    /// Skip this package when cycling, its remote files are never removed.
    #[serde(default)]
    pub no_cycle: bool,
    /// Scratch space of the storage backends, e.g. a remote archive id.
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl Package {
    pub fn new(trigger: impl Into<String>, time: NaiveDateTime) -> Self {
        Self {
            trigger: trigger.into(),
            time: time.format(TIME_FORMAT).to_string(),
            extension: "tar".to_string(),
            chunk_suffixes: Vec::new(),
            no_cycle: false,
            metadata: BTreeMap::new(),
        }
    }

    pub fn trigger(&self) -> &str {
        &self.trigger
    }

    pub fn time(&self) -> &str {
        &self.time
    }

    /// [time](Self::time) as a timestamp, [None] if it can't be parsed.
    pub fn datetime(&self) -> Option<NaiveDateTime> {
        NaiveDateTime::parse_from_str(&self.time, TIME_FORMAT).ok()
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Append an extension like `.enc` added by a packaging stage.
    pub fn push_extension(&mut self, extension: &str) {
        if !extension.starts_with('.') {
            self.extension.push('.');
        }
        self.extension.push_str(extension);
    }

    pub fn chunk_suffixes(&self) -> &[String] {
        &self.chunk_suffixes
    }

    pub(crate) fn set_chunk_suffixes(&mut self, suffixes: Vec<String>) {
        self.chunk_suffixes = suffixes;
    }

    /// `<trigger>.<extension>`
    pub fn basename(&self) -> String {
        format!("{}.{}", self.trigger, self.extension)
    }

    /// Names of all files that make up this package.
    pub fn filenames(&self) -> Vec<String> {
        let basename = self.basename();
        if self.chunk_suffixes.is_empty() {
            vec![basename]
        } else {
            self.chunk_suffixes
                .iter()
                .map(|suffix| format!("{basename}-{suffix}"))
                .collect()
        }
    }
}
