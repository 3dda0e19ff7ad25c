use serde::{Deserialize, Serialize};

/// Whether the directory could link the plugin to a source repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MirrorStatus {
    Ok,
    Ko,
}

/// One row of the listing CSV. `plugin_page` is the identity key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginRecord {
    pub plugin_name: String,
    pub plugin_page: String,
    pub mirror_status: MirrorStatus,
    #[serde(default)]
    pub repository_url: Option<String>,
}

impl PluginRecord {
    pub const HEADER: [&'static str; 4] =
        ["plugin_name", "plugin_page", "mirror_status", "repository_url"];

    /// Repository URL, treating an empty cell as absent.
    pub fn repository_url(&self) -> Option<&str> {
        self.repository_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }
}

/// One row of the archive CSV: a listing row plus what was downloaded.
///
/// `tags` and `master` are tri-state on disk: empty means nothing was ever
/// obtained (or attempted), `1` means at least one archive is on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveRecord {
    pub plugin_name: String,
    pub plugin_page: String,
    pub mirror_status: MirrorStatus,
    #[serde(default)]
    pub repository_url: Option<String>,
    #[serde(default, with = "flag")]
    pub tags: Option<bool>,
    #[serde(default, with = "flag")]
    pub master: Option<bool>,
}

impl ArchiveRecord {
    pub const HEADER: [&'static str; 6] = [
        "plugin_name",
        "plugin_page",
        "mirror_status",
        "repository_url",
        "tags",
        "master",
    ];

    pub fn repository_url(&self) -> Option<&str> {
        self.repository_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }

    /// Combine flags with a previously persisted row for the same plugin.
    /// A flag obtained in either run stays set.
    pub fn merge_flags(&mut self, previous: &ArchiveRecord) {
        self.tags = merge_flag(self.tags, previous.tags);
        self.master = merge_flag(self.master, previous.master);
    }
}

impl From<PluginRecord> for ArchiveRecord {
    fn from(record: PluginRecord) -> Self {
        Self {
            plugin_name: record.plugin_name,
            plugin_page: record.plugin_page,
            mirror_status: record.mirror_status,
            repository_url: record.repository_url,
            tags: None,
            master: None,
        }
    }
}

fn merge_flag(current: Option<bool>, previous: Option<bool>) -> Option<bool> {
    match (current, previous) {
        (Some(true), _) | (_, Some(true)) => Some(true),
        (Some(false), _) | (_, Some(false)) => Some(false),
        (None, None) => None,
    }
}

/// Serde helpers for the `1`/empty flag columns.
pub mod flag {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &Option<bool>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(true) => serializer.serialize_u8(1),
            Some(false) => serializer.serialize_u8(0),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        match raw.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some("1") | Some("true") | Some("True") => Ok(Some(true)),
            Some("0") | Some("false") | Some("False") => Ok(Some(false)),
            Some(other) => Err(D::Error::custom(format!("invalid flag value {other:?}"))),
        }
    }
}
