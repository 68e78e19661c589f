//! 📁 File-backed state. Currently one tenant: the checkpoint file.

use std::path::PathBuf;

use serde::Deserialize;

mod json_file_offsets;

pub(crate) use json_file_offsets::JsonFileOffsets;

/// 📁 Where the checkpoint snapshot lives. One flat JSON object, key → ISO-8601 timestamp.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct JsonFileOffsetsConfig {
    #[serde(default = "default_path")]
    pub path: PathBuf,
}

impl Default for JsonFileOffsetsConfig {
    fn default() -> Self {
        Self { path: default_path() }
    }
}

fn default_path() -> PathBuf {
    PathBuf::from("data_storage")
}
