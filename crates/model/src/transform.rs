use serde::{Deserialize, Serialize};

/// Gzip level used when the config does not pin one.
pub const DEFAULT_GZIP_LEVEL: u32 = 6;

/// One stage of the transform chain as it appears in the config document.
///
/// The set of kinds is closed: an unknown `kind` fails deserialization, so a
/// typo is caught while the config is parsed rather than mid-run. Arguments
/// live inline next to the tag:
///
/// ```json
/// { "kind": "gzip_compress", "level": 9 }
/// { "kind": "encrypt", "hex_key": "000102030405060708090a0b0c0d0e0f" }
/// { "kind": "sed", "script": "s/foo/bar/g" }
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransformSpec {
    Identity,
    GzipCompress {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        level: Option<u32>,
    },
    GzipDecompress,
    Encrypt {
        hex_key: String,
    },
    Decrypt {
        hex_key: String,
    },
    Sed {
        script: String,
    },
}

impl TransformSpec {
    pub fn kind(&self) -> &'static str {
        match self {
            TransformSpec::Identity => "identity",
            TransformSpec::GzipCompress { .. } => "gzip_compress",
            TransformSpec::GzipDecompress => "gzip_decompress",
            TransformSpec::Encrypt { .. } => "encrypt",
            TransformSpec::Decrypt { .. } => "decrypt",
            TransformSpec::Sed { .. } => "sed",
        }
    }

    /// Feeds kind and arguments into a config hash. Two specs hash alike
    /// exactly when they would behave alike at run time.
    pub fn hash_into(&self, hasher: &mut blake3::Hasher) {
        hasher.update(self.kind().as_bytes());
        hasher.update(&[0]);
        match self {
            TransformSpec::Identity | TransformSpec::GzipDecompress => {}
            TransformSpec::GzipCompress { level } => {
                hasher.update(&level.unwrap_or(DEFAULT_GZIP_LEVEL).to_le_bytes());
            }
            TransformSpec::Encrypt { hex_key } | TransformSpec::Decrypt { hex_key } => {
                hasher.update(hex_key.as_bytes());
            }
            TransformSpec::Sed { script } => {
                hasher.update(script.as_bytes());
            }
        }
        hasher.update(&[0]);
    }
}
