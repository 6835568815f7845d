use std::path::PathBuf;

use base64::Engine;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::error::{AppError, Result};
use crate::platform::types::FileContent;

/// Where a configuration document lives in the remote repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceLocation {
    pub owner: String,
    pub repo: String,
    pub path: String,
    pub branch: String,
}

impl std::fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}:{}@{}", self.owner, self.repo, self.path, self.branch)
    }
}

/// Transfer format the document arrived in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentEncoding {
    Base64,
    Raw,
}

/// Decoded text of a configuration file plus its provenance.
#[derive(Debug, Clone)]
pub struct ConfigDocument {
    pub source: SourceLocation,
    pub text: String,
    pub encoding: ContentEncoding,
    /// Local copy written when the document was captured.
    pub backup_path: Option<PathBuf>,
}

impl ConfigDocument {
    pub fn from_content(source: SourceLocation, content: FileContent) -> Result<Self> {
        let (text, encoding) = decode_content(content)?;
        Ok(Self {
            source,
            text,
            encoding,
            backup_path: None,
        })
    }

    /// Hex SHA-256 of the decoded text.
    pub fn digest(&self) -> String {
        hex::encode(Sha256::digest(self.text.as_bytes()))
    }
}

/// Decode a contents payload into text.
///
/// Base64 payloads from the contents API are wrapped every 60 characters, so
/// whitespace is dropped before decoding.
pub fn decode_content(content: FileContent) -> Result<(String, ContentEncoding)> {
    match content {
        FileContent::Raw(text) => Ok((text, ContentEncoding::Raw)),
        FileContent::Encoded {
            content, encoding, ..
        } => {
            let content = content
                .filter(|c| !c.trim().is_empty())
                .ok_or_else(|| {
                    AppError::SnapshotFetchFailed("response has no content field".to_string())
                })?;

            match encoding.as_deref() {
                Some(enc) if enc.eq_ignore_ascii_case("base64") => {
                    let compact: String =
                        content.chars().filter(|c| !c.is_ascii_whitespace()).collect();
                    let bytes = base64::engine::general_purpose::STANDARD
                        .decode(compact.as_bytes())
                        .map_err(|e| {
                            AppError::SnapshotFetchFailed(format!("invalid base64 content: {e}"))
                        })?;
                    let text = String::from_utf8(bytes).map_err(|e| {
                        AppError::SnapshotFetchFailed(format!("content is not UTF-8: {e}"))
                    })?;
                    Ok((text, ContentEncoding::Base64))
                }
                _ => Ok((content, ContentEncoding::Raw)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoded(content: &str) -> FileContent {
        FileContent::Encoded {
            content: Some(content.to_string()),
            encoding: Some("base64".to_string()),
            sha: None,
        }
    }

    #[test]
    fn test_decodes_base64() {
        let (text, encoding) = decode_content(encoded("a2V5OiB2YWx1ZQ==")).unwrap();
        assert_eq!(text, "key: value");
        assert_eq!(encoding, ContentEncoding::Base64);
    }

    #[test]
    fn test_decodes_line_wrapped_base64() {
        let (text, _) = decode_content(encoded("a2V5Oi\nB2YWx1\r\nZQ==\n")).unwrap();
        assert_eq!(text, "key: value");
    }

    #[test]
    fn test_missing_content_fails() {
        let content = FileContent::Encoded {
            content: None,
            encoding: Some("base64".to_string()),
            sha: None,
        };
        assert!(matches!(
            decode_content(content),
            Err(AppError::SnapshotFetchFailed(_))
        ));
        assert!(decode_content(encoded("")).is_err());
    }

    #[test]
    fn test_invalid_base64_fails() {
        assert!(matches!(
            decode_content(encoded("!!not base64!!")),
            Err(AppError::SnapshotFetchFailed(_))
        ));
    }

    #[test]
    fn test_non_utf8_fails() {
        // 0xff 0xfe
        assert!(decode_content(encoded("//4=")).is_err());
    }

    #[test]
    fn test_raw_passthrough() {
        let (text, encoding) = decode_content(FileContent::Raw("on: push\n".to_string())).unwrap();
        assert_eq!(text, "on: push\n");
        assert_eq!(encoding, ContentEncoding::Raw);
    }

    #[test]
    fn test_digest_is_stable_hex() {
        let doc = ConfigDocument {
            source: SourceLocation {
                owner: "o".into(),
                repo: "r".into(),
                path: "ci.yml".into(),
                branch: "main".into(),
            },
            text: "key: value".into(),
            encoding: ContentEncoding::Base64,
            backup_path: None,
        };
        assert_eq!(doc.digest().len(), 64);
        assert_eq!(doc.digest(), doc.clone().digest());
    }
}
