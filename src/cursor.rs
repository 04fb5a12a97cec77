//! Opaque pagination cursor carried in list requests and responses.
//!
//! Callers treat the cursor as raw bytes. Internally it is a versioned,
//! store-agnostic encoding with two forms: a terminal marker (the JSON
//! `null` token) once the scan has reached the end of the table, and a
//! resumption key naming the last evaluated item. Keeping the terminal
//! form as `null` means an exhausted scan always round-trips to a value
//! clients can feed back without crashing.

use serde::{Deserialize, Serialize};

pub const PAGING_KEY_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PagingKey {
    /// The scan reached the end of the table; there are no more pages.
    End,
    /// Resume the scan after the item with this id.
    Resume(String),
}

#[derive(Debug)]
pub enum CursorError {
    Malformed(serde_json::Error),
    UnsupportedVersion { got: u32 },
}

impl std::fmt::Display for CursorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Malformed(err) => write!(f, "malformed paging key: {err}"),
            Self::UnsupportedVersion { got } => {
                write!(f, "unsupported paging key version: {got}")
            }
        }
    }
}

impl std::error::Error for CursorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Malformed(err) => Some(err),
            Self::UnsupportedVersion { .. } => None,
        }
    }
}

#[derive(Serialize, Deserialize)]
struct WireKey {
    v: u32,
    last_id: String,
}

impl PagingKey {
    pub fn encode(&self) -> Result<Vec<u8>, CursorError> {
        let wire = match self {
            Self::End => None,
            Self::Resume(last_id) => Some(WireKey {
                v: PAGING_KEY_VERSION,
                last_id: last_id.clone(),
            }),
        };
        serde_json::to_vec(&wire).map_err(CursorError::Malformed)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, CursorError> {
        let wire: Option<WireKey> =
            serde_json::from_slice(bytes).map_err(CursorError::Malformed)?;
        match wire {
            None => Ok(Self::End),
            Some(key) if key.v == PAGING_KEY_VERSION => Ok(Self::Resume(key.last_id)),
            Some(key) => Err(CursorError::UnsupportedVersion { got: key.v }),
        }
    }
}
