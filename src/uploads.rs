use rand::Rng;
use serde_derive::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

const LOCAL_ID_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const LOCAL_ID_LEN: usize = 11;

/// A file picked by the user that has not been attached to the draft yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingFile {
    pub name: String,
    pub data: Vec<u8>,
}

impl PendingFile {
    pub fn new(name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
        }
    }
}

/// Reference to bytes held by an [`UploadSession`], shaped like `blob:<uuid>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlobRef(Uuid);

impl fmt::Display for BlobRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "blob:{}", self.0)
    }
}

/// Descriptor stored in the draft for every attached file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedFile {
    pub id: String,
    pub name: String,
    pub reference: BlobRef,
}

/// Owns the bytes of every file attached during one form session. Dropping
/// the session releases them all.
#[derive(Debug, Default)]
pub struct UploadSession {
    blobs: HashMap<BlobRef, Vec<u8>>,
}

impl UploadSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach(&mut self, file: PendingFile) -> UploadedFile {
        let reference = BlobRef(Uuid::new_v4());
        self.blobs.insert(reference, file.data);
        UploadedFile {
            id: local_id(),
            name: file.name,
            reference,
        }
    }

    pub fn resolve(&self, reference: &BlobRef) -> Option<&[u8]> {
        self.blobs.get(reference).map(Vec::as_slice)
    }

    pub fn release(&mut self, reference: &BlobRef) -> bool {
        self.blobs.remove(reference).is_some()
    }

    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }
}

/// Short random base-36 id, unique enough to key a list in one form.
pub fn local_id() -> String {
    let mut rng = rand::thread_rng();
    (0..LOCAL_ID_LEN)
        .map(|_| LOCAL_ID_ALPHABET[rng.gen_range(0..LOCAL_ID_ALPHABET.len())] as char)
        .collect()
}
