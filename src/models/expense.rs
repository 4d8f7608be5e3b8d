use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// One expense submission, request-scoped. The receipt is forwarded to
/// external storage and then discarded; nothing here is persisted.
#[derive(Debug, Clone)]
pub struct ExpenseSubmission {
    pub description: String,
    pub amount: f64,
    pub receipt: Bytes,
    pub mime_type: String,
    pub original_filename: String,
}

/// Durable reference returned by the storage provider after an upload.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct UploadResult {
    pub file_id: String,
    pub link: String,
}

/// Profile info fetched from the identity provider's userinfo endpoint.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    pub name: String,
}
