use futures::future::BoxFuture;
use serde::Serialize;

use crate::errors::BackendError;
use crate::media::ExternalAssetKind;

pub mod cloudinary;
pub mod mock;

pub use self::cloudinary::Cloudinary;

pub trait MediaHost: Send + Sync {
    /// Deletes a hosted file. Deleting a file that no longer exists
    /// succeeds.
    fn destroy(&self, public_id: &str, kind: ExternalAssetKind)
        -> BoxFuture<Result<(), BackendError>>;

    /// Signs the parameters the browser upload widget sends with a new
    /// file.
    fn sign_upload(&self, timestamp: i64) -> UploadSignature;
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadSignature {
    pub cloud_name: String,
    pub api_key: String,
    pub timestamp: i64,
    pub folder: String,
    pub upload_preset: String,
    pub signature: String,
}
