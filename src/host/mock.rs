use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};

use futures::future::{self, BoxFuture, FutureExt};

use super::cloudinary::{sign_parameters, SignatureAlgorithm};
use super::{MediaHost, UploadSignature};
use crate::errors::BackendError;
use crate::media::ExternalAssetKind;

const MOCK_SECRET: &str = "mock-secret";

/// A media host that remembers what it was asked to delete.
#[derive(Default)]
pub struct MockHost {
    destroyed: Mutex<Vec<(String, ExternalAssetKind)>>,
    failing: HashSet<String>,
}

impl MockHost {
    pub fn new() -> Self {
        Default::default()
    }

    /// A host that refuses to delete the given public ids.
    pub fn failing_for(public_ids: Vec<String>) -> Self {
        MockHost {
            failing: public_ids.into_iter().collect(),
            ..Default::default()
        }
    }

    /// The files deleted so far, in order.
    pub fn destroyed(&self) -> Vec<(String, ExternalAssetKind)> {
        self.destroyed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl MediaHost for MockHost {
    fn destroy(
        &self,
        public_id: &str,
        kind: ExternalAssetKind,
    ) -> BoxFuture<Result<(), BackendError>> {
        if self.failing.contains(public_id) {
            return future::ready(Err(BackendError::MediaHostRejected {
                status: 500,
                message: format!("refusing to delete {}", public_id),
            }))
            .boxed();
        }

        self.destroyed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((public_id.to_owned(), kind));

        future::ready(Ok(())).boxed()
    }

    fn sign_upload(&self, timestamp: i64) -> UploadSignature {
        let folder = "portfolio".to_owned();
        let upload_preset = "mock".to_owned();
        let parameters = [
            ("folder", folder.clone()),
            ("timestamp", timestamp.to_string()),
            ("upload_preset", upload_preset.clone()),
        ];

        UploadSignature {
            cloud_name: "mock".to_owned(),
            api_key: "mock-key".to_owned(),
            timestamp,
            folder,
            upload_preset,
            signature: sign_parameters(&parameters, MOCK_SECRET, SignatureAlgorithm::Sha1),
        }
    }
}
