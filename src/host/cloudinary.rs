use std::str::FromStr;

use futures::future::{BoxFuture, FutureExt};
use serde::Deserialize;
use url::Url;

use super::{MediaHost, UploadSignature};
use crate::errors::BackendError;
use crate::media::ExternalAssetKind;

pub const DEFAULT_API_BASE_URL: &str = "https://api.cloudinary.com/";

/// The digest used to sign API parameters.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SignatureAlgorithm {
    Sha1,
    Sha256,
}

impl FromStr for SignatureAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sha1" => Ok(SignatureAlgorithm::Sha1),
            "sha256" => Ok(SignatureAlgorithm::Sha256),
            other => Err(format!("unknown signature algorithm {:?}", other)),
        }
    }
}

/// Signs API parameters: the `key=value` pairs sorted by key and joined
/// with `&`, followed by the secret, digested and hex-encoded.
pub fn sign_parameters(
    parameters: &[(&str, String)],
    secret: &str,
    algorithm: SignatureAlgorithm,
) -> String {
    let mut sorted = parameters
        .iter()
        .filter(|(_, value)| !value.is_empty())
        .collect::<Vec<_>>();
    sorted.sort_by(|a, b| a.0.cmp(b.0));

    let payload = format!(
        "{}{}",
        sorted
            .iter()
            .map(|(key, value)| format!("{}={}", key, value))
            .collect::<Vec<_>>()
            .join("&"),
        secret
    );

    match algorithm {
        SignatureAlgorithm::Sha1 => {
            use sha1::{Digest, Sha1};

            hex::encode(Sha1::digest(payload.as_bytes()))
        }
        SignatureAlgorithm::Sha256 => {
            use sha2::{Digest, Sha256};

            hex::encode(Sha256::digest(payload.as_bytes()))
        }
    }
}

#[derive(Debug, Deserialize)]
struct DestroyResponse {
    result: Option<String>,
    error: Option<ErrorBody>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// A media host that talks to the Cloudinary REST API.
pub struct Cloudinary {
    client: reqwest::Client,
    base_url: Url,
    cloud_name: String,
    api_key: String,
    api_secret: String,
    upload_preset: String,
    folder: String,
    algorithm: SignatureAlgorithm,
}

impl Cloudinary {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        client: reqwest::Client,
        base_url: Url,
        cloud_name: String,
        api_key: String,
        api_secret: String,
        upload_preset: String,
        folder: String,
        algorithm: SignatureAlgorithm,
    ) -> Self {
        Self {
            client,
            base_url,
            cloud_name,
            api_key,
            api_secret,
            upload_preset,
            folder,
            algorithm,
        }
    }

    pub fn from_env() -> Result<Self, url::ParseError> {
        use crate::config::{get_optional_variable, get_variable};

        let base_url = get_optional_variable("CLOUDINARY_API_BASE_URL")
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_owned());
        let algorithm = get_optional_variable("CLOUDINARY_SIGNATURE_ALGORITHM")
            .map(|a| {
                a.parse()
                    .unwrap_or_else(|e| panic!("parse CLOUDINARY_SIGNATURE_ALGORITHM: {}", e))
            })
            .unwrap_or(SignatureAlgorithm::Sha1);

        Ok(Self::new(
            reqwest::Client::new(),
            Url::parse(&base_url)?,
            get_variable("CLOUDINARY_CLOUD_NAME"),
            get_variable("CLOUDINARY_API_KEY"),
            get_variable("CLOUDINARY_API_SECRET"),
            get_variable("CLOUDINARY_UPLOAD_PRESET"),
            get_variable("CLOUDINARY_FOLDER"),
            algorithm,
        ))
    }

    fn destroy_url(&self, kind: ExternalAssetKind) -> Result<Url, url::ParseError> {
        self.base_url.join(&format!(
            "v1_1/{}/{}/destroy",
            self.cloud_name,
            kind.as_str()
        ))
    }
}

impl MediaHost for Cloudinary {
    fn destroy(
        &self,
        public_id: &str,
        kind: ExternalAssetKind,
    ) -> BoxFuture<Result<(), BackendError>> {
        let public_id = public_id.to_owned();

        async move {
            let url = self
                .destroy_url(kind)
                .map_err(|e| BackendError::MediaHostRejected {
                    status: 0,
                    message: format!("invalid destroy URL: {}", e),
                })?;
            let timestamp = time::OffsetDateTime::now_utc().unix_timestamp().to_string();

            let signed = [
                ("invalidate", "true".to_owned()),
                ("public_id", public_id.clone()),
                ("timestamp", timestamp.clone()),
            ];
            let signature = sign_parameters(&signed, &self.api_secret, self.algorithm);

            let response = self
                .client
                .post(url)
                .form(&[
                    ("public_id", public_id.as_str()),
                    ("invalidate", "true"),
                    ("timestamp", timestamp.as_str()),
                    ("api_key", self.api_key.as_str()),
                    ("signature", signature.as_str()),
                ])
                .send()
                .await
                .map_err(|source| BackendError::MediaHost { source })?;

            let status = response.status();
            let body: DestroyResponse = response
                .json()
                .await
                .map_err(|source| BackendError::MediaHost { source })?;

            match body {
                DestroyResponse {
                    error: Some(ErrorBody { message }),
                    ..
                } => Err(BackendError::MediaHostRejected {
                    status: status.as_u16(),
                    message,
                }),
                _ if !status.is_success() => Err(BackendError::MediaHostRejected {
                    status: status.as_u16(),
                    message: body.result.unwrap_or_default(),
                }),
                // "not found" means there is nothing left to delete
                _ => Ok(()),
            }
        }
        .boxed()
    }

    fn sign_upload(&self, timestamp: i64) -> UploadSignature {
        let parameters = [
            ("folder", self.folder.clone()),
            ("timestamp", timestamp.to_string()),
            ("upload_preset", self.upload_preset.clone()),
        ];

        UploadSignature {
            cloud_name: self.cloud_name.clone(),
            api_key: self.api_key.clone(),
            timestamp,
            folder: self.folder.clone(),
            upload_preset: self.upload_preset.clone(),
            signature: sign_parameters(&parameters, &self.api_secret, self.algorithm),
        }
    }
}
