use serde::Serialize;
use warp::reject;

use crate::errors::BackendError;

#[derive(Debug)]
pub struct Rejection {
    pub(crate) context: Context,
    pub(crate) error: BackendError,
}

impl Rejection {
    pub fn new(context: Context, error: BackendError) -> Self {
        Rejection { context, error }
    }

    pub fn flatten(&self) -> FlattenedRejection {
        FlattenedRejection {
            ok: false,
            context: self.context.clone(),
            error: self.error.public_message(),
        }
    }
}

impl reject::Reject for Rejection {}

#[derive(Debug, Serialize)]
pub struct FlattenedRejection {
    pub(crate) ok: bool,
    #[serde(flatten)]
    pub(crate) context: Context,
    pub(crate) error: String,
}

/// What a request was doing when it failed.
#[derive(Clone, Debug, Serialize)]
#[serde(untagged)]
pub enum Context {
    Album { album: String },
    Albums,
    Categories,
    Category { id: String },
    Contact { id: Option<String> },
    Contacts,
    Login,
    Logout,
    Me,
    Media,
    MediaItem { id: String },
    Showcase,
    Signature,
    User { id: Option<String> },
    Users,
}

impl Context {
    pub fn album(album: String) -> Context {
        Context::Album { album }
    }

    pub fn category(id: String) -> Context {
        Context::Category { id }
    }

    pub fn contact(id: Option<String>) -> Context {
        Context::Contact { id }
    }

    pub fn media_item(id: String) -> Context {
        Context::MediaItem { id }
    }

    pub fn user(id: Option<String>) -> Context {
        Context::User { id }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejections_flatten_into_error_bodies() {
        let rejection = Rejection::new(Context::category("abc".to_owned()), BackendError::NotFound);

        assert_eq!(
            serde_json::to_value(rejection.flatten()).unwrap(),
            serde_json::json!({ "ok": false, "id": "abc", "error": "not found" })
        );
    }

    #[test]
    fn internal_failures_stay_vague() {
        let rejection = Rejection::new(
            Context::Albums,
            BackendError::UnexpectedValue {
                column: "type",
                value: "audio".to_owned(),
            },
        );

        assert_eq!(
            serde_json::to_value(rejection.flatten()).unwrap(),
            serde_json::json!({ "ok": false, "error": "internal error" })
        );
    }
}
