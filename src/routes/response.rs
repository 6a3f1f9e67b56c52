use serde::Serialize;
use uuid::Uuid;
use warp::reply::{json, Json};

use crate::albums::{AlbumDeletion, AlbumDetail, AlbumPage};
use crate::auth::Session;
use crate::category::Category;
use crate::contact::Contact;
use crate::host::UploadSignature;
use crate::media::{MediaDeletion, MediaRecord};
use crate::showcase::Showcase;
use crate::user::User;

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum SuccessResponse<'a> {
    Album(AlbumDetail),
    AlbumDeletion(AlbumDeletion),
    Albums(AlbumPage),
    Categories {
        categories: Vec<Category>,
    },
    Category {
        category: Category,
    },
    Contact {
        contact: Contact,
    },
    Deleted {
        id: Uuid,
    },
    Healthz {
        database: &'a str,
        revision: Option<&'a str>,
        timestamp: Option<&'a str>,
        version: &'a str,
    },
    Item {
        item: MediaRecord,
    },
    Items {
        items: Vec<MediaRecord>,
    },
    MediaDeletion(MediaDeletion),
    Messages {
        messages: Vec<Contact>,
    },
    Session {
        user: Session,
    },
    Showcase(Showcase),
    Signature(UploadSignature),
    SignedOut {},
    User {
        user: User,
    },
    Users {
        users: Vec<User>,
    },
}

#[derive(Debug, Serialize)]
struct Envelope<'a> {
    ok: bool,
    #[serde(flatten)]
    body: SuccessResponse<'a>,
}

/// Wraps a response body as `{ ok: true, ... }`.
pub fn success(body: SuccessResponse) -> Json {
    json(&Envelope { ok: true, body })
}
