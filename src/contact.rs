use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::Db;
use crate::errors::BackendError;
use crate::normalization::{deserialize_option, normalize_email};
use crate::times::Times;

/// A message left through the public contact form.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub message: String,
    pub read: bool,
    pub ip: Option<String>,
    pub user_agent: Option<String>,

    #[serde(flatten)]
    pub times: Times,
}

#[derive(Clone, Debug)]
pub struct NewContact {
    pub name: String,
    pub email: String,
    pub message: String,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
}

impl NewContact {
    pub fn into_contact(self, id: Uuid, times: Times) -> Contact {
        Contact {
            id,
            name: self.name,
            email: self.email,
            message: self.message,
            read: false,
            ip: self.ip,
            user_agent: self.user_agent,
            times,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ContactPayload {
    #[serde(default, deserialize_with = "deserialize_option")]
    pub name: Option<String>,

    #[serde(default)]
    pub email: Option<String>,

    #[serde(default, deserialize_with = "deserialize_option")]
    pub message: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ContactPatch {
    #[serde(default)]
    pub read: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ContactQuery {
    pub read: Option<String>,
}

/// Where a message came from.
#[derive(Clone, Debug, Default)]
pub struct Origin {
    pub ip: Option<String>,
    pub user_agent: Option<String>,
}

pub async fn create(
    db: &dyn Db,
    payload: ContactPayload,
    origin: Origin,
) -> Result<Contact, BackendError> {
    let email = payload.email.map(normalize_email).filter(|e| !e.is_empty());

    match (payload.name, email, payload.message) {
        (Some(name), Some(email), Some(message)) => {
            db.insert_contact(NewContact {
                name,
                email,
                message,
                ip: origin.ip,
                user_agent: origin.user_agent,
            })
            .await
        }
        _ => Err(BackendError::InvalidInput(
            "name, email and message are required".to_owned(),
        )),
    }
}

pub async fn update(db: &dyn Db, id: &Uuid, patch: ContactPatch) -> Result<Contact, BackendError> {
    db.update_contact(id, patch.read)
        .await?
        .ok_or(BackendError::NotFound)
}

pub async fn delete(db: &dyn Db, id: &Uuid) -> Result<(), BackendError> {
    if db.delete_contact(id).await? {
        Ok(())
    } else {
        Err(BackendError::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::MemoryDb;

    fn payload(name: &str, email: &str, message: &str) -> ContactPayload {
        serde_json::from_value(serde_json::json!({
            "name": name,
            "email": email,
            "message": message,
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn messages_need_every_field() {
        let db = MemoryDb::new();

        for p in vec![
            payload(" ", "a@example.com", "hi"),
            payload("Ana", "  ", "hi"),
            payload("Ana", "a@example.com", "\n"),
        ] {
            let result = create(&db, p, Origin::default()).await;
            assert!(matches!(result, Err(BackendError::InvalidInput(_))));
        }
    }

    #[tokio::test]
    async fn messages_start_unread_and_can_be_marked() {
        let db = MemoryDb::new();
        let origin = Origin {
            ip: Some("203.0.113.7".to_owned()),
            user_agent: Some("curl/8.0".to_owned()),
        };

        let contact = create(&db, payload(" Ana ", " Ana@Example.com", " Hello "), origin)
            .await
            .unwrap();

        assert_eq!(contact.name, "Ana");
        assert_eq!(contact.email, "ana@example.com");
        assert_eq!(contact.message, "Hello");
        assert!(!contact.read);
        assert_eq!(contact.ip.as_deref(), Some("203.0.113.7"));

        let updated = update(&db, &contact.id, ContactPatch { read: Some(true) })
            .await
            .unwrap();
        assert!(updated.read);

        assert_eq!(db.retrieve_contacts(Some(false)).await.unwrap().len(), 0);
        assert_eq!(db.retrieve_contacts(Some(true)).await.unwrap().len(), 1);

        delete(&db, &contact.id).await.unwrap();
        assert!(matches!(delete(&db, &contact.id).await, Err(BackendError::NotFound)));
    }
}
