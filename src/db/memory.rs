//! An in-process `Db` for tests and local experiments. It keeps the
//! same invariants as the PostgreSQL schema: unique emails, categories
//! that cannot be deleted while in use, and the per-album cover cap.

use std::sync::{Mutex, MutexGuard, PoisonError};

use futures::future::{self, BoxFuture, FutureExt};
use uuid::Uuid;

use crate::albums::cover::MAX_COVERS_PER_ALBUM;
use crate::auth::Role;
use crate::category::{Category, CategoryFilter, NewCategory};
use crate::contact::{Contact, NewContact};
use crate::errors::BackendError;
use crate::media::{MediaFilter, MediaRecord, NewMedia};
use crate::times::Times;
use crate::user::{Credentials, NewUser, User, UserChanges};

#[derive(Default)]
struct State {
    categories: Vec<Category>,
    media: Vec<MediaRecord>,
    users: Vec<Credentials>,
    contacts: Vec<Contact>,
}

impl State {
    fn check_cover(&self, record: &MediaRecord) -> Result<(), BackendError> {
        if !record.is_cover {
            return Ok(());
        }

        let album = record.album.as_ref().ok_or(BackendError::CoverWithoutAlbum)?;
        let covers = self
            .media
            .iter()
            .filter(|m| m.id != record.id && m.is_cover && m.album.as_ref() == Some(album))
            .count();

        if covers >= MAX_COVERS_PER_ALBUM {
            Err(BackendError::CoverLimitReached {
                limit: MAX_COVERS_PER_ALBUM,
            })
        } else {
            Ok(())
        }
    }

    fn email_taken(&self, email: &str, except: Option<&Uuid>) -> bool {
        self.users
            .iter()
            .any(|c| c.user.email == email && Some(&c.user.id) != except)
    }
}

#[derive(Default)]
pub struct MemoryDb {
    state: Mutex<State>,
}

impl MemoryDb {
    pub fn new() -> Self {
        Default::default()
    }

    /// Stores a category as is, bypassing validation.
    pub fn seed_category(&self, category: Category) {
        self.lock().categories.push(category);
    }

    /// Stores a record as is, bypassing validation.
    pub fn seed_media(&self, record: MediaRecord) {
        self.lock().media.push(record);
    }

    fn lock(&self) -> MutexGuard<State> {
        // a panicking test must not take every later test down with it
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Newest first. Items are kept in insertion order, so reversing before
/// a stable sort puts the later of two equal timestamps first.
fn newest_first<T: Clone>(items: &[T], times: impl Fn(&T) -> &Times) -> Vec<T> {
    let mut items = items.iter().rev().cloned().collect::<Vec<_>>();
    items.sort_by(|a, b| times(b).created_at.cmp(&times(a).created_at));

    items
}

fn covers_first(media: Vec<MediaRecord>) -> Vec<MediaRecord> {
    let mut media = newest_first(&media, |m| &m.times);
    media.sort_by(|a, b| b.is_cover.cmp(&a.is_cover));

    media
}

fn in_classifications(record: &MediaRecord, classifications: &Option<Vec<Uuid>>) -> bool {
    classifications
        .as_ref()
        .map_or(true, |ids| ids.contains(&record.category_id))
}

fn done<'a, T: Send + 'a>(result: Result<T, BackendError>) -> BoxFuture<'a, Result<T, BackendError>> {
    future::ready(result).boxed()
}

impl super::Db for MemoryDb {
    fn ping(&self) -> BoxFuture<Result<(), BackendError>> {
        done(Ok(()))
    }

    fn retrieve_categories(
        &self,
        filter: CategoryFilter,
    ) -> BoxFuture<Result<Vec<Category>, BackendError>> {
        let state = self.lock();
        let categories = newest_first(&state.categories, |c| &c.times)
            .into_iter()
            .filter(|c| filter.kind.map_or(true, |k| c.kind == k))
            .filter(|c| filter.active.map_or(true, |a| c.active == a))
            .collect();

        done(Ok(categories))
    }

    fn retrieve_category(&self, id: &Uuid) -> BoxFuture<Result<Option<Category>, BackendError>> {
        let state = self.lock();

        done(Ok(state.categories.iter().find(|c| &c.id == id).cloned()))
    }

    fn insert_category(&self, category: NewCategory) -> BoxFuture<Result<Category, BackendError>> {
        let category = category.into_category(Uuid::new_v4(), Times::now());
        self.lock().categories.push(category.clone());

        done(Ok(category))
    }

    fn update_category(
        &self,
        category: Category,
    ) -> BoxFuture<Result<Option<Category>, BackendError>> {
        let mut state = self.lock();
        let updated = state
            .categories
            .iter_mut()
            .find(|c| c.id == category.id)
            .map(|stored| {
                *stored = Category {
                    times: stored.times.touched(),
                    ..category
                };
                stored.clone()
            });

        done(Ok(updated))
    }

    fn delete_category(&self, id: &Uuid) -> BoxFuture<Result<bool, BackendError>> {
        let mut state = self.lock();

        if state.media.iter().any(|m| &m.category_id == id) {
            return done(Err(BackendError::CategoryInUse));
        }

        let before = state.categories.len();
        state.categories.retain(|c| &c.id != id);

        done(Ok(state.categories.len() < before))
    }

    fn retrieve_media(
        &self,
        filter: MediaFilter,
    ) -> BoxFuture<Result<Vec<MediaRecord>, BackendError>> {
        let state = self.lock();
        let media = state
            .media
            .iter()
            .filter(|m| in_classifications(m, &filter.classifications))
            .filter(|m| filter.featured.map_or(true, |f| m.is_featured == f))
            .cloned()
            .collect();

        done(Ok(covers_first(media)))
    }

    fn retrieve_media_item(
        &self,
        id: &Uuid,
    ) -> BoxFuture<Result<Option<MediaRecord>, BackendError>> {
        let state = self.lock();

        done(Ok(state.media.iter().find(|m| &m.id == id).cloned()))
    }

    fn retrieve_album_members(
        &self,
        album: &str,
        classifications: Option<Vec<Uuid>>,
    ) -> BoxFuture<Result<Vec<MediaRecord>, BackendError>> {
        let state = self.lock();
        let members = state
            .media
            .iter()
            .filter(|m| m.album.as_deref() == Some(album))
            .filter(|m| in_classifications(m, &classifications))
            .cloned()
            .collect();

        done(Ok(covers_first(members)))
    }

    fn insert_media(&self, media: NewMedia) -> BoxFuture<Result<MediaRecord, BackendError>> {
        let mut state = self.lock();

        if !state.categories.iter().any(|c| c.id == media.category_id) {
            return done(Err(BackendError::InvalidInput(
                "category does not exist".to_owned(),
            )));
        }

        let record = media.into_record(Uuid::new_v4(), Times::now());

        if let Err(e) = state.check_cover(&record) {
            return done(Err(e));
        }

        state.media.push(record.clone());

        done(Ok(record))
    }

    fn update_media(
        &self,
        record: MediaRecord,
    ) -> BoxFuture<Result<Option<MediaRecord>, BackendError>> {
        let mut state = self.lock();

        if let Err(e) = state.check_cover(&record) {
            return done(Err(e));
        }

        let updated = state.media.iter_mut().find(|m| m.id == record.id).map(|stored| {
            let times = stored.times.touched();

            *stored = MediaRecord {
                kind: stored.kind,
                category_id: stored.category_id,
                url: stored.url.clone(),
                public_id: stored.public_id.clone(),
                resource_type: stored.resource_type,
                times,
                ..record
            };
            stored.clone()
        });

        done(Ok(updated))
    }

    fn delete_media(&self, id: &Uuid) -> BoxFuture<Result<bool, BackendError>> {
        let mut state = self.lock();
        let before = state.media.len();
        state.media.retain(|m| &m.id != id);

        done(Ok(state.media.len() < before))
    }

    fn delete_album_members(
        &self,
        album: &str,
        classifications: Option<Vec<Uuid>>,
    ) -> BoxFuture<Result<u64, BackendError>> {
        let mut state = self.lock();
        let before = state.media.len();
        state.media.retain(|m| {
            !(m.album.as_deref() == Some(album) && in_classifications(m, &classifications))
        });

        done(Ok((before - state.media.len()) as u64))
    }

    fn retrieve_users(&self) -> BoxFuture<Result<Vec<User>, BackendError>> {
        let state = self.lock();
        let users = state.users.iter().map(|c| c.user.clone()).collect::<Vec<_>>();

        done(Ok(newest_first(&users, |u| &u.times)))
    }

    fn retrieve_user(&self, id: &Uuid) -> BoxFuture<Result<Option<User>, BackendError>> {
        let state = self.lock();

        done(Ok(state
            .users
            .iter()
            .find(|c| &c.user.id == id)
            .map(|c| c.user.clone())))
    }

    fn retrieve_credentials(
        &self,
        email: &str,
    ) -> BoxFuture<Result<Option<Credentials>, BackendError>> {
        let state = self.lock();

        done(Ok(state.users.iter().find(|c| c.user.email == email).cloned()))
    }

    fn insert_user(&self, user: NewUser) -> BoxFuture<Result<User, BackendError>> {
        let mut state = self.lock();

        if state.email_taken(&user.email, None) {
            return done(Err(BackendError::EmailAlreadyExists));
        }

        let stored = User {
            id: Uuid::new_v4(),
            email: user.email,
            role: Role::Admin,
            name: user.name,
            times: Times::now(),
        };

        state.users.push(Credentials {
            user: stored.clone(),
            password_hash: user.password_hash,
        });

        done(Ok(stored))
    }

    fn update_user(
        &self,
        id: &Uuid,
        changes: UserChanges,
    ) -> BoxFuture<Result<Option<User>, BackendError>> {
        let mut state = self.lock();

        if let Some(email) = &changes.email {
            if state.email_taken(email, Some(id)) {
                return done(Err(BackendError::EmailAlreadyExists));
            }
        }

        let updated = state.users.iter_mut().find(|c| &c.user.id == id).map(|stored| {
            if let Some(email) = changes.email {
                stored.user.email = email;
            }

            if let Some(hash) = changes.password_hash {
                stored.password_hash = hash;
            }

            if let Some(name) = changes.name {
                stored.user.name = name;
            }

            stored.user.times = stored.user.times.touched();
            stored.user.clone()
        });

        done(Ok(updated))
    }

    fn delete_user(&self, id: &Uuid) -> BoxFuture<Result<bool, BackendError>> {
        let mut state = self.lock();
        let before = state.users.len();
        state.users.retain(|c| &c.user.id != id);

        done(Ok(state.users.len() < before))
    }

    fn insert_contact(&self, contact: NewContact) -> BoxFuture<Result<Contact, BackendError>> {
        let contact = contact.into_contact(Uuid::new_v4(), Times::now());
        self.lock().contacts.push(contact.clone());

        done(Ok(contact))
    }

    fn retrieve_contacts(
        &self,
        read: Option<bool>,
    ) -> BoxFuture<Result<Vec<Contact>, BackendError>> {
        let state = self.lock();
        let contacts = newest_first(&state.contacts, |c| &c.times)
            .into_iter()
            .filter(|c| read.map_or(true, |r| c.read == r))
            .collect();

        done(Ok(contacts))
    }

    fn update_contact(
        &self,
        id: &Uuid,
        read: Option<bool>,
    ) -> BoxFuture<Result<Option<Contact>, BackendError>> {
        let mut state = self.lock();
        let updated = state.contacts.iter_mut().find(|c| &c.id == id).map(|stored| {
            if let Some(read) = read {
                stored.read = read;
            }

            stored.times = stored.times.touched();
            stored.clone()
        });

        done(Ok(updated))
    }

    fn delete_contact(&self, id: &Uuid) -> BoxFuture<Result<bool, BackendError>> {
        let mut state = self.lock();
        let before = state.contacts.len();
        state.contacts.retain(|c| &c.id != id);

        done(Ok(state.contacts.len() < before))
    }
}
