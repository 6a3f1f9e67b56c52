use futures::future::BoxFuture;
use uuid::Uuid;

use crate::category::{Category, CategoryFilter, NewCategory};
use crate::contact::{Contact, NewContact};
use crate::errors::BackendError;
use crate::media::{MediaFilter, MediaRecord, NewMedia};
use crate::user::{Credentials, NewUser, User, UserChanges};

pub mod memory;

pub trait Db: Send + Sync {
    /// Checks that the database answers.
    fn ping(&self) -> BoxFuture<Result<(), BackendError>>;

    fn retrieve_categories(
        &self,
        filter: CategoryFilter,
    ) -> BoxFuture<Result<Vec<Category>, BackendError>>;

    fn retrieve_category(&self, id: &Uuid) -> BoxFuture<Result<Option<Category>, BackendError>>;

    fn insert_category(&self, category: NewCategory) -> BoxFuture<Result<Category, BackendError>>;

    fn update_category(
        &self,
        category: Category,
    ) -> BoxFuture<Result<Option<Category>, BackendError>>;

    /// Returns whether a category was deleted. Fails with
    /// `CategoryInUse` while media still refers to it.
    fn delete_category(&self, id: &Uuid) -> BoxFuture<Result<bool, BackendError>>;

    /// Lists media covers first, then newest first.
    fn retrieve_media(&self, filter: MediaFilter)
        -> BoxFuture<Result<Vec<MediaRecord>, BackendError>>;

    fn retrieve_media_item(&self, id: &Uuid)
        -> BoxFuture<Result<Option<MediaRecord>, BackendError>>;

    /// Lists the members of `album`, optionally only those filed under
    /// the given classifications.
    fn retrieve_album_members(
        &self,
        album: &str,
        classifications: Option<Vec<Uuid>>,
    ) -> BoxFuture<Result<Vec<MediaRecord>, BackendError>>;

    /// Stores a record. A cover is only stored while its album has
    /// fewer than `MAX_COVERS_PER_ALBUM` other covers; the check and the
    /// write cannot interleave with another cover write on that album.
    fn insert_media(&self, media: NewMedia) -> BoxFuture<Result<MediaRecord, BackendError>>;

    /// Overwrites the mutable fields of a record, under the same cover
    /// rule as `insert_media`.
    fn update_media(
        &self,
        record: MediaRecord,
    ) -> BoxFuture<Result<Option<MediaRecord>, BackendError>>;

    fn delete_media(&self, id: &Uuid) -> BoxFuture<Result<bool, BackendError>>;

    /// Deletes the members of `album`, returning how many went.
    fn delete_album_members(
        &self,
        album: &str,
        classifications: Option<Vec<Uuid>>,
    ) -> BoxFuture<Result<u64, BackendError>>;

    fn retrieve_users(&self) -> BoxFuture<Result<Vec<User>, BackendError>>;

    fn retrieve_user(&self, id: &Uuid) -> BoxFuture<Result<Option<User>, BackendError>>;

    fn retrieve_credentials(
        &self,
        email: &str,
    ) -> BoxFuture<Result<Option<Credentials>, BackendError>>;

    /// Fails with `EmailAlreadyExists` if the email is taken.
    fn insert_user(&self, user: NewUser) -> BoxFuture<Result<User, BackendError>>;

    fn update_user(
        &self,
        id: &Uuid,
        changes: UserChanges,
    ) -> BoxFuture<Result<Option<User>, BackendError>>;

    fn delete_user(&self, id: &Uuid) -> BoxFuture<Result<bool, BackendError>>;

    fn insert_contact(&self, contact: NewContact) -> BoxFuture<Result<Contact, BackendError>>;

    fn retrieve_contacts(&self, read: Option<bool>)
        -> BoxFuture<Result<Vec<Contact>, BackendError>>;

    fn update_contact(
        &self,
        id: &Uuid,
        read: Option<bool>,
    ) -> BoxFuture<Result<Option<Contact>, BackendError>>;

    fn delete_contact(&self, id: &Uuid) -> BoxFuture<Result<bool, BackendError>>;
}

pub use self::postgres::*;

mod postgres {
    use futures::future::BoxFuture;
    use futures::FutureExt;
    use sqlx::{
        self,
        postgres::{PgPool, PgRow},
        Postgres, Transaction,
    };
    use uuid::Uuid;

    use crate::albums::cover::MAX_COVERS_PER_ALBUM;
    use crate::auth::Role;
    use crate::category::{Category, CategoryFilter, NewCategory};
    use crate::contact::{Contact, NewContact};
    use crate::errors::BackendError;
    use crate::media::{ExternalAssetKind, MediaFilter, MediaKind, MediaRecord, NewMedia};
    use crate::times::Times;
    use crate::user::{Credentials, NewUser, User, UserChanges};

    const USERS_EMAIL_CONSTRAINT: &str = "users_email_key";
    const MEDIA_CATEGORY_CONSTRAINT: &str = "media_category_fkey";
    const MEDIA_COVER_CONSTRAINT: &str = "media_cover_requires_album";

    pub struct PgDb {
        pool: PgPool,
    }

    impl PgDb {
        pub fn new(pool: PgPool) -> Self {
            PgDb { pool }
        }
    }

    // these can be simplified once async functions in traits are stabilized
    impl super::Db for PgDb {
        fn ping(&self) -> BoxFuture<Result<(), BackendError>> {
            async move {
                let query = sqlx::query("SELECT 1");

                query.execute(&self.pool).await.map_err(map_sqlx_error)?;

                Ok(())
            }
            .boxed()
        }

        fn retrieve_categories(
            &self,
            filter: CategoryFilter,
        ) -> BoxFuture<Result<Vec<Category>, BackendError>> {
            async move {
                let query = sqlx::query(include_str!("queries/retrieve_categories.sql"));

                let categories = query
                    .bind(filter.kind.map(|k| k.as_str()))
                    .bind(filter.active)
                    .try_map(|row: PgRow| category_from_row(&row))
                    .fetch_all(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?;

                Ok(categories)
            }
            .boxed()
        }

        fn retrieve_category(&self, id: &Uuid) -> BoxFuture<Result<Option<Category>, BackendError>> {
            let id = *id;

            async move {
                let query = sqlx::query(include_str!("queries/retrieve_category.sql"));

                let category = query
                    .bind(id)
                    .try_map(|row: PgRow| category_from_row(&row))
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?;

                Ok(category)
            }
            .boxed()
        }

        fn insert_category(&self, category: NewCategory) -> BoxFuture<Result<Category, BackendError>> {
            async move {
                let query = sqlx::query(include_str!("queries/insert_category.sql"));

                let category = query
                    .bind(Uuid::new_v4())
                    .bind(&category.name)
                    .bind(category.kind.as_str())
                    .bind(category.active)
                    .try_map(|row: PgRow| category_from_row(&row))
                    .fetch_one(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?;

                Ok(category)
            }
            .boxed()
        }

        fn update_category(
            &self,
            category: Category,
        ) -> BoxFuture<Result<Option<Category>, BackendError>> {
            async move {
                let query = sqlx::query(include_str!("queries/update_category.sql"));

                let category = query
                    .bind(category.id)
                    .bind(&category.name)
                    .bind(category.kind.as_str())
                    .bind(category.active)
                    .try_map(|row: PgRow| category_from_row(&row))
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?;

                Ok(category)
            }
            .boxed()
        }

        fn delete_category(&self, id: &Uuid) -> BoxFuture<Result<bool, BackendError>> {
            let id = *id;

            async move {
                let query = sqlx::query(include_str!("queries/delete_category.sql"));

                let count = query
                    .bind(id)
                    .execute(&self.pool)
                    .await
                    .map_err(|e| match e {
                        sqlx::Error::Database(ref d)
                            if d.constraint() == Some(MEDIA_CATEGORY_CONSTRAINT) =>
                        {
                            BackendError::CategoryInUse
                        }
                        e => map_sqlx_error(e),
                    })?
                    .rows_affected();

                Ok(count > 0)
            }
            .boxed()
        }

        fn retrieve_media(
            &self,
            filter: MediaFilter,
        ) -> BoxFuture<Result<Vec<MediaRecord>, BackendError>> {
            async move {
                let query = sqlx::query(include_str!("queries/retrieve_media.sql"));

                let media = query
                    .bind(filter.classifications)
                    .bind(filter.featured)
                    .try_map(|row: PgRow| media_from_row(&row))
                    .fetch_all(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?;

                Ok(media)
            }
            .boxed()
        }

        fn retrieve_media_item(
            &self,
            id: &Uuid,
        ) -> BoxFuture<Result<Option<MediaRecord>, BackendError>> {
            let id = *id;

            async move {
                let query = sqlx::query(include_str!("queries/retrieve_media_item.sql"));

                let record = query
                    .bind(id)
                    .try_map(|row: PgRow| media_from_row(&row))
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?;

                Ok(record)
            }
            .boxed()
        }

        fn retrieve_album_members(
            &self,
            album: &str,
            classifications: Option<Vec<Uuid>>,
        ) -> BoxFuture<Result<Vec<MediaRecord>, BackendError>> {
            let album = album.to_owned();

            async move {
                let query = sqlx::query(include_str!("queries/retrieve_album_members.sql"));

                let members = query
                    .bind(album)
                    .bind(classifications)
                    .try_map(|row: PgRow| media_from_row(&row))
                    .fetch_all(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?;

                Ok(members)
            }
            .boxed()
        }

        fn insert_media(&self, media: NewMedia) -> BoxFuture<Result<MediaRecord, BackendError>> {
            async move {
                let id = Uuid::new_v4();
                let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

                if media.is_cover {
                    reserve_cover(&mut tx, media.album.as_deref(), &id).await?;
                }

                let query = sqlx::query(include_str!("queries/insert_media.sql"));

                let record = query
                    .bind(id)
                    .bind(media.kind.as_str())
                    .bind(media.category_id)
                    .bind(&media.album)
                    .bind(media.is_cover)
                    .bind(media.is_featured)
                    .bind(&media.title)
                    .bind(&media.name)
                    .bind(&media.description)
                    .bind(&media.url)
                    .bind(&media.thumbnail_url)
                    .bind(&media.public_id)
                    .bind(media.resource_type.map(|r| r.as_str()))
                    .bind(&media.full_video_url)
                    .try_map(|row: PgRow| media_from_row(&row))
                    .fetch_one(&mut tx)
                    .await
                    .map_err(map_media_error)?;

                tx.commit().await.map_err(map_sqlx_error)?;

                Ok(record)
            }
            .boxed()
        }

        fn update_media(
            &self,
            record: MediaRecord,
        ) -> BoxFuture<Result<Option<MediaRecord>, BackendError>> {
            async move {
                let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

                if record.is_cover {
                    reserve_cover(&mut tx, record.album.as_deref(), &record.id).await?;
                }

                let query = sqlx::query(include_str!("queries/update_media.sql"));

                let updated = query
                    .bind(record.id)
                    .bind(&record.album)
                    .bind(record.is_cover)
                    .bind(record.is_featured)
                    .bind(&record.title)
                    .bind(&record.name)
                    .bind(&record.description)
                    .bind(&record.thumbnail_url)
                    .bind(&record.full_video_url)
                    .try_map(|row: PgRow| media_from_row(&row))
                    .fetch_optional(&mut tx)
                    .await
                    .map_err(map_media_error)?;

                tx.commit().await.map_err(map_sqlx_error)?;

                Ok(updated)
            }
            .boxed()
        }

        fn delete_media(&self, id: &Uuid) -> BoxFuture<Result<bool, BackendError>> {
            let id = *id;

            async move {
                let query = sqlx::query(include_str!("queries/delete_media.sql"));

                let count = query
                    .bind(id)
                    .execute(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?
                    .rows_affected();

                Ok(count > 0)
            }
            .boxed()
        }

        fn delete_album_members(
            &self,
            album: &str,
            classifications: Option<Vec<Uuid>>,
        ) -> BoxFuture<Result<u64, BackendError>> {
            let album = album.to_owned();

            async move {
                let query = sqlx::query(include_str!("queries/delete_album_members.sql"));

                let count = query
                    .bind(album)
                    .bind(classifications)
                    .execute(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?
                    .rows_affected();

                Ok(count)
            }
            .boxed()
        }

        fn retrieve_users(&self) -> BoxFuture<Result<Vec<User>, BackendError>> {
            async move {
                let query = sqlx::query(include_str!("queries/retrieve_users.sql"));

                let users = query
                    .try_map(|row: PgRow| user_from_row(&row))
                    .fetch_all(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?;

                Ok(users)
            }
            .boxed()
        }

        fn retrieve_user(&self, id: &Uuid) -> BoxFuture<Result<Option<User>, BackendError>> {
            let id = *id;

            async move {
                let query = sqlx::query(include_str!("queries/retrieve_user.sql"));

                let user = query
                    .bind(id)
                    .try_map(|row: PgRow| user_from_row(&row))
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?;

                Ok(user)
            }
            .boxed()
        }

        fn retrieve_credentials(
            &self,
            email: &str,
        ) -> BoxFuture<Result<Option<Credentials>, BackendError>> {
            let email = email.to_owned();

            async move {
                let query = sqlx::query(include_str!("queries/retrieve_credentials.sql"));

                let credentials = query
                    .bind(email)
                    .try_map(|row: PgRow| {
                        Ok(Credentials {
                            user: user_from_row(&row)?,
                            password_hash: try_get(&row, "password_hash")?,
                        })
                    })
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?;

                Ok(credentials)
            }
            .boxed()
        }

        fn insert_user(&self, user: NewUser) -> BoxFuture<Result<User, BackendError>> {
            async move {
                let query = sqlx::query(include_str!("queries/insert_user.sql"));

                let user = query
                    .bind(Uuid::new_v4())
                    .bind(&user.email)
                    .bind(&user.password_hash)
                    .bind(Role::Admin.as_str())
                    .bind(&user.name)
                    .try_map(|row: PgRow| user_from_row(&row))
                    .fetch_one(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?;

                Ok(user)
            }
            .boxed()
        }

        fn update_user(
            &self,
            id: &Uuid,
            changes: UserChanges,
        ) -> BoxFuture<Result<Option<User>, BackendError>> {
            let id = *id;

            async move {
                let query = sqlx::query(include_str!("queries/update_user.sql"));

                let user = query
                    .bind(id)
                    .bind(&changes.email)
                    .bind(&changes.password_hash)
                    .bind(changes.name.is_some())
                    .bind(changes.name.flatten())
                    .try_map(|row: PgRow| user_from_row(&row))
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?;

                Ok(user)
            }
            .boxed()
        }

        fn delete_user(&self, id: &Uuid) -> BoxFuture<Result<bool, BackendError>> {
            let id = *id;

            async move {
                let query = sqlx::query(include_str!("queries/delete_user.sql"));

                let count = query
                    .bind(id)
                    .execute(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?
                    .rows_affected();

                Ok(count > 0)
            }
            .boxed()
        }

        fn insert_contact(&self, contact: NewContact) -> BoxFuture<Result<Contact, BackendError>> {
            async move {
                let query = sqlx::query(include_str!("queries/insert_contact.sql"));

                let contact = query
                    .bind(Uuid::new_v4())
                    .bind(&contact.name)
                    .bind(&contact.email)
                    .bind(&contact.message)
                    .bind(&contact.ip)
                    .bind(&contact.user_agent)
                    .try_map(|row: PgRow| contact_from_row(&row))
                    .fetch_one(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?;

                Ok(contact)
            }
            .boxed()
        }

        fn retrieve_contacts(
            &self,
            read: Option<bool>,
        ) -> BoxFuture<Result<Vec<Contact>, BackendError>> {
            async move {
                let query = sqlx::query(include_str!("queries/retrieve_contacts.sql"));

                let contacts = query
                    .bind(read)
                    .try_map(|row: PgRow| contact_from_row(&row))
                    .fetch_all(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?;

                Ok(contacts)
            }
            .boxed()
        }

        fn update_contact(
            &self,
            id: &Uuid,
            read: Option<bool>,
        ) -> BoxFuture<Result<Option<Contact>, BackendError>> {
            let id = *id;

            async move {
                let query = sqlx::query(include_str!("queries/update_contact.sql"));

                let contact = query
                    .bind(id)
                    .bind(read)
                    .try_map(|row: PgRow| contact_from_row(&row))
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?;

                Ok(contact)
            }
            .boxed()
        }

        fn delete_contact(&self, id: &Uuid) -> BoxFuture<Result<bool, BackendError>> {
            let id = *id;

            async move {
                let query = sqlx::query(include_str!("queries/delete_contact.sql"));

                let count = query
                    .bind(id)
                    .execute(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?
                    .rows_affected();

                Ok(count > 0)
            }
            .boxed()
        }
    }

    /// Takes the album's cover lock for the rest of the transaction and
    /// checks that there is room for one more cover besides `id`.
    async fn reserve_cover(
        tx: &mut Transaction<'_, Postgres>,
        album: Option<&str>,
        id: &Uuid,
    ) -> Result<(), BackendError> {
        let album = album.ok_or(BackendError::CoverWithoutAlbum)?;

        sqlx::query(include_str!("queries/lock_album.sql"))
            .bind(album)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

        let (count,): (i64,) = sqlx::query_as(include_str!("queries/count_other_covers.sql"))
            .bind(album)
            .bind(id)
            .fetch_one(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

        if count as usize >= MAX_COVERS_PER_ALBUM {
            Err(BackendError::CoverLimitReached {
                limit: MAX_COVERS_PER_ALBUM,
            })
        } else {
            Ok(())
        }
    }

    fn times_from_row(row: &PgRow) -> Result<Times, sqlx::Error> {
        Ok(Times::new(
            try_get(row, "created_at")?,
            try_get(row, "updated_at")?,
        ))
    }

    fn category_from_row(row: &PgRow) -> Result<Category, sqlx::Error> {
        let kind: String = try_get(row, "kind")?;

        Ok(Category {
            id: try_get(row, "id")?,
            name: try_get(row, "name")?,
            kind: parse_column("kind", kind)?,
            active: try_get(row, "active")?,
            times: times_from_row(row)?,
        })
    }

    fn media_from_row(row: &PgRow) -> Result<MediaRecord, sqlx::Error> {
        let kind: String = try_get(row, "kind")?;
        let resource_type: Option<String> = try_get(row, "resource_type")?;

        // we use `match` here instead of `resource_type.map` so that we can use `?`
        let resource_type: Option<ExternalAssetKind> = match resource_type {
            Some(r) => Some(parse_column("resource_type", r)?),
            None => None,
        };

        Ok(MediaRecord {
            id: try_get(row, "id")?,
            kind: parse_column::<MediaKind>("kind", kind)?,
            category_id: try_get(row, "category_id")?,
            album: try_get(row, "album")?,
            is_cover: try_get(row, "is_cover")?,
            is_featured: try_get(row, "is_featured")?,
            title: try_get(row, "title")?,
            name: try_get(row, "name")?,
            description: try_get(row, "description")?,
            url: try_get(row, "url")?,
            thumbnail_url: try_get(row, "thumbnail_url")?,
            public_id: try_get(row, "public_id")?,
            resource_type,
            full_video_url: try_get(row, "full_video_url")?,
            times: times_from_row(row)?,
        })
    }

    fn user_from_row(row: &PgRow) -> Result<User, sqlx::Error> {
        let role: String = try_get(row, "role")?;

        Ok(User {
            id: try_get(row, "id")?,
            email: try_get(row, "email")?,
            role: parse_column::<Role>("role", role)?,
            name: try_get(row, "name")?,
            times: times_from_row(row)?,
        })
    }

    fn contact_from_row(row: &PgRow) -> Result<Contact, sqlx::Error> {
        Ok(Contact {
            id: try_get(row, "id")?,
            name: try_get(row, "name")?,
            email: try_get(row, "email")?,
            message: try_get(row, "message")?,
            read: try_get(row, "read")?,
            ip: try_get(row, "ip")?,
            user_agent: try_get(row, "user_agent")?,
            times: times_from_row(row)?,
        })
    }

    fn parse_column<T: std::str::FromStr>(
        column: &'static str,
        value: String,
    ) -> Result<T, sqlx::Error> {
        value.parse().map_err(|_| {
            // the schema's CHECK constraints should rule this out
            sqlx::Error::Decode(Box::new(BackendError::UnexpectedValue { column, value: value.clone() }))
        })
    }

    fn try_get<'a, T: sqlx::Type<sqlx::Postgres> + sqlx::decode::Decode<'a, sqlx::Postgres>>(
        row: &'a PgRow,
        column: &str,
    ) -> Result<T, sqlx::Error> {
        use sqlx::prelude::*;

        row.try_get(column)
    }

    fn map_media_error(error: sqlx::Error) -> BackendError {
        use sqlx::Error;

        match error {
            Error::Database(ref e) if e.constraint() == Some(MEDIA_CATEGORY_CONSTRAINT) => {
                BackendError::InvalidInput("category does not exist".to_owned())
            }
            Error::Database(ref e) if e.constraint() == Some(MEDIA_COVER_CONSTRAINT) => {
                BackendError::CoverWithoutAlbum
            }
            _ => map_sqlx_error(error),
        }
    }

    fn map_sqlx_error(error: sqlx::Error) -> BackendError {
        use sqlx::Error;

        match error {
            Error::Database(ref e) if e.constraint() == Some(USERS_EMAIL_CONSTRAINT) => {
                BackendError::EmailAlreadyExists
            }
            _ => BackendError::Sqlx { source: error },
        }
    }
}
