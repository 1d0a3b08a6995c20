use crate::model::{Movie, MovieFields, User};
use chrono::Utc;
use serde::Serialize;
use sled::transaction::{TransactionError, Transactional};
use thiserror::Error;

fn serialize_id(id: u64) -> [u8; 8] {
    id.to_le_bytes()
}

fn deserialize_id<V: AsRef<[u8]>>(id: V) -> u64 {
    use std::convert::TryInto;
    u64::from_le_bytes(id.as_ref().try_into().unwrap())
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage error: {0}")]
    Db(#[from] sled::Error),
    #[error("encoding error: {0}")]
    Codec(#[from] bincode::Error),
    /// Write-time invariant violation, checked independently of form
    /// validation.
    #[error("constraint violated: {0}")]
    Constraint(&'static str),
}

const USERS: &[u8] = b"users";
const USERS_USERNAME: &[u8] = b"users_username";
const USERS_EMAIL: &[u8] = b"users_email";
const MOVIES: &[u8] = b"movies";

pub trait UserStore {
    /// Returns `None` when the username or email is already taken.
    fn add_user(&self, user: &User) -> Result<Option<u64>, StoreError>;
    fn get_user(&self, id: u64) -> Result<Option<User>, StoreError>;
    fn get_user_by_username(&self, username: &str) -> Result<Option<(u64, User)>, StoreError>;
    fn get_user_by_username_or_email(
        &self,
        username: &str,
        email: &str,
    ) -> Result<Option<(u64, User)>, StoreError>;
}

impl UserStore for sled::Db {
    fn add_user(&self, user: &User) -> Result<Option<u64>, StoreError> {
        let users = self.open_tree(USERS)?;
        let by_username = self.open_tree(USERS_USERNAME)?;
        let by_email = self.open_tree(USERS_EMAIL)?;
        let id = self.generate_id()?;
        let encoded = bincode::serialize(user)?;
        // Both index inserts happen in one transaction so a duplicate
        // username or email aborts the whole registration.
        if let Err(err) =
            (&users, &by_username, &by_email).transaction(|(users, by_username, by_email)| {
                users.insert(&serialize_id(id), encoded.as_slice())?;
                if by_username
                    .insert(user.username.as_bytes(), &serialize_id(id))?
                    .is_some()
                {
                    sled::transaction::abort(())?;
                }
                if by_email
                    .insert(user.email.as_bytes(), &serialize_id(id))?
                    .is_some()
                {
                    sled::transaction::abort(())?;
                }
                Ok(())
            })
        {
            match err {
                TransactionError::Storage(e) => return Err(e.into()),
                TransactionError::Abort(_) => return Ok(None),
            }
        }
        Ok(Some(id))
    }

    fn get_user(&self, id: u64) -> Result<Option<User>, StoreError> {
        let users = self.open_tree(USERS)?;
        match users.get(serialize_id(id))? {
            Some(raw) => Ok(Some(bincode::deserialize(&raw)?)),
            None => Ok(None),
        }
    }

    fn get_user_by_username(&self, username: &str) -> Result<Option<(u64, User)>, StoreError> {
        let by_username = self.open_tree(USERS_USERNAME)?;
        let users = self.open_tree(USERS)?;
        if let Some(id) = by_username.get(username)? {
            let raw = users.get(&id)?.ok_or(sled::Error::ReportableBug(
                "users_username points at a missing user".to_owned(),
            ))?;
            Ok(Some((deserialize_id(id), bincode::deserialize(&raw)?)))
        } else {
            Ok(None)
        }
    }

    fn get_user_by_username_or_email(
        &self,
        username: &str,
        email: &str,
    ) -> Result<Option<(u64, User)>, StoreError> {
        if let Some(found) = self.get_user_by_username(username)? {
            return Ok(Some(found));
        }
        let by_email = self.open_tree(USERS_EMAIL)?;
        match by_email.get(email)? {
            Some(id) => {
                let id = deserialize_id(id);
                Ok(self.get_user(id)?.map(|user| (id, user)))
            }
            None => Ok(None),
        }
    }
}

/// A movie row for the list view, with the owner's username denormalized in.
#[derive(Serialize, Debug)]
pub struct MovieListing {
    pub id: u64,
    pub movie: Movie,
    pub owner: Option<String>,
}

pub trait MovieStore {
    fn add_movie(&self, movie: &Movie) -> Result<u64, StoreError>;
    fn get_movie(&self, id: u64) -> Result<Option<Movie>, StoreError>;
    /// Partial update; `Ok(None)` when the movie no longer exists.
    fn update_movie(&self, id: u64, fields: MovieFields) -> Result<Option<Movie>, StoreError>;
    /// Idempotent: removing an absent id succeeds.
    fn delete_movie(&self, id: u64) -> Result<(), StoreError>;
    /// Newest first.
    fn list_movies(&self) -> Result<Vec<MovieListing>, StoreError>;
}

impl MovieStore for sled::Db {
    fn add_movie(&self, movie: &Movie) -> Result<u64, StoreError> {
        movie.check_constraints().map_err(StoreError::Constraint)?;
        let movies = self.open_tree(MOVIES)?;
        let id = self.generate_id()?;
        movies.insert(&serialize_id(id), bincode::serialize(movie)?)?;
        Ok(id)
    }

    fn get_movie(&self, id: u64) -> Result<Option<Movie>, StoreError> {
        let movies = self.open_tree(MOVIES)?;
        match movies.get(serialize_id(id))? {
            Some(raw) => Ok(Some(bincode::deserialize(&raw)?)),
            None => Ok(None),
        }
    }

    fn update_movie(&self, id: u64, fields: MovieFields) -> Result<Option<Movie>, StoreError> {
        let movies = self.open_tree(MOVIES)?;
        let raw = match movies.get(serialize_id(id))? {
            Some(raw) => raw,
            None => return Ok(None),
        };
        let mut movie: Movie = bincode::deserialize(&raw)?;
        fields.apply_to(&mut movie, Utc::now());
        movie.check_constraints().map_err(StoreError::Constraint)?;
        movies.insert(&serialize_id(id), bincode::serialize(&movie)?)?;
        Ok(Some(movie))
    }

    fn delete_movie(&self, id: u64) -> Result<(), StoreError> {
        let movies = self.open_tree(MOVIES)?;
        movies.remove(&serialize_id(id))?;
        Ok(())
    }

    fn list_movies(&self) -> Result<Vec<MovieListing>, StoreError> {
        let movies = self.open_tree(MOVIES)?;
        let mut listings = Vec::new();
        for entry in movies.iter() {
            let (key, raw) = entry?;
            let movie: Movie = bincode::deserialize(&raw)?;
            let owner = match movie.created_by {
                Some(owner_id) => self.get_user(owner_id)?.map(|user| user.username),
                None => None,
            };
            listings.push(MovieListing {
                id: deserialize_id(key),
                movie,
                owner,
            });
        }
        listings.sort_by(|a, b| {
            (b.movie.created_at, b.id).cmp(&(a.movie.created_at, a.id))
        });
        Ok(listings)
    }
}
