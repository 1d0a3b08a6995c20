use crate::database::{MovieStore, StoreError, UserStore};
use crate::flash::{self, Flash};
use crate::model::{Movie, RegisterForm, User};
use crate::views::{log_error, render, render_with_status, Db, Tera};
use actix_identity::Identity;
use actix_web::http::StatusCode;
use actix_web::{web, HttpRequest, HttpResponse};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthFailure {
    #[error("no such user")]
    NoSuchUser,
    #[error("wrong password")]
    BadCredentials,
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("password verification failed: {0}")]
    Hash(#[from] bcrypt::BcryptError),
}

pub fn hash_password(raw: &str) -> Result<String, bcrypt::BcryptError> {
    bcrypt::hash(raw, bcrypt::DEFAULT_COST)
}

/// Verifies submitted credentials. The two credential failures are kept
/// apart internally; callers must present them identically to the client.
pub fn authenticate(db: &sled::Db, username: &str, password: &str) -> Result<(u64, User), AuthFailure> {
    let (id, user) = db
        .get_user_by_username(username)?
        .ok_or(AuthFailure::NoSuchUser)?;
    if bcrypt::verify(password, &user.password_hash)? {
        Ok((id, user))
    } else {
        Err(AuthFailure::BadCredentials)
    }
}

/// Restores the per-request identity. A stale or unparsable identity cookie
/// counts as logged out rather than an error.
pub fn current_user(id: &Identity, db: &sled::Db) -> Result<Option<(u64, User)>, StoreError> {
    let raw = match id.identity() {
        Some(raw) => raw,
        None => return Ok(None),
    };
    let user_id = match raw.parse::<u64>() {
        Ok(user_id) => user_id,
        Err(_) => return Ok(None),
    };
    Ok(db.get_user(user_id)?.map(|user| (user_id, user)))
}

/// Typed outcome of the ownership check, consumed directly by handlers.
pub enum Ownership {
    Owned(Movie),
    NotFound,
    NotOwner,
}

pub fn ensure_owner(
    db: &sled::Db,
    viewer: Option<u64>,
    movie_id: u64,
) -> Result<Ownership, StoreError> {
    let movie = match db.get_movie(movie_id)? {
        Some(movie) => movie,
        None => return Ok(Ownership::NotFound),
    };
    match (viewer, movie.created_by) {
        (Some(viewer), Some(owner)) if viewer == owner => Ok(Ownership::Owned(movie)),
        _ => Ok(Ownership::NotOwner),
    }
}

pub async fn register_form(req: HttpRequest, tera: Tera) -> actix_web::Result<HttpResponse> {
    let mut ctx = tera::Context::new();
    ctx.insert("old", &RegisterForm::default());
    render(&tera, &req, "register.html", &mut ctx)
}

pub async fn register(
    req: HttpRequest,
    form: web::Form<RegisterForm>,
    tera: Tera,
    db: Db,
) -> actix_web::Result<HttpResponse> {
    let form = form.into_inner();
    if let Err(errors) = form.validate() {
        let mut ctx = tera::Context::new();
        ctx.insert("errors", &errors);
        ctx.insert("old", &form);
        return render_with_status(&tera, &req, "register.html", &mut ctx, StatusCode::BAD_REQUEST);
    }
    let username = form.username.trim().to_owned();
    let email = form.email.trim().to_owned();
    if db
        .get_user_by_username_or_email(&username, &email)
        .map_err(|err| log_error(err, "Database error"))?
        .is_some()
    {
        return Ok(flash::redirect(
            "/register",
            Flash::error("Username or email already in use"),
        ));
    }
    let user = User {
        username,
        email,
        password_hash: hash_password(&form.password)
            .map_err(|err| log_error(err, "Hashing error"))?,
        created_at: Utc::now(),
    };
    // A racing registration can still lose at the index; same conflict answer.
    match db.add_user(&user).map_err(|err| log_error(err, "Database error"))? {
        Some(_) => Ok(flash::redirect(
            "/login",
            Flash::success("Registered! Please log in."),
        )),
        None => Ok(flash::redirect(
            "/register",
            Flash::error("Username or email already in use"),
        )),
    }
}

pub async fn login_form(req: HttpRequest, tera: Tera) -> actix_web::Result<HttpResponse> {
    let mut ctx = tera::Context::new();
    render(&tera, &req, "login.html", &mut ctx)
}

#[derive(Serialize, Deserialize)]
pub struct LoginParams {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

pub async fn login(
    id: Identity,
    form: web::Form<LoginParams>,
    db: Db,
) -> actix_web::Result<HttpResponse> {
    match authenticate(db.get_ref(), &form.username, &form.password) {
        Ok((user_id, _)) => {
            id.remember(user_id.to_string());
            Ok(flash::redirect_plain("/"))
        }
        // Never reveal which half of the credentials was wrong.
        Err(AuthFailure::NoSuchUser) | Err(AuthFailure::BadCredentials) => Ok(flash::redirect(
            "/login",
            Flash::error("Invalid username or password"),
        )),
        Err(err) => Err(log_error(err, "Authentication error")),
    }
}

pub async fn logout(id: Identity) -> actix_web::Result<HttpResponse> {
    // Forgetting an absent identity is a no-op, so logout is idempotent.
    id.forget();
    Ok(flash::redirect("/login", Flash::success("Logged out")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MovieForm;

    fn test_db() -> sled::Db {
        sled::Config::new().temporary(true).open().unwrap()
    }

    fn register_user(db: &sled::Db, username: &str, password: &str) -> u64 {
        db.add_user(&User {
            username: username.to_owned(),
            email: format!("{}@example.com", username),
            password_hash: hash_password(password).unwrap(),
            created_at: Utc::now(),
        })
        .unwrap()
        .unwrap()
    }

    fn some_movie(owner: Option<u64>) -> Movie {
        MovieForm {
            name: "Heat".to_owned(),
            description: "Cops and robbers".to_owned(),
            year: "1995".to_owned(),
            genres: "Crime".to_owned(),
            rating: String::new(),
        }
        .validate()
        .unwrap()
        .into_movie(owner, Utc::now())
    }

    #[test]
    fn authenticate_distinguishes_failures_internally() {
        let db = test_db();
        register_user(&db, "alice", "hunter22");

        assert!(authenticate(&db, "alice", "hunter22").is_ok());
        assert!(matches!(
            authenticate(&db, "alice", "wrong"),
            Err(AuthFailure::BadCredentials)
        ));
        assert!(matches!(
            authenticate(&db, "nobody", "hunter22"),
            Err(AuthFailure::NoSuchUser)
        ));
    }

    #[test]
    fn ownership_outcomes() {
        let db = test_db();
        let alice = register_user(&db, "alice", "hunter22");
        let bob = register_user(&db, "bob", "hunter23");
        let movie_id = db.add_movie(&some_movie(Some(alice))).unwrap();
        let orphan_id = db.add_movie(&some_movie(None)).unwrap();

        assert!(matches!(
            ensure_owner(&db, Some(alice), movie_id).unwrap(),
            Ownership::Owned(_)
        ));
        assert!(matches!(
            ensure_owner(&db, Some(bob), movie_id).unwrap(),
            Ownership::NotOwner
        ));
        assert!(matches!(
            ensure_owner(&db, None, movie_id).unwrap(),
            Ownership::NotOwner
        ));
        assert!(matches!(
            ensure_owner(&db, Some(alice), 9999).unwrap(),
            Ownership::NotFound
        ));
        // An orphaned movie has no owner at all.
        assert!(matches!(
            ensure_owner(&db, Some(alice), orphan_id).unwrap(),
            Ownership::NotOwner
        ));
    }
}
