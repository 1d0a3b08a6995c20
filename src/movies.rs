use crate::auth::{current_user, ensure_owner, Ownership};
use crate::database::{MovieStore, StoreError, UserStore};
use crate::flash::{self, Flash};
use crate::model::MovieForm;
use crate::views::{log_error, render, render_with_status, Db, Tera};
use actix_identity::Identity;
use actix_web::http::{header, StatusCode};
use actix_web::{web, HttpRequest, HttpResponse};
use chrono::Utc;
use serde::Deserialize;

const LOGIN_REQUIRED: &str = "Please log in first";
/// One message for both "no such movie" and "not yours", so non-owners
/// cannot probe which records exist.
const NOT_AVAILABLE: &str = "Movie not found";

fn db_error(err: StoreError) -> actix_web::Error {
    log_error(err, "Database error")
}

fn login_redirect() -> HttpResponse {
    flash::redirect("/login", Flash::error(LOGIN_REQUIRED))
}

fn not_available_redirect() -> HttpResponse {
    flash::redirect("/movies", Flash::error(NOT_AVAILABLE))
}

pub async fn list(
    req: HttpRequest,
    id: Identity,
    tera: Tera,
    db: Db,
) -> actix_web::Result<HttpResponse> {
    let movies = db.list_movies().map_err(db_error)?;
    let mut ctx = tera::Context::new();
    ctx.insert("movies", &movies);
    if let Some((_, user)) = current_user(&id, db.get_ref()).map_err(db_error)? {
        ctx.insert("user", &user);
    }
    render(&tera, &req, "movie_list.html", &mut ctx)
}

pub async fn show(
    req: HttpRequest,
    id: Identity,
    path: web::Path<u64>,
    tera: Tera,
    db: Db,
) -> actix_web::Result<HttpResponse> {
    let movie_id = path.into_inner();
    let movie = match db.get_movie(movie_id).map_err(db_error)? {
        Some(movie) => movie,
        None => return Ok(not_available_redirect()),
    };
    let viewer = current_user(&id, db.get_ref()).map_err(db_error)?;
    let is_owner = match (&viewer, movie.created_by) {
        (Some((viewer_id, _)), Some(owner)) => *viewer_id == owner,
        _ => false,
    };
    let owner = match movie.created_by {
        Some(owner_id) => db
            .get_user(owner_id)
            .map_err(db_error)?
            .map(|user| user.username),
        None => None,
    };

    let mut ctx = tera::Context::new();
    ctx.insert("movie", &movie);
    ctx.insert("movie_id", &movie_id);
    ctx.insert("is_owner", &is_owner);
    ctx.insert("owner", &owner.unwrap_or_default());
    ctx.insert(
        "rating_display",
        &movie.rating.map(|r| r.to_string()).unwrap_or_default(),
    );
    if let Some((_, user)) = viewer {
        ctx.insert("user", &user);
    }
    render(&tera, &req, "movie_show.html", &mut ctx)
}

fn form_context(user: &crate::model::User, mode: &str, form: &MovieForm) -> tera::Context {
    let mut ctx = tera::Context::new();
    ctx.insert("user", user);
    ctx.insert("mode", mode);
    ctx.insert("movie", form);
    ctx
}

pub async fn new_form(
    req: HttpRequest,
    id: Identity,
    tera: Tera,
    db: Db,
) -> actix_web::Result<HttpResponse> {
    let (_, user) = match current_user(&id, db.get_ref()).map_err(db_error)? {
        Some(viewer) => viewer,
        None => return Ok(login_redirect()),
    };
    let mut ctx = form_context(&user, "create", &MovieForm::default());
    render(&tera, &req, "movie_form.html", &mut ctx)
}

pub async fn create(
    req: HttpRequest,
    id: Identity,
    form: web::Form<MovieForm>,
    tera: Tera,
    db: Db,
) -> actix_web::Result<HttpResponse> {
    let (user_id, user) = match current_user(&id, db.get_ref()).map_err(db_error)? {
        Some(viewer) => viewer,
        None => return Ok(login_redirect()),
    };
    let form = form.into_inner();
    match form.validate() {
        Err(errors) => {
            let mut ctx = form_context(&user, "create", &form);
            ctx.insert("errors", &errors);
            render_with_status(&tera, &req, "movie_form.html", &mut ctx, StatusCode::BAD_REQUEST)
        }
        Ok(fields) => {
            let movie = fields.into_movie(Some(user_id), Utc::now());
            db.add_movie(&movie).map_err(db_error)?;
            Ok(flash::redirect("/movies", Flash::success("Movie added")))
        }
    }
}

pub async fn edit_form(
    req: HttpRequest,
    id: Identity,
    path: web::Path<u64>,
    tera: Tera,
    db: Db,
) -> actix_web::Result<HttpResponse> {
    let movie_id = path.into_inner();
    let (user_id, user) = match current_user(&id, db.get_ref()).map_err(db_error)? {
        Some(viewer) => viewer,
        None => return Ok(login_redirect()),
    };
    let movie = match ensure_owner(db.get_ref(), Some(user_id), movie_id).map_err(db_error)? {
        Ownership::Owned(movie) => movie,
        Ownership::NotFound | Ownership::NotOwner => return Ok(not_available_redirect()),
    };
    let mut ctx = form_context(&user, "edit", &MovieForm::from_movie(&movie));
    ctx.insert("movie_id", &movie_id);
    render(&tera, &req, "movie_form.html", &mut ctx)
}

pub async fn update(
    req: HttpRequest,
    id: Identity,
    path: web::Path<u64>,
    form: web::Form<MovieForm>,
    tera: Tera,
    db: Db,
) -> actix_web::Result<HttpResponse> {
    do_update(&req, &id, path.into_inner(), form.into_inner(), &tera, &db).await
}

async fn do_update(
    req: &HttpRequest,
    id: &Identity,
    movie_id: u64,
    form: MovieForm,
    tera: &tera::Tera,
    db: &sled::Db,
) -> actix_web::Result<HttpResponse> {
    let (user_id, user) = match current_user(id, db).map_err(db_error)? {
        Some(viewer) => viewer,
        None => return Ok(login_redirect()),
    };
    match ensure_owner(db, Some(user_id), movie_id).map_err(db_error)? {
        Ownership::Owned(_) => {}
        Ownership::NotFound | Ownership::NotOwner => return Ok(not_available_redirect()),
    }
    match form.validate() {
        Err(errors) => {
            let mut ctx = form_context(&user, "edit", &form);
            ctx.insert("movie_id", &movie_id);
            ctx.insert("errors", &errors);
            render_with_status(tera, req, "movie_form.html", &mut ctx, StatusCode::BAD_REQUEST)
        }
        Ok(fields) => match db.update_movie(movie_id, fields) {
            Ok(Some(_)) => Ok(flash::redirect(
                &format!("/movies/{}", movie_id),
                Flash::success("Movie updated"),
            )),
            // Deleted between the ownership check and the write.
            Ok(None) => Ok(not_available_redirect()),
            Err(err) => Err(db_error(err)),
        },
    }
}

pub async fn delete(
    req: HttpRequest,
    id: Identity,
    path: web::Path<u64>,
    db: Db,
) -> actix_web::Result<HttpResponse> {
    do_delete(&req, &id, path.into_inner(), &db).await
}

async fn do_delete(
    req: &HttpRequest,
    id: &Identity,
    movie_id: u64,
    db: &sled::Db,
) -> actix_web::Result<HttpResponse> {
    let (user_id, _) = match current_user(id, db).map_err(db_error)? {
        Some(viewer) => viewer,
        None => return Ok(login_redirect()),
    };
    match ensure_owner(db, Some(user_id), movie_id).map_err(db_error)? {
        Ownership::Owned(_) => {}
        Ownership::NotFound | Ownership::NotOwner => return Ok(not_available_redirect()),
    }
    db.delete_movie(movie_id).map_err(db_error)?;
    if wants_json(req) {
        return Ok(HttpResponse::Ok().json(serde_json::json!({ "ok": true })));
    }
    Ok(flash::redirect("/movies", Flash::success("Movie deleted")))
}

fn wants_json(req: &HttpRequest) -> bool {
    req.headers()
        .get(header::ACCEPT)
        .and_then(|value| value.to_str().ok())
        .map(|accept| accept.contains("application/json"))
        .unwrap_or(false)
}

#[derive(Deserialize)]
pub struct MethodOverride {
    #[serde(rename = "_method", default)]
    method: Option<String>,
}

/// HTML forms can only POST; `?_method=PUT` and `?_method=DELETE` route the
/// submission to the real handler.
pub async fn post_override(
    req: HttpRequest,
    id: Identity,
    path: web::Path<u64>,
    query: web::Query<MethodOverride>,
    form: web::Form<MovieForm>,
    tera: Tera,
    db: Db,
) -> actix_web::Result<HttpResponse> {
    let movie_id = path.into_inner();
    let method = query.into_inner().method.unwrap_or_default();
    match method.to_ascii_uppercase().as_str() {
        "PUT" => do_update(&req, &id, movie_id, form.into_inner(), &tera, &db).await,
        "DELETE" => do_delete(&req, &id, movie_id, &db).await,
        _ => {
            let mut ctx = tera::Context::new();
            render_with_status(&tera, &req, "404.html", &mut ctx, StatusCode::NOT_FOUND)
        }
    }
}
