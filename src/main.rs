mod auth;
mod config;
mod database;
mod flash;
mod model;
mod movies;
mod views;

use actix_identity::{CookieIdentityPolicy, Identity, IdentityService};
use actix_web::http::StatusCode;
use actix_web::{middleware::Logger, web, App, HttpRequest, HttpResponse, HttpServer};
use views::{log_error, render, render_with_status, Db, Tera};

async fn index(
    req: HttpRequest,
    id: Identity,
    tera: Tera,
    db: Db,
) -> actix_web::Result<HttpResponse> {
    let mut ctx = tera::Context::new();
    if let Some((_, user)) =
        auth::current_user(&id, db.get_ref()).map_err(|err| log_error(err, "Database error"))?
    {
        ctx.insert("user", &user);
    }
    render(&tera, &req, "index.html", &mut ctx)
}

async fn not_found(req: HttpRequest, tera: Tera) -> actix_web::Result<HttpResponse> {
    let mut ctx = tera::Context::new();
    render_with_status(&tera, &req, "404.html", &mut ctx, StatusCode::NOT_FOUND)
}

fn routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(index))
        .route("/register", web::get().to(auth::register_form))
        .route("/register", web::post().to(auth::register))
        .route("/login", web::get().to(auth::login_form))
        .route("/login", web::post().to(auth::login))
        .route("/logout", web::get().to(auth::logout))
        .route("/movies", web::get().to(movies::list))
        .route("/movies", web::post().to(movies::create))
        .route("/movies/new", web::get().to(movies::new_form))
        .route("/movies/{id}", web::get().to(movies::show))
        .route("/movies/{id}/edit", web::get().to(movies::edit_form))
        .route("/movies/{id}", web::put().to(movies::update))
        .route("/movies/{id}", web::delete().to(movies::delete))
        .route("/movies/{id}", web::post().to(movies::post_override));
}

#[actix_rt::main]
async fn main() -> std::io::Result<()> {
    dotenvy::dotenv().ok();
    env_logger::from_env(
        env_logger::Env::default().default_filter_or("cinelog=debug,actix_web=info"),
    )
    .init();

    let config = config::Config::from_env()
        .map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidInput, err))?;
    let db = sled::open(&config.database_path)
        .map_err(|err| std::io::Error::new(std::io::ErrorKind::Other, err))?;

    let bind_addr = format!("0.0.0.0:{}", config.port);
    log::info!("listening on {}", bind_addr);

    HttpServer::new(move || {
        let tera = tera::Tera::new(concat!(env!("CARGO_MANIFEST_DIR"), "/templates/**/*")).unwrap();
        App::new()
            .wrap(Logger::default())
            .wrap(IdentityService::new(
                CookieIdentityPolicy::new(config.session_secret.as_bytes())
                    .name("auth-cookie")
                    .max_age(86_400)
                    .secure(config.production),
            ))
            .data(tera)
            .data(db.clone())
            .configure(routes)
            .default_service(web::route().to(not_found))
    })
    .bind(&bind_addr)?
    .run()
    .await
}
