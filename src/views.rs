use crate::flash;
use actix_web::http::StatusCode;
use actix_web::{error, web, HttpRequest, HttpResponse};
use log::debug;

pub type Tera = web::Data<tera::Tera>;
pub type Db = web::Data<sled::Db>;

/// Logs the underlying fault server-side and hands the client a generic 500.
pub fn log_error<E: std::fmt::Debug>(err: E, message: &'static str) -> error::Error {
    debug!("{:?}", err);
    error::ErrorInternalServerError(message)
}

pub fn render(
    tera: &tera::Tera,
    req: &HttpRequest,
    template: &str,
    ctx: &mut tera::Context,
) -> actix_web::Result<HttpResponse> {
    render_with_status(tera, req, template, ctx, StatusCode::OK)
}

/// Renders a template, feeding any pending flash message into the context
/// and clearing it so it shows exactly once.
pub fn render_with_status(
    tera: &tera::Tera,
    req: &HttpRequest,
    template: &str,
    ctx: &mut tera::Context,
    status: StatusCode,
) -> actix_web::Result<HttpResponse> {
    let pending = flash::pop(req);
    if let Some(flash) = &pending {
        ctx.insert("flash", flash);
    }
    let body = tera
        .render(template, ctx)
        .map_err(|err| log_error(err, "Template error"))?;
    let mut builder = HttpResponse::build(status);
    builder.content_type("text/html");
    if pending.is_some() {
        builder.cookie(flash::clear_cookie());
    }
    Ok(builder.body(body))
}
