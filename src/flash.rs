//! One-shot notifications carried across a redirect in their own cookie,
//! read and cleared by the next rendered page.

use actix_web::http::Cookie;
use actix_web::{HttpMessage, HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};

const FLASH_COOKIE: &str = "flash";

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum FlashKind {
    Success,
    Error,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Flash {
    pub kind: FlashKind,
    pub message: String,
}

impl Flash {
    pub fn success(message: &str) -> Flash {
        Flash {
            kind: FlashKind::Success,
            message: message.to_owned(),
        }
    }

    pub fn error(message: &str) -> Flash {
        Flash {
            kind: FlashKind::Error,
            message: message.to_owned(),
        }
    }
}

fn encode(flash: &Flash) -> String {
    base64::encode(serde_json::to_vec(flash).unwrap_or_default())
}

pub fn cookie(flash: &Flash) -> Cookie<'static> {
    Cookie::build(FLASH_COOKIE, encode(flash))
        .path("/")
        .http_only(true)
        .finish()
}

/// Overwrites the flash cookie with an empty value, which `pop` treats as
/// no message.
pub fn clear_cookie() -> Cookie<'static> {
    Cookie::build(FLASH_COOKIE, "")
        .path("/")
        .http_only(true)
        .finish()
}

pub fn pop(req: &HttpRequest) -> Option<Flash> {
    let raw = req.cookie(FLASH_COOKIE)?;
    if raw.value().is_empty() {
        return None;
    }
    let bytes = base64::decode(raw.value()).ok()?;
    serde_json::from_slice(&bytes).ok()
}

pub fn redirect(location: &str, flash: Flash) -> HttpResponse {
    HttpResponse::Found()
        .header("location", location)
        .cookie(cookie(&flash))
        .finish()
}

pub fn redirect_plain(location: &str) -> HttpResponse {
    HttpResponse::Found().header("location", location).finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    #[test]
    fn survives_a_cookie_round_trip() {
        let flash = Flash::success("Movie added");
        let req = TestRequest::default().cookie(cookie(&flash)).to_http_request();
        assert_eq!(pop(&req), Some(flash));
    }

    #[test]
    fn cleared_and_garbage_cookies_yield_nothing() {
        let req = TestRequest::default().cookie(clear_cookie()).to_http_request();
        assert_eq!(pop(&req), None);

        let req = TestRequest::default()
            .cookie(Cookie::new(FLASH_COOKIE, "not-base64!"))
            .to_http_request();
        assert_eq!(pop(&req), None);

        let req = TestRequest::default().to_http_request();
        assert_eq!(pop(&req), None);
    }
}
