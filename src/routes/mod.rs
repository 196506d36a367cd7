use actix_web::{HttpMessage, HttpRequest};
use mongodb::bson::oid::ObjectId;
use std::str::FromStr;

use crate::{error::Error, models::user::UserAuthentication};

pub mod corrective_action;
pub mod incident;
pub mod investigation;
pub mod shared_access;
pub mod user;

/// The middleware only attaches an identity when the bearer token checks
/// out, so absence here means unauthenticated.
pub fn authenticated(req: &HttpRequest) -> Result<UserAuthentication, Error> {
    req.extensions()
        .get::<UserAuthentication>()
        .cloned()
        .ok_or_else(Error::unauthenticated)
}

pub fn maybe_authenticated(req: &HttpRequest) -> Option<UserAuthentication> {
    req.extensions().get::<UserAuthentication>().cloned()
}

pub fn parse_id(raw: &str) -> Result<ObjectId, Error> {
    ObjectId::from_str(raw).map_err(|_| Error::validation("INVALID_ID", "malformed object id"))
}
