use actix_web::{delete, get, post, put, web, HttpRequest, HttpResponse};
use regex::Regex;

use crate::{
    error::Error,
    models::shared_access::{
        SharedAccessAcceptRequest, SharedAccessBulkRequest, SharedAccessGrant,
        SharedAccessQueryParams, SharedAccessRequest,
    },
    policy,
    routes::{authenticated, parse_id},
};

fn validate_email(email: &str) -> Result<(), Error> {
    let email_regex: Regex = Regex::new(
        r"^([a-z0-9_+]([a-z0-9_+.]*[a-z0-9_+])?)@([a-z0-9]+([\-\.]{1}[a-z0-9]+)*\.[a-z]{2,6})",
    )
    .unwrap();
    if email_regex.is_match(email) {
        Ok(())
    } else {
        Err(Error::validation(
            "INVALID_EMAIL",
            "malformed recipient email address",
        ))
    }
}

#[post("/shared-access")]
pub async fn create_shared_access(
    payload: web::Json<SharedAccessRequest>,
    req: HttpRequest,
) -> Result<HttpResponse, Error> {
    let auth = authenticated(&req)?;
    let payload: SharedAccessRequest = payload.into_inner();

    if !policy::can_manage_shared_access(&auth.roles) {
        return Err(Error::forbidden("FORBIDDEN", "QI role required"));
    }
    validate_email(&payload.email)?;

    let grant = SharedAccessGrant::issue(payload, auth._id).await?;
    Ok(HttpResponse::Created().json(grant))
}

#[put("/shared-access")]
pub async fn create_shared_access_bulk(
    payload: web::Json<SharedAccessBulkRequest>,
    req: HttpRequest,
) -> Result<HttpResponse, Error> {
    let auth = authenticated(&req)?;
    let payload: SharedAccessBulkRequest = payload.into_inner();

    if !policy::can_manage_shared_access(&auth.roles) {
        return Err(Error::forbidden("FORBIDDEN", "QI role required"));
    }
    if payload.grants.is_empty() {
        return Err(Error::validation(
            "GRANTS_REQUIRED",
            "at least one invitation is required",
        ));
    }
    for request in &payload.grants {
        validate_email(&request.email)?;
    }

    let grants = SharedAccessGrant::issue_bulk(payload.grants, auth._id).await?;
    Ok(HttpResponse::Created().json(grants))
}

#[get("/shared-access")]
pub async fn get_shared_access(
    query: web::Query<SharedAccessQueryParams>,
    req: HttpRequest,
) -> Result<HttpResponse, Error> {
    let auth = authenticated(&req)?;

    if !policy::can_manage_shared_access(&auth.roles) {
        return Err(Error::forbidden("FORBIDDEN", "QI role required"));
    }

    let grants = SharedAccessGrant::find_many(&query.into_inner()).await?;
    Ok(HttpResponse::Ok().json(grants))
}

#[delete("/shared-access/{grant_id}")]
pub async fn revoke_shared_access(
    grant_id: web::Path<String>,
    req: HttpRequest,
) -> Result<HttpResponse, Error> {
    let auth = authenticated(&req)?;
    let grant_id = parse_id(&grant_id)?;

    if !policy::can_manage_shared_access(&auth.roles) {
        return Err(Error::forbidden("FORBIDDEN", "QI role required"));
    }

    let grant = SharedAccessGrant::revoke(&grant_id, auth._id).await?;
    Ok(HttpResponse::Ok().json(grant))
}

#[post("/shared-access/accept")]
pub async fn accept_shared_access(
    payload: web::Json<SharedAccessAcceptRequest>,
) -> Result<HttpResponse, Error> {
    let payload: SharedAccessAcceptRequest = payload.into_inner();

    let grant = SharedAccessGrant::accept(&payload.token).await?;
    Ok(HttpResponse::Ok().json(grant))
}
