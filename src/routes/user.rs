use actix_web::{get, post, web, HttpRequest, HttpResponse};
use mongodb::bson::{doc, to_bson};
use regex::Regex;

use crate::{
    error::Error,
    models::user::{
        Role, User, UserCredential, UserQuery, UserRefreshRequest, UserRequest, UserResponse,
    },
    routes::{authenticated, parse_id},
};

#[get("/users")]
pub async fn get_users(req: HttpRequest) -> Result<HttpResponse, Error> {
    authenticated(&req)?;

    let users = User::find_many(&UserQuery { limit: None }).await?;
    Ok(HttpResponse::Ok().json(users))
}

#[get("/users/{user_id}")]
pub async fn get_user(user_id: web::Path<String>, req: HttpRequest) -> Result<HttpResponse, Error> {
    authenticated(&req)?;

    let user_id = parse_id(&user_id)?;
    match User::find_by_id(&user_id).await? {
        Some(user) => Ok(HttpResponse::Ok().json(user.response())),
        None => Err(Error::not_found("USER_NOT_FOUND")),
    }
}

#[post("/users")]
pub async fn create_user(
    payload: web::Json<UserRequest>,
    req: HttpRequest,
) -> Result<HttpResponse, Error> {
    let payload: UserRequest = payload.into_inner();
    let email_regex: Regex = Regex::new(
        r"^([a-z0-9_+]([a-z0-9_+.]*[a-z0-9_+])?)@([a-z0-9]+([\-\.]{1}[a-z0-9]+)*\.[a-z]{2,6})",
    )
    .unwrap();

    if payload.password.len() < 8 {
        return Err(Error::validation(
            "USER_MUST_HAVE_VALID_PASSWORD",
            "password must be at least 8 characters",
        ));
    }
    if !email_regex.is_match(&payload.email) {
        return Err(Error::validation(
            "USER_MUST_HAVE_VALID_EMAIL",
            "malformed email address",
        ));
    }

    let mut user: User = User {
        _id: None,
        name: payload.name,
        email: payload.email,
        password: payload.password,
        roles: Vec::new(),
    };

    // the very first account becomes the admin; after that only admins add
    // accounts
    if User::count().await? == 0 {
        user.roles = vec![Role::Admin];
    } else {
        let issuer = authenticated(&req)?;
        if !issuer.roles.contains(&Role::Admin) {
            return Err(Error::forbidden("FORBIDDEN", "admin role required"));
        }
        match payload.roles {
            Some(roles) if !roles.is_empty() => user.roles = roles,
            _ => {
                return Err(Error::validation(
                    "USER_MUST_HAVE_ROLES",
                    "at least one role is required",
                ))
            }
        }
    }

    if User::find_by_email(&user.email).await?.is_some() {
        return Err(Error::conflict("USER_ALREADY_EXIST", "email already in use"));
    }

    let _id = user.save().await?;
    Ok(HttpResponse::Created().body(_id.to_string()))
}

#[post("/users/login")]
pub async fn login(payload: web::Json<UserCredential>) -> Result<HttpResponse, Error> {
    let payload: UserCredential = payload.into_inner();

    let (atk, rtk, user) = payload.authenticate().await?;
    Ok(HttpResponse::Ok().json(doc! {
        "atk": to_bson::<String>(&atk).unwrap(),
        "rtk": to_bson::<String>(&rtk).unwrap(),
        "user": to_bson::<UserResponse>(&user).unwrap(),
    }))
}

#[post("/users/refresh")]
pub async fn refresh(payload: web::Json<UserRefreshRequest>) -> Result<HttpResponse, Error> {
    let payload: UserRefreshRequest = payload.into_inner();

    let (atk, rtk, user) = UserCredential::refresh(&payload.rtk).await?;
    Ok(HttpResponse::Ok().json(doc! {
        "atk": to_bson::<String>(&atk).unwrap(),
        "rtk": to_bson::<String>(&rtk).unwrap(),
        "user": to_bson::<UserResponse>(&user).unwrap(),
    }))
}
