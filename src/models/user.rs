use crate::{database::get_db, error::Error};
use actix_service::{self, Transform};
use actix_web::{
    dev::{Service, ServiceRequest, ServiceResponse},
    HttpMessage,
};
use chrono::Utc;
use futures::{
    future::{ready, LocalBoxFuture, Ready},
    stream::StreamExt,
    FutureExt,
};
use jsonwebtoken::{self, decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use mongodb::{
    bson::{doc, from_document, oid::ObjectId, to_bson},
    Collection, Database,
};
use pwhash::bcrypt;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fs::read_to_string, rc::Rc, str::FromStr};

static mut KEYS: BTreeMap<String, String> = BTreeMap::new();

/// Canonical role set. Every handler authorizes against this one shape;
/// there is no singular `role` field anywhere.
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Reporter,
    Supervisor,
    Hod,
    Qi,
    Admin,
    Investigator,
    ActionHandler,
}

#[derive(Debug, Serialize, Deserialize)]
struct UserClaims {
    aud: String,
    exp: i64,
    iss: String,
    sub: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct User {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,
    pub name: String,
    pub email: String,
    pub password: String,
    pub roles: Vec<Role>,
}
#[derive(Debug, Deserialize, Serialize)]
pub struct UserCredential {
    pub email: String,
    pub password: String,
}
#[derive(Debug)]
pub struct UserQuery {
    pub limit: Option<usize>,
}
#[derive(Debug, Deserialize, Serialize)]
pub struct UserRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub roles: Option<Vec<Role>>,
}
#[derive(Debug, Deserialize, Serialize)]
pub struct UserRefreshRequest {
    pub rtk: String,
}
#[derive(Debug, Deserialize, Serialize)]
pub struct UserResponse {
    pub _id: String,
    pub name: String,
    pub email: String,
    pub roles: Vec<Role>,
}
#[derive(Debug)]
pub struct UserAuthenticationData {
    pub _id: ObjectId,
    pub roles: Vec<Role>,
    pub token: String,
}
pub struct UserAuthenticationMiddleware<S> {
    service: Rc<S>,
}
pub struct UserAuthenticationMiddlewareFactory;

pub type UserAuthentication = Rc<UserAuthenticationData>;

impl User {
    pub async fn save(&mut self) -> Result<ObjectId, Error> {
        let db: Database = get_db();
        let collection: Collection<User> = db.collection::<User>("users");

        self._id = Some(ObjectId::new());
        self.password = bcrypt::hash(&self.password)
            .map_err(|_| Error::database("HASHING_FAILED"))?;

        collection
            .insert_one(&*self, None)
            .await
            .map_err(|_| Error::database("INSERTING_FAILED"))
            .map(|result| result.inserted_id.as_object_id().unwrap())
    }
    pub async fn find_many(query: &UserQuery) -> Result<Vec<UserResponse>, Error> {
        let db: Database = get_db();
        let collection: Collection<User> = db.collection::<User>("users");

        let mut pipeline: Vec<mongodb::bson::Document> = Vec::new();
        let mut users: Vec<UserResponse> = Vec::new();

        if let Some(limit) = query.limit {
            pipeline.push(doc! {
                "$limit": to_bson::<usize>(&limit).unwrap()
            })
        }

        pipeline.push(doc! {
            "$project": {
                "_id": { "$toString": "$_id" },
                "name": "$name",
                "email": "$email",
                "roles": "$roles",
            }
        });

        let mut cursor = collection
            .aggregate(pipeline, None)
            .await
            .map_err(|_| Error::database("QUERY_FAILED"))?;
        while let Some(Ok(document)) = cursor.next().await {
            if let Ok(user) = from_document::<UserResponse>(document) {
                users.push(user);
            }
        }
        Ok(users)
    }
    pub async fn find_by_id(_id: &ObjectId) -> Result<Option<User>, Error> {
        let db: Database = get_db();
        let collection: Collection<User> = db.collection::<User>("users");

        collection
            .find_one(doc! { "_id": _id }, None)
            .await
            .map_err(|_| Error::database("QUERY_FAILED"))
    }
    pub async fn find_by_email(email: &str) -> Result<Option<User>, Error> {
        let db: Database = get_db();
        let collection: Collection<User> = db.collection::<User>("users");

        collection
            .find_one(doc! { "email": email }, None)
            .await
            .map_err(|_| Error::database("QUERY_FAILED"))
    }
    pub async fn count() -> Result<u64, Error> {
        let db: Database = get_db();
        let collection: Collection<User> = db.collection::<User>("users");

        collection
            .count_documents(doc! {}, None)
            .await
            .map_err(|_| Error::database("QUERY_FAILED"))
    }
    pub fn response(&self) -> UserResponse {
        UserResponse {
            _id: self._id.map(|_id| _id.to_string()).unwrap_or_default(),
            name: self.name.clone(),
            email: self.email.clone(),
            roles: self.roles.clone(),
        }
    }
}

impl UserCredential {
    pub async fn authenticate(&self) -> Result<(String, String, UserResponse), Error> {
        let user = User::find_by_email(&self.email)
            .await?
            .ok_or_else(|| Error::forbidden("INVALID_COMBINATION", "invalid email or password"))?;

        if !bcrypt::verify(self.password.clone(), &user.password) {
            return Err(Error::forbidden(
                "INVALID_COMBINATION",
                "invalid email or password",
            ));
        }

        let _id = user._id.unwrap();
        let atk = Self::issue(&_id, "private_access", 86400)?;
        let rtk = Self::issue(&_id, "private_refresh", 604800)?;
        Ok((atk, rtk, user.response()))
    }
    pub async fn refresh(rtk: &str) -> Result<(String, String, UserResponse), Error> {
        let _id = Self::verify(rtk, "public_refresh").ok_or_else(Error::unauthenticated)?;
        let user = User::find_by_id(&_id)
            .await?
            .ok_or_else(Error::unauthenticated)?;

        let atk = Self::issue(&_id, "private_access", 86400)?;
        let rtk = Self::issue(&_id, "private_refresh", 604800)?;
        Ok((atk, rtk, user.response()))
    }
    fn issue(_id: &ObjectId, key: &str, lifetime: i64) -> Result<String, Error> {
        let claims: UserClaims = UserClaims {
            sub: _id.to_string(),
            exp: Utc::now().timestamp() + lifetime,
            iss: "OVR".to_string(),
            aud: "http://localhost:8000".to_string(),
        };

        let header: Header = Header::new(Algorithm::RS256);
        unsafe {
            encode(
                &header,
                &claims,
                &EncodingKey::from_rsa_pem(KEYS.get(key).unwrap().as_bytes()).unwrap(),
            )
            .map_err(|_| Error::database("GENERATING_FAILED"))
        }
    }
    pub fn verify(token: &str, key: &str) -> Option<ObjectId> {
        let validation: Validation = Validation::new(Algorithm::RS256);
        unsafe {
            if let Ok(data) = decode::<UserClaims>(
                token,
                &DecodingKey::from_rsa_pem(KEYS.get(key)?.as_bytes()).ok()?,
                &validation,
            ) {
                ObjectId::from_str(&data.claims.sub).ok()
            } else {
                None
            }
        }
    }
}

impl<S, B> Service<ServiceRequest> for UserAuthenticationMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = actix_web::Error> + 'static,
{
    type Response = ServiceResponse<B>;
    type Error = actix_web::Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    actix_service::forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let srv: Rc<S> = self.service.clone();

        async move {
            let headers: &actix_web::http::header::HeaderMap = req.headers();
            if let Some(bearer_token) = headers.get("Authorization") {
                if let Ok(header) = bearer_token.to_str() {
                    if let Some(token) = header.strip_prefix("Bearer ") {
                        if let Some(_id) = UserCredential::verify(token, "public_access") {
                            if let Ok(Some(user)) = User::find_by_id(&_id).await {
                                let auth_data: UserAuthenticationData = UserAuthenticationData {
                                    _id,
                                    roles: user.roles,
                                    token: token.to_string(),
                                };
                                req.extensions_mut()
                                    .insert::<UserAuthentication>(Rc::new(auth_data));
                            }
                        }
                    }
                }
            }
            let res: ServiceResponse<B> = srv.call(req).await?;
            Ok(res)
        }
        .boxed_local()
    }
}
impl<S, B> Transform<S, ServiceRequest> for UserAuthenticationMiddlewareFactory
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = actix_web::Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = actix_web::Error;
    type Transform = UserAuthenticationMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(UserAuthenticationMiddleware {
            service: Rc::new(service),
        }))
    }
}

pub fn load_keys() {
    let private_access_file =
        read_to_string("./keys/private_access.key").expect("LOAD_FAILED_PRIVATE_ACCESS");
    let public_access_file =
        read_to_string("./keys/public_access.pem").expect("LOAD_FAILED_PUBLIC_ACCESS");
    let private_refresh_file =
        read_to_string("./keys/private_refresh.key").expect("LOAD_FAILED_PRIVATE_REFRESH");
    let public_refresh_file =
        read_to_string("./keys/public_refresh.pem").expect("LOAD_FAILED_PUBLIC_REFRESH");
    unsafe {
        KEYS.insert("private_access".to_string(), private_access_file);
        KEYS.insert("public_access".to_string(), public_access_file);
        KEYS.insert("private_refresh".to_string(), private_refresh_file);
        KEYS.insert("public_refresh".to_string(), public_refresh_file);
    }
}
