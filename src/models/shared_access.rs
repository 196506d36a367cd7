use crate::{
    database::get_db,
    error::Error,
    models::{
        incident::ActorStamp,
        user::{User, UserAuthenticationData},
    },
    policy,
};
use chrono::{Duration, Utc};
use futures::StreamExt;
use mongodb::{
    bson::{doc, oid::ObjectId, to_bson, DateTime},
    options::{FindOneAndUpdateOptions, ReturnDocument},
    Collection,
};
use rand::{distributions::Alphanumeric, Rng};
use serde::{Deserialize, Serialize};

const DEFAULT_EXPIRY_DAYS: i64 = 30;
const TOKEN_LENGTH: usize = 48;

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SharedResourceKind {
    Investigation,
    CorrectiveAction,
}

impl SharedResourceKind {
    pub fn not_found_code(&self) -> &'static str {
        match self {
            Self::Investigation => "INVESTIGATION_NOT_FOUND",
            Self::CorrectiveAction => "ACTION_NOT_FOUND",
        }
    }
}

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SharedAccessRole {
    Investigator,
    ActionHandler,
    Viewer,
}

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SharedAccessStatus {
    Pending,
    Accepted,
    Revoked,
}

/// Capability token scoping one outside participant to one resource.
/// Grants are never deleted; revocation is the only mutation after
/// acceptance, so the collection doubles as an audit trail.
#[derive(Debug, Deserialize, Serialize)]
pub struct SharedAccessGrant {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,
    pub resource_type: SharedResourceKind,
    pub resource_id: ObjectId,
    pub email: String,
    /// Filled in when the email already belongs to an account.
    pub user_id: Option<ObjectId>,
    pub role: SharedAccessRole,
    pub token: String,
    pub token_expires_at: DateTime,
    pub status: SharedAccessStatus,
    pub created_by: ObjectId,
    pub created_at: DateTime,
    pub accepted_at: Option<DateTime>,
    pub revoked: Option<ActorStamp>,
}

#[derive(Debug, Deserialize)]
pub struct SharedAccessRequest {
    pub resource_type: SharedResourceKind,
    pub resource_id: ObjectId,
    pub email: String,
    pub role: SharedAccessRole,
    pub expires_in_days: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct SharedAccessBulkRequest {
    pub grants: Vec<SharedAccessRequest>,
}

#[derive(Debug, Deserialize)]
pub struct SharedAccessAcceptRequest {
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct SharedAccessQueryParams {
    pub resource_type: Option<SharedResourceKind>,
    pub resource_id: Option<ObjectId>,
}

/// What a caller may do to one shared resource, however they proved it.
#[derive(Debug, PartialEq, Eq)]
pub enum EffectiveAccess {
    /// QI or admin session; no token needed.
    Full,
    /// A live grant; capped by the granted role.
    Granted(SharedAccessRole),
}

impl EffectiveAccess {
    pub fn allows_update(&self) -> bool {
        match self {
            Self::Full => true,
            Self::Granted(role) => *role != SharedAccessRole::Viewer,
        }
    }
    pub fn allows_investigation_submit(&self) -> bool {
        matches!(self, Self::Full | Self::Granted(SharedAccessRole::Investigator))
    }
}

fn generate_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_LENGTH)
        .map(char::from)
        .collect()
}

fn expiry(days: Option<i64>) -> DateTime {
    let expires = Utc::now() + Duration::days(days.unwrap_or(DEFAULT_EXPIRY_DAYS));
    DateTime::from_millis(expires.timestamp_millis())
}

impl SharedAccessGrant {
    fn collection() -> Collection<SharedAccessGrant> {
        get_db().collection::<SharedAccessGrant>("shared-access")
    }

    /// Usable means not revoked and not expired. Acceptance is bookkeeping,
    /// never a gate.
    pub fn is_usable(&self, now: DateTime) -> bool {
        self.status != SharedAccessStatus::Revoked && now < self.token_expires_at
    }

    pub fn covers(&self, resource_type: SharedResourceKind, resource_id: &ObjectId) -> bool {
        self.resource_type == resource_type && self.resource_id == *resource_id
    }

    pub async fn issue(request: SharedAccessRequest, creator: ObjectId) -> Result<SharedAccessGrant, Error> {
        let collection = Self::collection();

        let user_id = User::find_by_email(&request.email)
            .await?
            .and_then(|user| user._id);

        let grant = SharedAccessGrant {
            _id: Some(ObjectId::new()),
            resource_type: request.resource_type,
            resource_id: request.resource_id,
            email: request.email,
            user_id,
            role: request.role,
            token: generate_token(),
            token_expires_at: expiry(request.expires_in_days),
            status: SharedAccessStatus::Pending,
            created_by: creator,
            created_at: DateTime::now(),
            accepted_at: None,
            revoked: None,
        };

        collection
            .insert_one(&grant, None)
            .await
            .map_err(|_| Error::database("INSERTING_FAILED"))?;
        // TODO: email the invitation link once the mailer is wired up
        Ok(grant)
    }

    pub async fn issue_bulk(
        requests: Vec<SharedAccessRequest>,
        creator: ObjectId,
    ) -> Result<Vec<SharedAccessGrant>, Error> {
        let mut grants: Vec<SharedAccessGrant> = Vec::new();
        for request in requests {
            grants.push(Self::issue(request, creator).await?);
        }
        Ok(grants)
    }

    pub async fn find_by_id(_id: &ObjectId) -> Result<Option<SharedAccessGrant>, Error> {
        Self::collection()
            .find_one(doc! { "_id": _id }, None)
            .await
            .map_err(|_| Error::database("QUERY_FAILED"))
    }

    pub async fn find_by_token(token: &str) -> Result<Option<SharedAccessGrant>, Error> {
        Self::collection()
            .find_one(doc! { "token": token }, None)
            .await
            .map_err(|_| Error::database("QUERY_FAILED"))
    }

    pub async fn find_many(query: &SharedAccessQueryParams) -> Result<Vec<SharedAccessGrant>, Error> {
        let mut filter = doc! {};
        if let Some(resource_type) = &query.resource_type {
            filter.insert(
                "resource_type",
                to_bson::<SharedResourceKind>(resource_type).unwrap(),
            );
        }
        if let Some(resource_id) = &query.resource_id {
            filter.insert("resource_id", *resource_id);
        }

        let mut cursor = Self::collection()
            .find(filter, None)
            .await
            .map_err(|_| Error::database("QUERY_FAILED"))?;
        let mut grants: Vec<SharedAccessGrant> = Vec::new();
        while let Some(Ok(grant)) = cursor.next().await {
            grants.push(grant);
        }
        Ok(grants)
    }

    /// One-way `pending|accepted -> revoked`. Takes effect on the very next
    /// validation, not at the next expiry sweep.
    pub async fn revoke(_id: &ObjectId, actor: ObjectId) -> Result<SharedAccessGrant, Error> {
        let collection = Self::collection();

        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();
        let result = collection
            .find_one_and_update(
                doc! {
                    "_id": _id,
                    "status": { "$ne": to_bson::<SharedAccessStatus>(&SharedAccessStatus::Revoked).unwrap() },
                },
                doc! { "$set": {
                    "status": to_bson::<SharedAccessStatus>(&SharedAccessStatus::Revoked).unwrap(),
                    "revoked": to_bson::<ActorStamp>(&ActorStamp::now(actor)).unwrap(),
                }},
                options,
            )
            .await
            .map_err(|_| Error::database("UPDATE_FAILED"))?;

        match result {
            Some(grant) => {
                tracing::warn!(grant = %_id, "shared access revoked");
                Ok(grant)
            }
            None => match Self::find_by_id(_id).await? {
                Some(_) => Err(Error::conflict("ALREADY_REVOKED", "grant is already revoked")),
                None => Err(Error::not_found("GRANT_NOT_FOUND")),
            },
        }
    }

    pub async fn accept(token: &str) -> Result<SharedAccessGrant, Error> {
        let collection = Self::collection();

        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();
        let result = collection
            .find_one_and_update(
                doc! {
                    "token": token,
                    "status": to_bson::<SharedAccessStatus>(&SharedAccessStatus::Pending).unwrap(),
                    "token_expires_at": { "$gt": DateTime::now() },
                },
                doc! { "$set": {
                    "status": to_bson::<SharedAccessStatus>(&SharedAccessStatus::Accepted).unwrap(),
                    "accepted_at": DateTime::now(),
                }},
                options,
            )
            .await
            .map_err(|_| Error::database("UPDATE_FAILED"))?;

        result.ok_or_else(|| Error::not_found("GRANT_NOT_FOUND"))
    }
}

/// Single resolution point for the session-or-token question. Role path and
/// token path are independent; either one is enough. Callers that cannot
/// prove anything get the resource's not-found error, never a forbidden.
pub async fn resolve_access(
    auth: Option<&UserAuthenticationData>,
    token: Option<&str>,
    resource_type: SharedResourceKind,
    resource_id: &ObjectId,
) -> Result<EffectiveAccess, Error> {
    if let Some(auth) = auth {
        if policy::has_full_shared_access(&auth.roles) {
            return Ok(EffectiveAccess::Full);
        }
    }

    if let Some(token) = token {
        if let Some(grant) = SharedAccessGrant::find_by_token(token).await? {
            if grant.covers(resource_type, resource_id) && grant.is_usable(DateTime::now()) {
                return Ok(EffectiveAccess::Granted(grant.role));
            }
        }
    }

    Err(Error::not_found(resource_type.not_found_code()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grant(status: SharedAccessStatus, expires_in_ms: i64) -> SharedAccessGrant {
        SharedAccessGrant {
            _id: Some(ObjectId::new()),
            resource_type: SharedResourceKind::Investigation,
            resource_id: ObjectId::new(),
            email: "externe@example.org".to_string(),
            user_id: None,
            role: SharedAccessRole::Investigator,
            token: generate_token(),
            token_expires_at: DateTime::from_millis(
                DateTime::now().timestamp_millis() + expires_in_ms,
            ),
            status,
            created_by: ObjectId::new(),
            created_at: DateTime::now(),
            accepted_at: None,
            revoked: None,
        }
    }

    #[test]
    fn tokens_are_long_and_opaque() {
        let token = generate_token();
        assert_eq!(token.len(), TOKEN_LENGTH);
        assert!(token.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(token, generate_token());
    }

    #[test]
    fn a_pending_unexpired_grant_is_usable() {
        let grant = grant(SharedAccessStatus::Pending, 60_000);
        assert!(grant.is_usable(DateTime::now()));
    }

    #[test]
    fn revocation_denies_immediately_even_before_expiry() {
        let grant = grant(SharedAccessStatus::Revoked, 60_000);
        assert!(!grant.is_usable(DateTime::now()));
    }

    #[test]
    fn expiry_denies_even_an_accepted_grant() {
        let grant = grant(SharedAccessStatus::Accepted, -1);
        assert!(!grant.is_usable(DateTime::now()));
    }

    #[test]
    fn a_grant_covers_exactly_its_resource() {
        let grant = grant(SharedAccessStatus::Pending, 60_000);
        assert!(grant.covers(SharedResourceKind::Investigation, &grant.resource_id));
        assert!(!grant.covers(SharedResourceKind::CorrectiveAction, &grant.resource_id));
        assert!(!grant.covers(SharedResourceKind::Investigation, &ObjectId::new()));
    }

    #[test]
    fn default_expiry_is_thirty_days_out() {
        let expires = expiry(None);
        let low = Utc::now() + Duration::days(29);
        let high = Utc::now() + Duration::days(31);
        assert!(expires.timestamp_millis() > low.timestamp_millis());
        assert!(expires.timestamp_millis() < high.timestamp_millis());
    }

    #[test]
    fn viewer_grants_cannot_mutate() {
        assert!(!EffectiveAccess::Granted(SharedAccessRole::Viewer).allows_update());
        assert!(EffectiveAccess::Granted(SharedAccessRole::ActionHandler).allows_update());
        assert!(EffectiveAccess::Full.allows_update());
    }

    #[test]
    fn only_investigator_grants_submit_findings() {
        assert!(EffectiveAccess::Granted(SharedAccessRole::Investigator)
            .allows_investigation_submit());
        assert!(!EffectiveAccess::Granted(SharedAccessRole::ActionHandler)
            .allows_investigation_submit());
        assert!(EffectiveAccess::Full.allows_investigation_submit());
    }
}
