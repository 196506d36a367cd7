use actix_web::{get, post, put, web, HttpRequest, HttpResponse};

use crate::{
    error::Error,
    models::{
        corrective_action::{
            CorrectiveAction, CorrectiveActionQueryParams, CorrectiveActionRequest,
            CorrectiveActionUpdateRequest,
        },
        shared_access::{resolve_access, SharedResourceKind},
    },
    policy,
    routes::{authenticated, maybe_authenticated, parse_id},
};

#[post("/corrective-actions")]
pub async fn create_action(
    payload: web::Json<CorrectiveActionRequest>,
    req: HttpRequest,
) -> Result<HttpResponse, Error> {
    let auth = authenticated(&req)?;
    let payload: CorrectiveActionRequest = payload.into_inner();

    if !policy::can_create_corrective_action(&auth.roles) {
        return Err(Error::forbidden("FORBIDDEN", "QI role required"));
    }
    if payload.title.trim().is_empty() {
        return Err(Error::validation("TITLE_REQUIRED", "a title is required"));
    }

    let mut action = payload.into_action(auth._id);
    let _id = action.save().await?;
    Ok(HttpResponse::Created().body(_id.to_string()))
}

#[get("/corrective-actions")]
pub async fn get_actions(
    query: web::Query<CorrectiveActionQueryParams>,
    req: HttpRequest,
) -> Result<HttpResponse, Error> {
    authenticated(&req)?;

    let actions = CorrectiveAction::find_by_incident(&query.incident_id).await?;
    Ok(HttpResponse::Ok().json(actions))
}

#[put("/corrective-actions/{action_id}")]
pub async fn update_action(
    action_id: web::Path<String>,
    payload: web::Json<CorrectiveActionUpdateRequest>,
    req: HttpRequest,
) -> Result<HttpResponse, Error> {
    let action_id = parse_id(&action_id)?;
    let payload: CorrectiveActionUpdateRequest = payload.into_inner();
    let auth = maybe_authenticated(&req);

    let action = CorrectiveAction::find_by_id(&action_id)
        .await?
        .ok_or_else(|| Error::not_found("ACTION_NOT_FOUND"))?;

    let assignee = matches!(&auth, Some(auth) if action.assigned_to.contains(&auth._id));
    if !assignee {
        let access = resolve_access(
            auth.as_deref(),
            payload.token.as_deref(),
            SharedResourceKind::CorrectiveAction,
            &action_id,
        )
        .await?;
        if !access.allows_update() {
            return Err(Error::forbidden(
                "FORBIDDEN",
                "an action handler grant is required to update",
            ));
        }
    }

    let action = CorrectiveAction::update(&action_id, &payload).await?;
    Ok(HttpResponse::Ok().json(action))
}

#[post("/corrective-actions/{action_id}/close")]
pub async fn close_action(
    action_id: web::Path<String>,
    req: HttpRequest,
) -> Result<HttpResponse, Error> {
    let auth = authenticated(&req)?;
    let action_id = parse_id(&action_id)?;

    if !policy::can_close_corrective_action(&auth.roles) {
        return Err(Error::forbidden("FORBIDDEN", "QI role required"));
    }

    let action = CorrectiveAction::close(&action_id, auth._id).await?;
    Ok(HttpResponse::Ok().json(action))
}
