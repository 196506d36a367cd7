use actix_web::{delete, get, patch, post, web, HttpRequest, HttpResponse};
use mongodb::bson::doc;

use crate::{
    error::Error,
    models::{
        incident::{
            AssignHodRequest, AssignInvestigatorRequest, CloseIncidentRequest, HodSubmitRequest,
            Incident, IncidentQueryParams, IncidentRequest, QiReviewAction, QiReviewRequest,
        },
        investigation::Investigation,
        user::{Role, User},
    },
    policy,
    routes::{authenticated, parse_id},
};

#[post("/incidents")]
pub async fn create_incident(
    payload: web::Json<IncidentRequest>,
    req: HttpRequest,
) -> Result<HttpResponse, Error> {
    let auth = authenticated(&req)?;
    let payload: IncidentRequest = payload.into_inner();

    if payload.description.trim().is_empty() {
        return Err(Error::validation(
            "DESCRIPTION_REQUIRED",
            "a description of the occurrence is required",
        ));
    }

    let mut incident = payload.into_incident(auth._id);
    incident.save().await?;
    Ok(HttpResponse::Created().json(doc! {
        "_id": incident._id.unwrap().to_string(),
        "reference": &incident.reference,
        "status": incident.status.as_str(),
    }))
}

#[get("/incidents")]
pub async fn get_incidents(
    query: web::Query<IncidentQueryParams>,
    req: HttpRequest,
) -> Result<HttpResponse, Error> {
    authenticated(&req)?;

    let incidents = Incident::find_many(&query.into_inner()).await?;
    Ok(HttpResponse::Ok().json(incidents))
}

#[get("/incidents/drafts")]
pub async fn get_drafts(req: HttpRequest) -> Result<HttpResponse, Error> {
    let auth = authenticated(&req)?;

    let drafts = Incident::find_drafts(&auth._id).await?;
    Ok(HttpResponse::Ok().json(drafts))
}

#[get("/incidents/{incident_id}")]
pub async fn get_incident(
    incident_id: web::Path<String>,
    req: HttpRequest,
) -> Result<HttpResponse, Error> {
    let auth = authenticated(&req)?;
    let incident_id = parse_id(&incident_id)?;

    let incident = Incident::find_by_id(&incident_id)
        .await?
        .ok_or_else(|| Error::not_found("INCIDENT_NOT_FOUND"))?;

    // a draft that is not yours does not exist, as far as you can tell
    if !policy::can_view_incident(incident.reporter_id == auth._id, &incident.status) {
        return Err(Error::not_found("INCIDENT_NOT_FOUND"));
    }
    Ok(HttpResponse::Ok().json(incident))
}

#[patch("/incidents/{incident_id}")]
pub async fn update_incident(
    incident_id: web::Path<String>,
    payload: web::Json<IncidentRequest>,
    req: HttpRequest,
) -> Result<HttpResponse, Error> {
    let auth = authenticated(&req)?;
    let incident_id = parse_id(&incident_id)?;

    let incident = Incident::find_by_id(&incident_id)
        .await?
        .ok_or_else(|| Error::not_found("INCIDENT_NOT_FOUND"))?;
    let is_reporter = incident.reporter_id == auth._id;
    if !policy::can_view_incident(is_reporter, &incident.status) {
        return Err(Error::not_found("INCIDENT_NOT_FOUND"));
    }
    if !policy::can_edit_incident(is_reporter, &incident.status) {
        return Err(Error::forbidden(
            "FORBIDDEN",
            "only the reporter may edit, and only while the report is a draft",
        ));
    }

    // the draft requirement re-runs inside the update filter, so an edit
    // racing a submit conflicts instead of overwriting
    let incident = Incident::update_draft(&incident_id, &auth._id, &payload.into_inner()).await?;
    Ok(HttpResponse::Ok().json(incident))
}

#[delete("/incidents/{incident_id}")]
pub async fn delete_incident(
    incident_id: web::Path<String>,
    req: HttpRequest,
) -> Result<HttpResponse, Error> {
    let auth = authenticated(&req)?;
    let incident_id = parse_id(&incident_id)?;

    let incident = Incident::find_by_id(&incident_id)
        .await?
        .ok_or_else(|| Error::not_found("INCIDENT_NOT_FOUND"))?;

    let is_reporter = incident.reporter_id == auth._id;
    if !policy::can_view_incident(is_reporter, &incident.status)
        && !auth.roles.contains(&Role::Admin)
    {
        return Err(Error::not_found("INCIDENT_NOT_FOUND"));
    }
    if !policy::can_delete_incident(&auth.roles, is_reporter, &incident.status) {
        return Err(Error::forbidden(
            "FORBIDDEN",
            "only the reporter of a draft or an admin may delete",
        ));
    }

    let deleted = Incident::delete_by_id(&incident_id).await?;
    Ok(HttpResponse::Ok().body(deleted.to_string()))
}

#[post("/incidents/{incident_id}/submit")]
pub async fn submit_incident(
    incident_id: web::Path<String>,
    req: HttpRequest,
) -> Result<HttpResponse, Error> {
    let auth = authenticated(&req)?;
    let incident_id = parse_id(&incident_id)?;

    let incident = Incident::find_by_id(&incident_id)
        .await?
        .ok_or_else(|| Error::not_found("INCIDENT_NOT_FOUND"))?;
    if incident.reporter_id != auth._id {
        return Err(Error::not_found("INCIDENT_NOT_FOUND"));
    }

    let incident = Incident::submit(&incident_id).await?;
    Ok(HttpResponse::Ok().json(incident))
}

#[post("/incidents/{incident_id}/qi-review")]
pub async fn qi_review(
    incident_id: web::Path<String>,
    payload: web::Json<QiReviewRequest>,
    req: HttpRequest,
) -> Result<HttpResponse, Error> {
    let auth = authenticated(&req)?;
    let incident_id = parse_id(&incident_id)?;
    let payload: QiReviewRequest = payload.into_inner();

    if !policy::can_review_submission(&auth.roles) {
        return Err(Error::forbidden("FORBIDDEN", "QI role required"));
    }

    let incident = match payload.action {
        QiReviewAction::Approve => Incident::qi_approve(&incident_id, auth._id).await?,
        QiReviewAction::Reject => {
            let reason = payload
                .reason
                .filter(|reason| !reason.trim().is_empty())
                .ok_or_else(|| {
                    Error::validation("REASON_REQUIRED", "a rejection reason is required")
                })?;
            Incident::qi_reject(&incident_id, auth._id, reason).await?
        }
    };
    Ok(HttpResponse::Ok().json(incident))
}

#[post("/incidents/{incident_id}/supervisor-approve")]
pub async fn supervisor_approve(
    incident_id: web::Path<String>,
    req: HttpRequest,
) -> Result<HttpResponse, Error> {
    let auth = authenticated(&req)?;
    let incident_id = parse_id(&incident_id)?;

    if !policy::can_supervisor_approve(&auth.roles) {
        return Err(Error::forbidden("FORBIDDEN", "supervisor role required"));
    }

    let incident = Incident::supervisor_approve(&incident_id, auth._id).await?;
    Ok(HttpResponse::Ok().json(incident))
}

#[post("/incidents/{incident_id}/qi-assign-hod")]
pub async fn qi_assign_hod(
    incident_id: web::Path<String>,
    payload: web::Json<AssignHodRequest>,
    req: HttpRequest,
) -> Result<HttpResponse, Error> {
    let auth = authenticated(&req)?;
    let incident_id = parse_id(&incident_id)?;
    let payload: AssignHodRequest = payload.into_inner();

    if !policy::can_assign_hod(&auth.roles) {
        return Err(Error::forbidden("FORBIDDEN", "QI role required"));
    }

    let hod = User::find_by_id(&payload.hod_id)
        .await?
        .ok_or_else(|| Error::validation("HOD_NOT_FOUND", "assignee does not exist"))?;
    if !hod.roles.contains(&Role::Hod) {
        return Err(Error::validation(
            "NOT_A_HOD",
            "assignee does not hold the department head role",
        ));
    }

    let incident = Incident::assign_hod(&incident_id, auth._id, payload.hod_id).await?;
    Ok(HttpResponse::Ok().json(incident))
}

#[post("/incidents/{incident_id}/hod-submit")]
pub async fn hod_submit(
    incident_id: web::Path<String>,
    payload: web::Json<HodSubmitRequest>,
    req: HttpRequest,
) -> Result<HttpResponse, Error> {
    let auth = authenticated(&req)?;
    let incident_id = parse_id(&incident_id)?;
    let payload: HodSubmitRequest = payload.into_inner();

    if !policy::can_hod_submit(&auth.roles) {
        return Err(Error::forbidden("FORBIDDEN", "department head role required"));
    }

    let incident = Incident::find_by_id(&incident_id)
        .await?
        .ok_or_else(|| Error::not_found("INCIDENT_NOT_FOUND"))?;
    if incident.hod_id != Some(auth._id) && !auth.roles.contains(&Role::Admin) {
        return Err(Error::forbidden(
            "FORBIDDEN",
            "only the assigned department head may submit this report",
        ));
    }

    let incident = Incident::hod_submit(&incident_id, auth._id, payload.report).await?;
    Ok(HttpResponse::Ok().json(incident))
}

#[post("/incidents/{incident_id}/assign-investigator")]
pub async fn assign_investigator(
    incident_id: web::Path<String>,
    payload: web::Json<AssignInvestigatorRequest>,
    req: HttpRequest,
) -> Result<HttpResponse, Error> {
    let auth = authenticated(&req)?;
    let incident_id = parse_id(&incident_id)?;
    let payload: AssignInvestigatorRequest = payload.into_inner();

    if !policy::can_assign_investigator(&auth.roles) {
        return Err(Error::forbidden(
            "FORBIDDEN",
            "QI, department head or admin role required",
        ));
    }
    if payload.investigator_ids.is_empty() {
        return Err(Error::validation(
            "INVESTIGATORS_REQUIRED",
            "at least one investigator is required",
        ));
    }
    for investigator_id in &payload.investigator_ids {
        if User::find_by_id(investigator_id).await?.is_none() {
            return Err(Error::validation(
                "INVESTIGATOR_NOT_FOUND",
                "investigator does not exist",
            ));
        }
    }

    let incident = Incident::add_investigators(&incident_id, &payload.investigator_ids).await?;
    // keep an already opened investigation's panel in step with the incident
    if let Some(investigation) = Investigation::find_by_incident(&incident_id).await? {
        Investigation::add_investigators(&investigation._id.unwrap(), &payload.investigator_ids)
            .await?;
    }
    Ok(HttpResponse::Ok().json(incident))
}

#[post("/incidents/{incident_id}/close")]
pub async fn close_incident(
    incident_id: web::Path<String>,
    payload: web::Json<CloseIncidentRequest>,
    req: HttpRequest,
) -> Result<HttpResponse, Error> {
    let auth = authenticated(&req)?;
    let incident_id = parse_id(&incident_id)?;

    // the open-action guard runs inside the close transaction itself
    let incident =
        Incident::close(&incident_id, auth._id, &auth.roles, payload.into_inner()).await?;
    // TODO: send the reporter their closure feedback once the mailer is wired up
    Ok(HttpResponse::Ok().json(incident))
}
