use actix_web::{get, post, web, HttpRequest, HttpResponse};
use serde::Deserialize;

use crate::{
    error::Error,
    models::{
        incident::Incident,
        investigation::{Investigation, InvestigationRequest, InvestigationSubmitRequest},
        shared_access::{resolve_access, SharedResourceKind},
    },
    policy,
    routes::{authenticated, maybe_authenticated, parse_id},
};

#[derive(Debug, Deserialize)]
pub struct InvestigationAccessParams {
    pub token: Option<String>,
}

#[post("/investigations")]
pub async fn create_investigation(
    payload: web::Json<InvestigationRequest>,
    req: HttpRequest,
) -> Result<HttpResponse, Error> {
    let auth = authenticated(&req)?;
    let payload: InvestigationRequest = payload.into_inner();

    let incident = Incident::find_by_id(&payload.incident_id)
        .await?
        .ok_or_else(|| Error::not_found("INCIDENT_NOT_FOUND"))?;

    if !policy::can_create_investigation(&auth.roles, &incident.status) {
        if !policy::can_review_submission(&auth.roles) {
            return Err(Error::forbidden("FORBIDDEN", "QI role required"));
        }
        return Err(Error::conflict(
            "STATUS_CONFLICT",
            format!(
                "incident is {}, an investigation needs the investigating stage",
                incident.status
            ),
        ));
    }
    if payload.investigator_ids.is_empty() {
        return Err(Error::validation(
            "INVESTIGATORS_REQUIRED",
            "at least one investigator is required",
        ));
    }

    let _id = Investigation::create(payload, auth._id).await?;
    Ok(HttpResponse::Created().body(_id.to_string()))
}

#[get("/investigations/{investigation_id}")]
pub async fn get_investigation(
    investigation_id: web::Path<String>,
    query: web::Query<InvestigationAccessParams>,
    req: HttpRequest,
) -> Result<HttpResponse, Error> {
    let investigation_id = parse_id(&investigation_id)?;
    let auth = maybe_authenticated(&req);

    let investigation = Investigation::find_by_id(&investigation_id)
        .await?
        .ok_or_else(|| Error::not_found("INVESTIGATION_NOT_FOUND"))?;

    let listed = matches!(&auth, Some(auth) if investigation.is_listed_investigator(&auth._id));
    if !listed {
        // any live grant on this investigation, viewer included, may read it
        resolve_access(
            auth.as_deref(),
            query.token.as_deref(),
            SharedResourceKind::Investigation,
            &investigation_id,
        )
        .await?;
    }
    Ok(HttpResponse::Ok().json(investigation))
}

#[post("/investigations/{investigation_id}/submit")]
pub async fn submit_investigation(
    investigation_id: web::Path<String>,
    payload: web::Json<InvestigationSubmitRequest>,
    req: HttpRequest,
) -> Result<HttpResponse, Error> {
    let investigation_id = parse_id(&investigation_id)?;
    let payload: InvestigationSubmitRequest = payload.into_inner();
    let auth = maybe_authenticated(&req);

    if payload.findings.trim().is_empty() {
        return Err(Error::validation(
            "FINDINGS_REQUIRED",
            "investigation findings are required",
        ));
    }

    let investigation = Investigation::find_by_id(&investigation_id)
        .await?
        .ok_or_else(|| Error::not_found("INVESTIGATION_NOT_FOUND"))?;

    let listed = matches!(&auth, Some(auth) if investigation.is_listed_investigator(&auth._id));
    if !listed {
        let access = resolve_access(
            auth.as_deref(),
            payload.token.as_deref(),
            SharedResourceKind::Investigation,
            &investigation_id,
        )
        .await?;
        if !access.allows_investigation_submit() {
            // a viewer grant proves existence but not the right to submit
            return Err(Error::forbidden(
                "FORBIDDEN",
                "an investigator grant is required to submit findings",
            ));
        }
    }

    let submitted_by = auth.as_ref().map(|auth| auth._id);
    let investigation = Investigation::submit(&investigation_id, submitted_by, &payload).await?;
    Ok(HttpResponse::Ok().json(investigation))
}
