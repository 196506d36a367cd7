use crate::{
    database::{get_client, get_db},
    error::Error,
    models::{corrective_action::CorrectiveAction, user::Role},
    policy,
};
use chrono::{Datelike, Utc};
use futures::StreamExt;
use mongodb::{
    bson::{doc, from_document, oid::ObjectId, to_bson, DateTime, Document},
    options::{FindOneAndUpdateOptions, ReturnDocument},
    Collection, Database,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Workflow stages of an occurrence report. After `submitted` the pipeline
/// forks: QI approval leads into the investigation branch, supervisor
/// approval into the HOD review branch. Both end at `closed`.
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum IncidentStatus {
    Draft,
    Submitted,
    SupervisorApproved,
    Investigating,
    HodAssigned,
    QiFinalReview,
    QiFinalActions,
    Closed,
}

impl IncidentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Submitted => "submitted",
            Self::SupervisorApproved => "supervisor_approved",
            Self::Investigating => "investigating",
            Self::HodAssigned => "hod_assigned",
            Self::QiFinalReview => "qi_final_review",
            Self::QiFinalActions => "qi_final_actions",
            Self::Closed => "closed",
        }
    }

    /// Legal outgoing edges. `Submitted -> Draft` is the QI rejection edge,
    /// the only backward move in the whole machine.
    pub fn successors(&self) -> &'static [IncidentStatus] {
        match self {
            Self::Draft => &[Self::Submitted],
            Self::Submitted => &[Self::Investigating, Self::SupervisorApproved, Self::Draft],
            Self::SupervisorApproved => &[Self::HodAssigned],
            Self::Investigating => &[Self::QiFinalActions],
            Self::HodAssigned => &[Self::QiFinalReview],
            Self::QiFinalReview => &[Self::Closed],
            Self::QiFinalActions => &[Self::Closed],
            Self::Closed => &[],
        }
    }
}

impl fmt::Display for IncidentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum IncidentSeverity {
    NearMiss,
    Minor,
    Moderate,
    Major,
    Catastrophic,
}

/// Who fired a transition, and when. Set exactly once per stage.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ActorStamp {
    pub _id: ObjectId,
    pub time: DateTime,
}

impl ActorStamp {
    pub fn now(_id: ObjectId) -> Self {
        Self {
            _id,
            time: DateTime::now(),
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct IncidentRejection {
    pub reason: String,
    pub by: ObjectId,
    pub time: DateTime,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Incident {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,
    pub reference: String,
    pub status: IncidentStatus,
    // bumped by child writes so they conflict with concurrent transitions
    #[serde(default)]
    pub revision: i64,
    pub reporter_id: ObjectId,
    pub created_at: DateTime,
    pub submitted_at: Option<DateTime>,
    pub supervisor: Option<ActorStamp>,
    pub qi_receiver: Option<ActorStamp>,
    pub hod_id: Option<ObjectId>,
    pub hod_assigned: Option<ActorStamp>,
    pub hod_report: Option<String>,
    pub hod_submitted: Option<ActorStamp>,
    pub closer: Option<ActorStamp>,
    pub rejection: Option<IncidentRejection>,
    pub investigator_ids: Vec<ObjectId>,
    pub patient_name: Option<String>,
    pub patient_mrn: Option<String>,
    pub department: String,
    pub category: String,
    pub subcategory: String,
    pub severity: IncidentSeverity,
    pub occurred_at: DateTime,
    pub description: String,
    pub witness_account: Option<String>,
    pub medical_assessment: Option<String>,
    pub case_review: Option<String>,
    pub reporter_feedback: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct IncidentRequest {
    pub patient_name: Option<String>,
    pub patient_mrn: Option<String>,
    pub department: String,
    pub category: String,
    pub subcategory: String,
    pub severity: IncidentSeverity,
    pub occurred_at: DateTime,
    pub description: String,
    pub witness_account: Option<String>,
    pub medical_assessment: Option<String>,
    /// `true` files the report immediately instead of keeping a draft.
    #[serde(default)]
    pub submit: bool,
}

#[derive(Debug, Deserialize)]
pub struct IncidentQueryParams {
    pub status: Option<IncidentStatus>,
    pub department: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct IncidentListResponse {
    pub _id: String,
    pub reference: String,
    pub status: IncidentStatus,
    pub reporter_id: String,
    pub department: String,
    pub category: String,
    pub severity: IncidentSeverity,
    pub description: String,
}

#[derive(Debug, Deserialize)]
pub struct QiReviewRequest {
    pub action: QiReviewAction,
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QiReviewAction {
    Approve,
    Reject,
}

#[derive(Debug, Deserialize)]
pub struct AssignHodRequest {
    pub hod_id: ObjectId,
}

#[derive(Debug, Deserialize)]
pub struct HodSubmitRequest {
    pub report: String,
}

#[derive(Debug, Deserialize)]
pub struct AssignInvestigatorRequest {
    pub investigator_ids: Vec<ObjectId>,
}

#[derive(Debug, Deserialize)]
pub struct CloseIncidentRequest {
    pub case_review: String,
    pub reporter_feedback: Option<String>,
}

pub fn format_reference(year: i32, month: u32, sequence: i64) -> String {
    format!("OVR-{year}-{month:02}-{sequence:03}")
}

fn open_actions_conflict(open_actions: u64) -> Error {
    Error::conflict(
        "ACTIONS_STILL_OPEN",
        format!("{open_actions} corrective action(s) still open"),
    )
}

/// Atomic per-(year, month) sequence. The `$inc` upsert allocates the next
/// number inside the server, so concurrent creators can never collide.
async fn next_reference() -> Result<String, Error> {
    let db: Database = get_db();
    let collection: Collection<Document> = db.collection::<Document>("counters");

    let now = Utc::now();
    let key = format!("ovr-{}-{:02}", now.year(), now.month());

    let options = FindOneAndUpdateOptions::builder()
        .upsert(true)
        .return_document(ReturnDocument::After)
        .build();
    let counter = collection
        .find_one_and_update(doc! { "_id": &key }, doc! { "$inc": { "seq": 1_i64 } }, options)
        .await
        .map_err(|_| Error::database("SEQUENCE_FAILED"))?
        .ok_or_else(|| Error::database("SEQUENCE_FAILED"))?;

    let sequence = counter
        .get_i64("seq")
        .map_err(|_| Error::database("SEQUENCE_FAILED"))?;
    Ok(format_reference(now.year(), now.month(), sequence))
}

impl Incident {
    fn collection() -> Collection<Incident> {
        get_db().collection::<Incident>("incidents")
    }

    pub async fn save(&mut self) -> Result<ObjectId, Error> {
        let collection = Self::collection();

        self._id = Some(ObjectId::new());
        self.reference = next_reference().await?;

        collection
            .insert_one(&*self, None)
            .await
            .map_err(|_| Error::database("INSERTING_FAILED"))
            .map(|result| result.inserted_id.as_object_id().unwrap())
    }

    pub async fn find_by_id(_id: &ObjectId) -> Result<Option<Incident>, Error> {
        Self::collection()
            .find_one(doc! { "_id": _id }, None)
            .await
            .map_err(|_| Error::database("QUERY_FAILED"))
    }

    /// General listing. Drafts never leave this query, whatever the filter
    /// says.
    pub async fn find_many(query: &IncidentQueryParams) -> Result<Vec<IncidentListResponse>, Error> {
        let collection = Self::collection();

        let mut matcher = doc! { "status": { "$ne": IncidentStatus::Draft.as_str() } };
        if let Some(status) = &query.status {
            if *status != IncidentStatus::Draft {
                matcher.insert("status", status.as_str());
            }
        }
        if let Some(department) = &query.department {
            matcher.insert("department", department);
        }

        let mut pipeline: Vec<Document> = vec![doc! { "$match": matcher }];
        if let Some(limit) = query.limit {
            pipeline.push(doc! { "$limit": to_bson::<usize>(&limit).unwrap() });
        }
        pipeline.push(doc! {
            "$project": {
                "_id": { "$toString": "$_id" },
                "reference": "$reference",
                "status": "$status",
                "reporter_id": { "$toString": "$reporter_id" },
                "department": "$department",
                "category": "$category",
                "severity": "$severity",
                "description": "$description",
            }
        });

        let mut cursor = collection
            .aggregate(pipeline, None)
            .await
            .map_err(|_| Error::database("QUERY_FAILED"))?;
        let mut incidents: Vec<IncidentListResponse> = Vec::new();
        while let Some(Ok(document)) = cursor.next().await {
            if let Ok(incident) = from_document::<IncidentListResponse>(document) {
                incidents.push(incident);
            }
        }
        Ok(incidents)
    }

    /// The only query path that returns drafts, scoped to their reporter.
    pub async fn find_drafts(reporter_id: &ObjectId) -> Result<Vec<Incident>, Error> {
        let collection = Self::collection();

        let mut cursor = collection
            .find(
                doc! {
                    "reporter_id": reporter_id,
                    "status": IncidentStatus::Draft.as_str(),
                },
                None,
            )
            .await
            .map_err(|_| Error::database("QUERY_FAILED"))?;
        let mut drafts: Vec<Incident> = Vec::new();
        while let Some(Ok(incident)) = cursor.next().await {
            drafts.push(incident);
        }
        Ok(drafts)
    }

    /// Compare-and-set transition: the expected source status rides in the
    /// filter, so two actors racing the same edge cannot both win. A miss is
    /// re-read to tell "gone" from "already moved on".
    async fn transition(
        _id: &ObjectId,
        from: &[IncidentStatus],
        update: Document,
    ) -> Result<Incident, Error> {
        let collection = Self::collection();

        let sources: Vec<&str> = from.iter().map(|status| status.as_str()).collect();
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();
        let result = collection
            .find_one_and_update(
                doc! { "_id": _id, "status": { "$in": sources.clone() } },
                update,
                options,
            )
            .await
            .map_err(|_| Error::database("UPDATE_FAILED"))?;

        match result {
            Some(incident) => {
                tracing::info!(
                    incident = %incident.reference,
                    status = %incident.status,
                    "incident transitioned"
                );
                Ok(incident)
            }
            None => match Self::find_by_id(_id).await? {
                Some(actual) => Err(Error::conflict(
                    "STATUS_CONFLICT",
                    format!(
                        "incident is {}, transition requires {}",
                        actual.status,
                        sources.join(" or ")
                    ),
                )),
                None => Err(Error::not_found("INCIDENT_NOT_FOUND")),
            },
        }
    }

    pub async fn submit(_id: &ObjectId) -> Result<Incident, Error> {
        Self::transition(
            _id,
            &[IncidentStatus::Draft],
            doc! { "$set": {
                "status": IncidentStatus::Submitted.as_str(),
                "submitted_at": DateTime::now(),
            }},
        )
        .await
        // TODO: notify the QI intake queue once the mailer is wired up
    }

    pub async fn qi_approve(_id: &ObjectId, actor: ObjectId) -> Result<Incident, Error> {
        Self::transition(
            _id,
            &[IncidentStatus::Submitted],
            doc! { "$set": {
                "status": IncidentStatus::Investigating.as_str(),
                "qi_receiver": to_bson::<ActorStamp>(&ActorStamp::now(actor)).unwrap(),
            }},
        )
        .await
    }

    /// Rejection is the one backward edge: back to draft, submission
    /// timestamp cleared, reason kept for the reporter.
    pub async fn qi_reject(_id: &ObjectId, actor: ObjectId, reason: String) -> Result<Incident, Error> {
        let rejection = IncidentRejection {
            reason,
            by: actor,
            time: DateTime::now(),
        };
        Self::transition(
            _id,
            &[IncidentStatus::Submitted],
            doc! {
                "$set": {
                    "status": IncidentStatus::Draft.as_str(),
                    "rejection": to_bson::<IncidentRejection>(&rejection).unwrap(),
                },
                "$unset": { "submitted_at": "" },
            },
        )
        .await
    }

    pub async fn supervisor_approve(_id: &ObjectId, actor: ObjectId) -> Result<Incident, Error> {
        Self::transition(
            _id,
            &[IncidentStatus::Submitted],
            doc! { "$set": {
                "status": IncidentStatus::SupervisorApproved.as_str(),
                "supervisor": to_bson::<ActorStamp>(&ActorStamp::now(actor)).unwrap(),
            }},
        )
        .await
    }

    pub async fn assign_hod(
        _id: &ObjectId,
        actor: ObjectId,
        hod_id: ObjectId,
    ) -> Result<Incident, Error> {
        Self::transition(
            _id,
            &[IncidentStatus::SupervisorApproved],
            doc! { "$set": {
                "status": IncidentStatus::HodAssigned.as_str(),
                "hod_id": hod_id,
                "hod_assigned": to_bson::<ActorStamp>(&ActorStamp::now(actor)).unwrap(),
            }},
        )
        .await
        // TODO: notify the assigned department head once the mailer is wired up
    }

    pub async fn hod_submit(
        _id: &ObjectId,
        actor: ObjectId,
        report: String,
    ) -> Result<Incident, Error> {
        Self::transition(
            _id,
            &[IncidentStatus::HodAssigned],
            doc! { "$set": {
                "status": IncidentStatus::QiFinalReview.as_str(),
                "hod_report": report,
                "hod_submitted": to_bson::<ActorStamp>(&ActorStamp::now(actor)).unwrap(),
            }},
        )
        .await
    }

    /// Closure runs its guard and its write in one transaction: the open
    /// action count and the status CAS see the same snapshot, and the
    /// incident write conflicts with any corrective action created
    /// concurrently.
    pub async fn close(
        _id: &ObjectId,
        actor: ObjectId,
        roles: &[Role],
        payload: CloseIncidentRequest,
    ) -> Result<Incident, Error> {
        if !policy::can_review_submission(roles) {
            return Err(Error::forbidden("FORBIDDEN", "QI role required"));
        }

        let client = get_client();
        let mut session = client
            .start_session(None)
            .await
            .map_err(|_| Error::database("SESSION_FAILED"))?;
        session
            .start_transaction(None)
            .await
            .map_err(|_| Error::database("SESSION_FAILED"))?;

        let result = Self::close_in_session(_id, actor, roles, payload, &mut session).await;
        match result {
            Ok(incident) => {
                session
                    .commit_transaction()
                    .await
                    .map_err(|error| Error::from_write(error, "COMMIT_FAILED"))?;
                Ok(incident)
            }
            Err(error) => {
                let _ = session.abort_transaction().await;
                Err(error)
            }
        }
    }

    async fn close_in_session(
        _id: &ObjectId,
        actor: ObjectId,
        roles: &[Role],
        payload: CloseIncidentRequest,
        session: &mut mongodb::ClientSession,
    ) -> Result<Incident, Error> {
        let open_actions = CorrectiveAction::count_open(_id, session).await?;
        if !policy::can_close_incident(roles, open_actions) {
            return Err(open_actions_conflict(open_actions));
        }

        let collection = Self::collection();
        let sources = vec![
            IncidentStatus::QiFinalReview.as_str(),
            IncidentStatus::QiFinalActions.as_str(),
        ];
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();
        let result = collection
            .find_one_and_update_with_session(
                doc! { "_id": _id, "status": { "$in": sources.clone() } },
                doc! { "$set": {
                    "status": IncidentStatus::Closed.as_str(),
                    "closer": to_bson::<ActorStamp>(&ActorStamp::now(actor)).unwrap(),
                    "case_review": payload.case_review,
                    "reporter_feedback": to_bson::<Option<String>>(&payload.reporter_feedback).unwrap(),
                }},
                options,
                session,
            )
            .await
            .map_err(|error| Error::from_write(error, "UPDATE_FAILED"))?;

        match result {
            Some(incident) => {
                tracing::info!(incident = %incident.reference, "incident closed");
                Ok(incident)
            }
            None => match collection
                .find_one_with_session(doc! { "_id": _id }, None, session)
                .await
                .map_err(|_| Error::database("QUERY_FAILED"))?
            {
                Some(actual) => Err(Error::conflict(
                    "STATUS_CONFLICT",
                    format!(
                        "incident is {}, transition requires {}",
                        actual.status,
                        sources.join(" or ")
                    ),
                )),
                None => Err(Error::not_found("INCIDENT_NOT_FOUND")),
            },
        }
    }

    pub async fn add_investigators(
        _id: &ObjectId,
        investigator_ids: &[ObjectId],
    ) -> Result<Incident, Error> {
        let collection = Self::collection();

        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();
        collection
            .find_one_and_update(
                doc! { "_id": _id },
                doc! { "$addToSet": {
                    "investigator_ids": { "$each": to_bson::<&[ObjectId]>(&investigator_ids).unwrap() }
                }},
                options,
            )
            .await
            .map_err(|_| Error::database("UPDATE_FAILED"))?
            .ok_or_else(|| Error::not_found("INCIDENT_NOT_FOUND"))
    }

    /// Draft editing: the draft filter makes owner edits of an already
    /// submitted report a conflict, not a lost update.
    pub async fn update_draft(
        _id: &ObjectId,
        reporter_id: &ObjectId,
        payload: &IncidentRequest,
    ) -> Result<Incident, Error> {
        let collection = Self::collection();

        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();
        let result = collection
            .find_one_and_update(
                doc! {
                    "_id": _id,
                    "reporter_id": reporter_id,
                    "status": IncidentStatus::Draft.as_str(),
                },
                doc! { "$set": {
                    "patient_name": to_bson::<Option<String>>(&payload.patient_name).unwrap(),
                    "patient_mrn": to_bson::<Option<String>>(&payload.patient_mrn).unwrap(),
                    "department": &payload.department,
                    "category": &payload.category,
                    "subcategory": &payload.subcategory,
                    "severity": to_bson::<IncidentSeverity>(&payload.severity).unwrap(),
                    "occurred_at": payload.occurred_at,
                    "description": &payload.description,
                    "witness_account": to_bson::<Option<String>>(&payload.witness_account).unwrap(),
                    "medical_assessment": to_bson::<Option<String>>(&payload.medical_assessment).unwrap(),
                }},
                options,
            )
            .await
            .map_err(|_| Error::database("UPDATE_FAILED"))?;

        match result {
            Some(incident) => Ok(incident),
            None => match Self::find_by_id(_id).await? {
                Some(actual) if actual.reporter_id == *reporter_id => Err(Error::conflict(
                    "STATUS_CONFLICT",
                    format!("incident is {}, only drafts can be edited", actual.status),
                )),
                _ => Err(Error::not_found("INCIDENT_NOT_FOUND")),
            },
        }
    }

    pub async fn delete_by_id(_id: &ObjectId) -> Result<u64, Error> {
        Self::collection()
            .delete_one(doc! { "_id": _id }, None)
            .await
            .map_err(|_| Error::database("DELETION_FAILED"))
            .map(|result| result.deleted_count)
    }
}

impl IncidentRequest {
    pub fn into_incident(self, reporter_id: ObjectId) -> Incident {
        let status = if self.submit {
            IncidentStatus::Submitted
        } else {
            IncidentStatus::Draft
        };
        Incident {
            _id: None,
            reference: String::new(),
            status,
            revision: 0,
            reporter_id,
            created_at: DateTime::now(),
            submitted_at: self.submit.then(DateTime::now),
            supervisor: None,
            qi_receiver: None,
            hod_id: None,
            hod_assigned: None,
            hod_report: None,
            hod_submitted: None,
            closer: None,
            rejection: None,
            investigator_ids: Vec::new(),
            patient_name: self.patient_name,
            patient_mrn: self.patient_mrn,
            department: self.department,
            category: self.category,
            subcategory: self.subcategory,
            severity: self.severity,
            occurred_at: self.occurred_at,
            description: self.description,
            witness_account: self.witness_account,
            medical_assessment: self.medical_assessment,
            case_review: None,
            reporter_feedback: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_numbers_pad_month_and_sequence() {
        assert_eq!(format_reference(2026, 8, 1), "OVR-2026-08-001");
        assert_eq!(format_reference(2026, 12, 142), "OVR-2026-12-142");
    }

    #[test]
    fn reference_numbers_increase_within_a_bucket() {
        let earlier = format_reference(2026, 8, 41);
        let later = format_reference(2026, 8, 42);
        assert!(later > earlier);
        assert_ne!(earlier, later);
    }

    #[test]
    fn closing_with_open_actions_names_the_count() {
        let error = open_actions_conflict(2);
        assert_eq!(error.code(), "ACTIONS_STILL_OPEN");
        assert_eq!(error.to_string(), "2 corrective action(s) still open");

        let error = open_actions_conflict(1);
        assert_eq!(error.to_string(), "1 corrective action(s) still open");
    }

    #[test]
    fn the_machine_forks_after_submission() {
        let next = IncidentStatus::Submitted.successors();
        assert!(next.contains(&IncidentStatus::Investigating));
        assert!(next.contains(&IncidentStatus::SupervisorApproved));
        // rejection edge
        assert!(next.contains(&IncidentStatus::Draft));
    }

    #[test]
    fn closed_is_terminal() {
        assert!(IncidentStatus::Closed.successors().is_empty());
    }

    #[test]
    fn every_edge_is_forward_except_rejection() {
        let all = [
            IncidentStatus::Draft,
            IncidentStatus::Submitted,
            IncidentStatus::SupervisorApproved,
            IncidentStatus::Investigating,
            IncidentStatus::HodAssigned,
            IncidentStatus::QiFinalReview,
            IncidentStatus::QiFinalActions,
            IncidentStatus::Closed,
        ];
        for status in all {
            for next in status.successors() {
                if status == IncidentStatus::Submitted && *next == IncidentStatus::Draft {
                    continue;
                }
                assert_ne!(*next, IncidentStatus::Draft, "no other edge may re-enter draft");
                assert_ne!(*next, status, "no self loops");
            }
        }
    }

    #[test]
    fn both_branches_reach_closed() {
        assert_eq!(
            IncidentStatus::QiFinalReview.successors(),
            &[IncidentStatus::Closed]
        );
        assert_eq!(
            IncidentStatus::QiFinalActions.successors(),
            &[IncidentStatus::Closed]
        );
    }

    #[test]
    fn status_labels_round_trip_through_serde() {
        for status in [
            IncidentStatus::Draft,
            IncidentStatus::SupervisorApproved,
            IncidentStatus::QiFinalActions,
        ] {
            let encoded = to_bson::<IncidentStatus>(&status).unwrap();
            assert_eq!(encoded.as_str().unwrap(), status.as_str());
        }
    }

    #[test]
    fn submitting_a_request_stamps_submitted_at() {
        let request = IncidentRequest {
            patient_name: None,
            patient_mrn: Some("MRN-1009".to_string()),
            department: "Pharmacy".to_string(),
            category: "medication".to_string(),
            subcategory: "wrong_dose".to_string(),
            severity: IncidentSeverity::Moderate,
            occurred_at: DateTime::now(),
            description: "dose mismatch at dispensing".to_string(),
            witness_account: None,
            medical_assessment: None,
            submit: true,
        };
        let incident = request.into_incident(ObjectId::new());
        assert_eq!(incident.status, IncidentStatus::Submitted);
        assert!(incident.submitted_at.is_some());
    }

    #[test]
    fn a_draft_request_stays_unstamped() {
        let request = IncidentRequest {
            patient_name: None,
            patient_mrn: None,
            department: "ER".to_string(),
            category: "fall".to_string(),
            subcategory: "bed".to_string(),
            severity: IncidentSeverity::Minor,
            occurred_at: DateTime::now(),
            description: "patient slipped near bed 4".to_string(),
            witness_account: None,
            medical_assessment: None,
            submit: false,
        };
        let incident = request.into_incident(ObjectId::new());
        assert_eq!(incident.status, IncidentStatus::Draft);
        assert!(incident.submitted_at.is_none());
    }
}
