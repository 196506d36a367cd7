use crate::{
    database::{get_client, get_db},
    error::Error,
    models::incident::{Incident, IncidentStatus},
};
use mongodb::{
    bson::{doc, oid::ObjectId, to_bson, Bson, DateTime},
    options::{FindOneAndUpdateOptions, ReturnDocument, UpdateOptions},
    Collection,
};
use serde::{Deserialize, Serialize};

fn duplicate_key(error: &mongodb::error::Error) -> bool {
    matches!(
        *error.kind,
        mongodb::error::ErrorKind::Write(mongodb::error::WriteFailure::WriteError(
            ref write_error
        )) if write_error.code == 11000
    )
}

/// One investigation per incident, opened by QI once the incident is in the
/// investigating stage.
#[derive(Debug, Deserialize, Serialize)]
pub struct Investigation {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,
    pub incident_id: ObjectId,
    pub investigator_ids: Vec<ObjectId>,
    pub created_by: ObjectId,
    pub created_at: DateTime,
    pub findings: Option<String>,
    pub problem: Option<String>,
    pub root_cause: Option<String>,
    pub submitted_at: Option<DateTime>,
    /// Absent when the findings arrived over a shared-access token.
    pub submitted_by: Option<ObjectId>,
}

#[derive(Debug, Deserialize)]
pub struct InvestigationRequest {
    pub incident_id: ObjectId,
    pub investigator_ids: Vec<ObjectId>,
}

#[derive(Debug, Deserialize)]
pub struct InvestigationSubmitRequest {
    pub findings: String,
    pub problem: Option<String>,
    pub root_cause: Option<String>,
    pub token: Option<String>,
}

impl Investigation {
    fn collection() -> Collection<Investigation> {
        get_db().collection::<Investigation>("investigations")
    }

    pub fn is_listed_investigator(&self, user_id: &ObjectId) -> bool {
        self.investigator_ids.iter().any(|listed| listed == user_id)
    }

    /// Upsert keyed on the incident, backed by the unique index on
    /// `incident_id`: when two QI users create at the same moment, one wins
    /// the upsert and the other surfaces as a duplicate key.
    pub async fn create(request: InvestigationRequest, creator: ObjectId) -> Result<ObjectId, Error> {
        let collection = Self::collection();

        let _id = ObjectId::new();
        let investigation = Investigation {
            _id: Some(_id),
            incident_id: request.incident_id,
            investigator_ids: request.investigator_ids,
            created_by: creator,
            created_at: DateTime::now(),
            findings: None,
            problem: None,
            root_cause: None,
            submitted_at: None,
            submitted_by: None,
        };

        let options = UpdateOptions::builder().upsert(true).build();
        let result = match collection
            .update_one(
                doc! { "incident_id": request.incident_id },
                doc! { "$setOnInsert": to_bson::<Investigation>(&investigation).unwrap() },
                options,
            )
            .await
        {
            Ok(result) => result,
            Err(error) if duplicate_key(&error) => {
                return Err(Error::conflict(
                    "INVESTIGATION_EXISTS",
                    "incident already has an investigation",
                ))
            }
            Err(_) => return Err(Error::database("INSERTING_FAILED")),
        };

        match result.upserted_id {
            Some(upserted) => Ok(upserted.as_object_id().unwrap()),
            None => Err(Error::conflict(
                "INVESTIGATION_EXISTS",
                "incident already has an investigation",
            )),
        }
    }

    pub async fn add_investigators(
        _id: &ObjectId,
        investigator_ids: &[ObjectId],
    ) -> Result<(), Error> {
        Self::collection()
            .update_one(
                doc! { "_id": _id },
                doc! { "$addToSet": {
                    "investigator_ids": { "$each": to_bson::<&[ObjectId]>(&investigator_ids).unwrap() }
                }},
                None,
            )
            .await
            .map_err(|_| Error::database("UPDATE_FAILED"))?;
        Ok(())
    }

    pub async fn find_by_id(_id: &ObjectId) -> Result<Option<Investigation>, Error> {
        Self::collection()
            .find_one(doc! { "_id": _id }, None)
            .await
            .map_err(|_| Error::database("QUERY_FAILED"))
    }

    pub async fn find_by_incident(incident_id: &ObjectId) -> Result<Option<Investigation>, Error> {
        Self::collection()
            .find_one(doc! { "incident_id": incident_id }, None)
            .await
            .map_err(|_| Error::database("QUERY_FAILED"))
    }

    /// Submission writes the findings and cascades the incident to
    /// `qi_final_actions` in one transaction; neither write lands without the
    /// other.
    pub async fn submit(
        _id: &ObjectId,
        submitted_by: Option<ObjectId>,
        request: &InvestigationSubmitRequest,
    ) -> Result<Investigation, Error> {
        let client = get_client();
        let mut session = client
            .start_session(None)
            .await
            .map_err(|_| Error::database("SESSION_FAILED"))?;
        session
            .start_transaction(None)
            .await
            .map_err(|_| Error::database("SESSION_FAILED"))?;

        let result = Self::submit_in_session(_id, submitted_by, request, &mut session).await;
        match result {
            Ok(investigation) => {
                session
                    .commit_transaction()
                    .await
                    .map_err(|error| Error::from_write(error, "COMMIT_FAILED"))?;
                tracing::info!(investigation = %_id, "investigation submitted");
                Ok(investigation)
            }
            Err(error) => {
                let _ = session.abort_transaction().await;
                Err(error)
            }
        }
    }

    async fn submit_in_session(
        _id: &ObjectId,
        submitted_by: Option<ObjectId>,
        request: &InvestigationSubmitRequest,
        session: &mut mongodb::ClientSession,
    ) -> Result<Investigation, Error> {
        let collection = Self::collection();

        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();
        let investigation = collection
            .find_one_and_update_with_session(
                doc! { "_id": _id, "submitted_at": Bson::Null },
                doc! { "$set": {
                    "findings": &request.findings,
                    "problem": to_bson::<Option<String>>(&request.problem).unwrap(),
                    "root_cause": to_bson::<Option<String>>(&request.root_cause).unwrap(),
                    "submitted_at": DateTime::now(),
                    "submitted_by": to_bson::<Option<ObjectId>>(&submitted_by).unwrap(),
                }},
                options,
                session,
            )
            .await
            .map_err(|error| Error::from_write(error, "UPDATE_FAILED"))?;

        let investigation = match investigation {
            Some(investigation) => investigation,
            None => {
                // re-read on the transaction's own snapshot
                return match collection
                    .find_one_with_session(doc! { "_id": _id }, None, session)
                    .await
                    .map_err(|_| Error::database("QUERY_FAILED"))?
                {
                    Some(_) => Err(Error::conflict(
                        "ALREADY_SUBMITTED",
                        "investigation findings were already submitted",
                    )),
                    None => Err(Error::not_found("INVESTIGATION_NOT_FOUND")),
                };
            }
        };

        let incidents: Collection<Incident> = get_db().collection::<Incident>("incidents");
        let cascade = incidents
            .update_one_with_session(
                doc! {
                    "_id": investigation.incident_id,
                    "status": IncidentStatus::Investigating.as_str(),
                },
                doc! { "$set": { "status": IncidentStatus::QiFinalActions.as_str() } },
                None,
                session,
            )
            .await
            .map_err(|error| Error::from_write(error, "UPDATE_FAILED"))?;

        if cascade.modified_count == 0 {
            return Err(Error::conflict(
                "STATUS_CONFLICT",
                "incident is no longer in the investigating stage",
            ));
        }

        Ok(investigation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn investigation(investigator_ids: Vec<ObjectId>) -> Investigation {
        Investigation {
            _id: Some(ObjectId::new()),
            incident_id: ObjectId::new(),
            investigator_ids,
            created_by: ObjectId::new(),
            created_at: DateTime::now(),
            findings: None,
            problem: None,
            root_cause: None,
            submitted_at: None,
            submitted_by: None,
        }
    }

    #[test]
    fn listed_investigators_are_recognised() {
        let member = ObjectId::new();
        let outsider = ObjectId::new();
        let investigation = investigation(vec![member, ObjectId::new()]);
        assert!(investigation.is_listed_investigator(&member));
        assert!(!investigation.is_listed_investigator(&outsider));
    }

    #[test]
    fn an_empty_panel_lists_no_one() {
        let investigation = investigation(Vec::new());
        assert!(!investigation.is_listed_investigator(&ObjectId::new()));
    }
}
