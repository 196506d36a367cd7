use crate::{
    database::{get_client, get_db},
    error::Error,
    models::incident::{ActorStamp, Incident, IncidentStatus},
};
use futures::StreamExt;
use mongodb::{
    bson::{doc, oid::ObjectId, to_bson, DateTime},
    options::{FindOneAndUpdateOptions, ReturnDocument},
    Collection,
};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CorrectiveActionStatus {
    Open,
    Closed,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ChecklistItem {
    pub label: String,
    pub done: bool,
}

/// Remediation task tied to an incident. Open actions block incident
/// closure; the count is always taken fresh at close time.
#[derive(Debug, Deserialize, Serialize)]
pub struct CorrectiveAction {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,
    pub incident_id: ObjectId,
    pub title: String,
    pub description: String,
    pub due_date: Option<DateTime>,
    pub assigned_to: Vec<ObjectId>,
    pub checklist: Vec<ChecklistItem>,
    pub status: CorrectiveActionStatus,
    pub created_by: ObjectId,
    pub created_at: DateTime,
    pub closed: Option<ActorStamp>,
}

#[derive(Debug, Deserialize)]
pub struct CorrectiveActionRequest {
    pub incident_id: ObjectId,
    pub title: String,
    pub description: String,
    pub due_date: Option<DateTime>,
    pub assigned_to: Option<Vec<ObjectId>>,
    #[serde(default)]
    pub checklist: Vec<ChecklistItem>,
}

#[derive(Debug, Deserialize)]
pub struct CorrectiveActionUpdateRequest {
    pub description: Option<String>,
    pub due_date: Option<DateTime>,
    pub checklist: Option<Vec<ChecklistItem>>,
    pub token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CorrectiveActionQueryParams {
    pub incident_id: ObjectId,
}

impl CorrectiveAction {
    fn collection() -> Collection<CorrectiveAction> {
        get_db().collection::<CorrectiveAction>("corrective-actions")
    }

    /// Creation writes the parent incident too: a close committing at the
    /// same moment conflicts on the incident document instead of skewing
    /// past the open-action count.
    pub async fn save(&mut self) -> Result<ObjectId, Error> {
        self._id = Some(ObjectId::new());

        let client = get_client();
        let mut session = client
            .start_session(None)
            .await
            .map_err(|_| Error::database("SESSION_FAILED"))?;
        session
            .start_transaction(None)
            .await
            .map_err(|_| Error::database("SESSION_FAILED"))?;

        let result = self.save_in_session(&mut session).await;
        match result {
            Ok(_id) => {
                session
                    .commit_transaction()
                    .await
                    .map_err(|error| Error::from_write(error, "COMMIT_FAILED"))?;
                Ok(_id)
            }
            Err(error) => {
                let _ = session.abort_transaction().await;
                Err(error)
            }
        }
    }

    async fn save_in_session(
        &self,
        session: &mut mongodb::ClientSession,
    ) -> Result<ObjectId, Error> {
        let incidents: Collection<Incident> = get_db().collection::<Incident>("incidents");

        let gate = incidents
            .update_one_with_session(
                doc! {
                    "_id": self.incident_id,
                    "status": { "$ne": IncidentStatus::Closed.as_str() },
                },
                doc! { "$inc": { "revision": 1_i64 } },
                None,
                session,
            )
            .await
            .map_err(|error| Error::from_write(error, "UPDATE_FAILED"))?;
        if gate.matched_count == 0 {
            return match incidents
                .find_one_with_session(doc! { "_id": self.incident_id }, None, session)
                .await
                .map_err(|_| Error::database("QUERY_FAILED"))?
            {
                Some(_) => Err(Error::conflict(
                    "INCIDENT_CLOSED",
                    "corrective actions cannot be added to a closed incident",
                )),
                None => Err(Error::not_found("INCIDENT_NOT_FOUND")),
            };
        }

        Self::collection()
            .insert_one_with_session(&*self, None, session)
            .await
            .map_err(|error| Error::from_write(error, "INSERTING_FAILED"))
            .map(|result| result.inserted_id.as_object_id().unwrap())
    }

    pub async fn find_by_id(_id: &ObjectId) -> Result<Option<CorrectiveAction>, Error> {
        Self::collection()
            .find_one(doc! { "_id": _id }, None)
            .await
            .map_err(|_| Error::database("QUERY_FAILED"))
    }

    pub async fn find_by_incident(incident_id: &ObjectId) -> Result<Vec<CorrectiveAction>, Error> {
        let mut cursor = Self::collection()
            .find(doc! { "incident_id": incident_id }, None)
            .await
            .map_err(|_| Error::database("QUERY_FAILED"))?;
        let mut actions: Vec<CorrectiveAction> = Vec::new();
        while let Some(Ok(action)) = cursor.next().await {
            actions.push(action);
        }
        Ok(actions)
    }

    /// Computed fresh inside the caller's transaction; nothing caches this.
    pub async fn count_open(
        incident_id: &ObjectId,
        session: &mut mongodb::ClientSession,
    ) -> Result<u64, Error> {
        Self::collection()
            .count_documents_with_session(
                doc! {
                    "incident_id": incident_id,
                    "status": CorrectiveActionStatus::Open.as_str(),
                },
                None,
                session,
            )
            .await
            .map_err(|_| Error::database("QUERY_FAILED"))
    }

    pub async fn update(
        _id: &ObjectId,
        request: &CorrectiveActionUpdateRequest,
    ) -> Result<CorrectiveAction, Error> {
        let collection = Self::collection();

        let mut changes = doc! {};
        if let Some(description) = &request.description {
            changes.insert("description", description);
        }
        if let Some(due_date) = &request.due_date {
            changes.insert("due_date", *due_date);
        }
        if let Some(checklist) = &request.checklist {
            changes.insert(
                "checklist",
                to_bson::<Vec<ChecklistItem>>(checklist).unwrap(),
            );
        }
        if changes.is_empty() {
            return Err(Error::validation("EMPTY_UPDATE", "nothing to update"));
        }

        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();
        let result = collection
            .find_one_and_update(
                doc! { "_id": _id, "status": CorrectiveActionStatus::Open.as_str() },
                doc! { "$set": changes },
                options,
            )
            .await
            .map_err(|_| Error::database("UPDATE_FAILED"))?;

        match result {
            Some(action) => Ok(action),
            None => match Self::find_by_id(_id).await? {
                Some(_) => Err(Error::conflict(
                    "ACTION_CLOSED",
                    "corrective action is already closed",
                )),
                None => Err(Error::not_found("ACTION_NOT_FOUND")),
            },
        }
    }

    pub async fn close(_id: &ObjectId, actor: ObjectId) -> Result<CorrectiveAction, Error> {
        let collection = Self::collection();

        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();
        let result = collection
            .find_one_and_update(
                doc! { "_id": _id, "status": CorrectiveActionStatus::Open.as_str() },
                doc! { "$set": {
                    "status": CorrectiveActionStatus::Closed.as_str(),
                    "closed": to_bson::<ActorStamp>(&ActorStamp::now(actor)).unwrap(),
                }},
                options,
            )
            .await
            .map_err(|_| Error::database("UPDATE_FAILED"))?;

        match result {
            Some(action) => {
                tracing::info!(action = %_id, "corrective action closed");
                Ok(action)
            }
            None => match Self::find_by_id(_id).await? {
                Some(_) => Err(Error::conflict(
                    "ACTION_CLOSED",
                    "corrective action is already closed",
                )),
                None => Err(Error::not_found("ACTION_NOT_FOUND")),
            },
        }
    }
}

impl CorrectiveActionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Closed => "closed",
        }
    }
}

impl CorrectiveActionRequest {
    /// An unassigned action lands on whoever created it.
    pub fn into_action(self, creator: ObjectId) -> CorrectiveAction {
        let assigned_to = match self.assigned_to {
            Some(assigned) if !assigned.is_empty() => assigned,
            _ => vec![creator],
        };
        CorrectiveAction {
            _id: None,
            incident_id: self.incident_id,
            title: self.title,
            description: self.description,
            due_date: self.due_date,
            assigned_to,
            checklist: self.checklist,
            status: CorrectiveActionStatus::Open,
            created_by: creator,
            created_at: DateTime::now(),
            closed: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(assigned_to: Option<Vec<ObjectId>>) -> CorrectiveActionRequest {
        CorrectiveActionRequest {
            incident_id: ObjectId::new(),
            title: "Revise double-check procedure".to_string(),
            description: "Update the dispensing double-check SOP".to_string(),
            due_date: None,
            assigned_to,
            checklist: Vec::new(),
        }
    }

    #[test]
    fn unassigned_actions_default_to_their_creator() {
        let creator = ObjectId::new();
        let action = request(None).into_action(creator);
        assert_eq!(action.assigned_to, vec![creator]);

        let action = request(Some(Vec::new())).into_action(creator);
        assert_eq!(action.assigned_to, vec![creator]);
    }

    #[test]
    fn explicit_assignees_are_kept() {
        let creator = ObjectId::new();
        let assignee = ObjectId::new();
        let action = request(Some(vec![assignee])).into_action(creator);
        assert_eq!(action.assigned_to, vec![assignee]);
    }

    #[test]
    fn new_actions_start_open() {
        let action = request(None).into_action(ObjectId::new());
        assert_eq!(action.status, CorrectiveActionStatus::Open);
        assert!(action.closed.is_none());
    }
}
