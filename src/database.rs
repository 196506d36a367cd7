use mongodb::{
    bson::{doc, Document},
    options::IndexOptions,
    Client, Database, IndexModel,
};

static mut CLIENT: Option<Client> = None;

pub async fn connect(uri: String) {
    let client = Client::with_uri_str(uri)
        .await
        .expect("Failed to connect to database");
    unsafe {
        CLIENT = Some(client);
    }
    ensure_indexes().await;
}

pub fn get_client() -> Client {
    unsafe {
        let client = &CLIENT;
        client.clone().expect("Database is not available yet!")
    }
}

pub fn get_db() -> Database {
    get_client().database("ovr")
}

/// One investigation per incident is enforced by the server, not by the
/// application's read-then-write.
pub(crate) fn investigation_incident_index() -> IndexModel {
    IndexModel::builder()
        .keys(doc! { "incident_id": 1 })
        .options(IndexOptions::builder().unique(true).build())
        .build()
}

async fn ensure_indexes() {
    get_db()
        .collection::<Document>("investigations")
        .create_index(investigation_incident_index(), None)
        .await
        .expect("Failed to create indexes");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn investigations_are_unique_per_incident() {
        let index = investigation_incident_index();
        assert_eq!(index.keys, doc! { "incident_id": 1 });
        assert_eq!(index.options.and_then(|options| options.unique), Some(true));
    }
}
