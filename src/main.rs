use actix_cors::Cors;
use actix_web::{App, HttpServer};
use std::io;
use tracing_subscriber::EnvFilter;

mod database;
mod error;
mod models;
mod policy;
mod routes;

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let db_uri: String =
        std::env::var("MONGODB_URI").unwrap_or_else(|_| String::from("mongodb://localhost:27017"));
    let bind_address: String =
        std::env::var("OVR_BIND_ADDRESS").unwrap_or_else(|_| String::from("127.0.0.1:8000"));

    models::user::load_keys();
    database::connect(db_uri).await;

    tracing::info!(address = %bind_address, "starting OVR server");

    HttpServer::new(move || {
        App::new()
            .wrap(Cors::permissive())
            .wrap(models::user::UserAuthenticationMiddlewareFactory)
            .service(routes::user::get_users)
            .service(routes::user::get_user)
            .service(routes::user::create_user)
            .service(routes::user::login)
            .service(routes::user::refresh)
            .service(routes::incident::create_incident)
            .service(routes::incident::get_incidents)
            .service(routes::incident::get_drafts)
            .service(routes::incident::get_incident)
            .service(routes::incident::update_incident)
            .service(routes::incident::delete_incident)
            .service(routes::incident::submit_incident)
            .service(routes::incident::qi_review)
            .service(routes::incident::supervisor_approve)
            .service(routes::incident::qi_assign_hod)
            .service(routes::incident::hod_submit)
            .service(routes::incident::assign_investigator)
            .service(routes::incident::close_incident)
            .service(routes::investigation::create_investigation)
            .service(routes::investigation::get_investigation)
            .service(routes::investigation::submit_investigation)
            .service(routes::corrective_action::create_action)
            .service(routes::corrective_action::get_actions)
            .service(routes::corrective_action::update_action)
            .service(routes::corrective_action::close_action)
            .service(routes::shared_access::create_shared_access)
            .service(routes::shared_access::create_shared_access_bulk)
            .service(routes::shared_access::get_shared_access)
            .service(routes::shared_access::revoke_shared_access)
            .service(routes::shared_access::accept_shared_access)
    })
    .bind(bind_address)?
    .run()
    .await
}
