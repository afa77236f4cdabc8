//! app.rs
use crate::handlers::blast_handler;
use actix_web::web;

pub fn init_app(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api").service(
            web::scope("/blast")
                .route("", web::post().to(blast_handler::send_blast_endpoint))
                .route(
                    "/{campaign_id}",
                    web::get().to(blast_handler::campaign_status_endpoint),
                ),
        ),
    );
}
