//! handlers/blast_handler.rs
//! Endpoints de envío masivo. Sólo validan y delegan en BlastService.

use actix_web::{web, HttpResponse};
use serde_json::json;

use crate::{
    errors::SubmissionError,
    models::blast_model::{BlastSubmission, CampaignStatusResponse},
    services::{blast_service::BlastService, status_service::SqliteStatusStore},
};

/// POST /api/blast
pub async fn send_blast_endpoint(
    body: String,
    blast_service: web::Data<BlastService>,
    status_store: web::Data<SqliteStatusStore>,
) -> HttpResponse {
    let submission = match BlastSubmission::parse(&body) {
        Ok(submission) => submission,
        Err(e) => {
            log::warn!("(send_blast_endpoint) Payload inválido: {}", e);
            return HttpResponse::BadRequest().json(json!({
                "status": false,
                "message": "Invalid payload"
            }));
        }
    };

    if submission.campaign_id().is_none() {
        return HttpResponse::BadRequest().json(json!({
            "status": false,
            "message": SubmissionError::MissingCampaignId.to_string()
        }));
    }

    if !submission.has_items() {
        return HttpResponse::Ok().json(json!({
            "status": "in_progress",
            "queued": false,
            "processed": 0
        }));
    }

    let batch = match submission.into_batch() {
        Ok(batch) => batch,
        Err(e) => {
            return HttpResponse::BadRequest().json(json!({
                "status": false,
                "message": e.to_string()
            }))
        }
    };

    if !blast_service.has_room(&batch.campaign_id) {
        log::warn!(
            "(send_blast_endpoint) Campaña {} sin lugar en cola; no se registra nada.",
            batch.campaign_id
        );
        return HttpResponse::TooManyRequests().json(json!({
            "status": false,
            "message": SubmissionError::QueueFull(batch.campaign_id).to_string()
        }));
    }

    // Filas 'pending' para los destinatarios nuevos; las ya resueltas no cambian
    match status_store
        .seed_pending(&batch.campaign_id, batch.receivers())
        .await
    {
        Ok(inserted) => log::info!(
            "(send_blast_endpoint) Campaña {}: {} destinatarios nuevos registrados.",
            batch.campaign_id,
            inserted
        ),
        Err(e) => {
            log::error!(
                "(send_blast_endpoint) Error registrando campaña {}: {:?}",
                batch.campaign_id,
                e
            );
            return HttpResponse::InternalServerError().json(json!({
                "status": false,
                "message": format!("Status store error: {}", e)
            }));
        }
    }

    match blast_service.submit(batch) {
        Ok(ack) => HttpResponse::Ok().json(json!({
            "status": "in_progress",
            "queued": ack.queued
        })),
        Err(e @ SubmissionError::QueueFull(_)) => HttpResponse::TooManyRequests().json(json!({
            "status": false,
            "message": e.to_string()
        })),
        Err(e) => HttpResponse::BadRequest().json(json!({
            "status": false,
            "message": e.to_string()
        })),
    }
}

/// GET /api/blast/{campaign_id}
pub async fn campaign_status_endpoint(
    status_store: web::Data<SqliteStatusStore>,
    path: web::Path<String>,
) -> HttpResponse {
    let campaign_id = path.into_inner();

    let summary = status_store.campaign_summary(&campaign_id).await;
    let items = status_store.list_campaign(&campaign_id).await;

    match (summary, items) {
        (Ok(summary), Ok(items)) => HttpResponse::Ok().json(CampaignStatusResponse {
            campaign_id,
            summary,
            items,
        }),
        (Err(e), _) | (_, Err(e)) => {
            log::error!(
                "(campaign_status_endpoint) Error consultando campaña {}: {:?}",
                campaign_id,
                e
            );
            HttpResponse::InternalServerError().json(json!({
                "status": false,
                "error": e.to_string()
            }))
        }
    }
}
