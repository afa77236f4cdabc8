//! tests/queue_tests.rs
//! Pruebas del scheduler por campaña.

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};
    use std::time::{Duration, Instant};

    use actix_rt::test;
    use anyhow::anyhow;
    use tokio::sync::{oneshot, Barrier};

    use crate::errors::SubmissionError;
    use crate::services::queue_service::{CampaignScheduler, CampaignTask};
    use crate::tests::support::wait_until;

    type Spans = Arc<Mutex<Vec<(u8, Instant, Instant)>>>;

    fn timed_task(tag: u8, spans: Spans, done: oneshot::Sender<()>) -> CampaignTask {
        Box::pin(async move {
            let start = Instant::now();
            tokio::time::sleep(Duration::from_millis(60)).await;
            spans.lock().unwrap().push((tag, start, Instant::now()));
            let _ = done.send(());
            Ok(())
        })
    }

    #[test]
    async fn test_same_campaign_never_overlaps() {
        let scheduler = CampaignScheduler::new(8);
        let spans: Spans = Arc::new(Mutex::new(Vec::new()));
        let (tx1, rx1) = oneshot::channel();
        let (tx2, rx2) = oneshot::channel();

        let first = scheduler
            .schedule("camp-1", timed_task(1, spans.clone(), tx1))
            .unwrap();
        let second = scheduler
            .schedule("camp-1", timed_task(2, spans.clone(), tx2))
            .unwrap();

        assert!(first, "El primer lote debía arrancar de inmediato");
        assert!(!second, "El segundo lote debía quedar encolado");

        rx1.await.unwrap();
        rx2.await.unwrap();

        let spans = spans.lock().unwrap();
        assert_eq!(spans.len(), 2);
        let (tag_a, _, end_a) = spans[0];
        let (tag_b, start_b, _) = spans[1];
        assert_eq!((tag_a, tag_b), (1, 2), "Orden de ejecución incorrecto");
        assert!(start_b >= end_a, "Los lotes de la misma campaña se solaparon");
    }

    #[test]
    async fn test_distinct_campaigns_run_concurrently() {
        let scheduler = CampaignScheduler::new(8);
        // Si se serializaran, ninguno pasaría la barrera
        let barrier = Arc::new(Barrier::new(2));
        let (tx_a, rx_a) = oneshot::channel();
        let (tx_b, rx_b) = oneshot::channel();

        for (id, done) in [("camp-a", tx_a), ("camp-b", tx_b)] {
            let barrier = barrier.clone();
            let started = scheduler
                .schedule(
                    id,
                    Box::pin(async move {
                        barrier.wait().await;
                        let _ = done.send(());
                        Ok(())
                    }),
                )
                .unwrap();
            assert!(started);
        }

        let both = tokio::time::timeout(Duration::from_secs(2), async {
            rx_a.await.unwrap();
            rx_b.await.unwrap();
        })
        .await;
        assert!(both.is_ok(), "Campañas distintas no corrieron en paralelo");
    }

    #[test]
    async fn test_failed_task_does_not_block_next() {
        let scheduler = CampaignScheduler::new(8);
        let (tx, rx) = oneshot::channel();

        scheduler
            .schedule("camp-err", Box::pin(async { Err(anyhow!("boom")) }))
            .unwrap();
        scheduler
            .schedule(
                "camp-err",
                Box::pin(async move {
                    let _ = tx.send(());
                    Ok(())
                }),
            )
            .unwrap();

        let res = tokio::time::timeout(Duration::from_secs(2), rx).await;
        assert!(res.is_ok(), "El lote posterior a un error no se ejecutó");
    }

    #[test]
    async fn test_panicking_task_does_not_block_next() {
        let scheduler = CampaignScheduler::new(8);
        let (tx, rx) = oneshot::channel();

        scheduler
            .schedule(
                "camp-panic",
                Box::pin(async {
                    panic!("lote roto");
                }),
            )
            .unwrap();
        scheduler
            .schedule(
                "camp-panic",
                Box::pin(async move {
                    let _ = tx.send(());
                    Ok(())
                }),
            )
            .unwrap();

        let res = tokio::time::timeout(Duration::from_secs(2), rx).await;
        assert!(res.is_ok(), "El lote posterior a un panic no se ejecutó");
    }

    #[test]
    async fn test_worker_entry_removed_after_drain() {
        let scheduler = CampaignScheduler::new(8);
        let (tx, rx) = oneshot::channel();

        scheduler
            .schedule(
                "camp-drain",
                Box::pin(async move {
                    let _ = tx.send(());
                    Ok(())
                }),
            )
            .unwrap();
        assert!(scheduler.is_active("camp-drain"));

        rx.await.unwrap();
        let check = scheduler.clone();
        assert!(
            wait_until(move || !check.is_active("camp-drain"), Duration::from_secs(2)).await,
            "La entrada de la campaña no se liberó"
        );
        assert_eq!(scheduler.active_campaigns(), 0);

        // Sin trabajo previo, un nuevo lote vuelve a arrancar de inmediato
        let again = scheduler
            .schedule("camp-drain", Box::pin(async { Ok(()) }))
            .unwrap();
        assert!(again);
    }

    #[test]
    async fn test_full_queue_rejects_submission() {
        let scheduler = CampaignScheduler::new(1);
        let (release_tx, release_rx) = oneshot::channel::<()>();

        scheduler
            .schedule(
                "camp-full",
                Box::pin(async move {
                    let _ = release_rx.await;
                    Ok(())
                }),
            )
            .unwrap();

        // Deja que el worker tome el primer lote y quede bloqueado
        tokio::time::sleep(Duration::from_millis(30)).await;

        let queued = scheduler
            .schedule("camp-full", Box::pin(async { Ok(()) }))
            .unwrap();
        assert!(!queued);
        assert!(!scheduler.has_room("camp-full"));
        assert!(scheduler.has_room("otra-campaña"));

        let rejected = scheduler.schedule("camp-full", Box::pin(async { Ok(()) }));
        assert!(matches!(rejected, Err(SubmissionError::QueueFull(id)) if id == "camp-full"));

        let _ = release_tx.send(());
        let check = scheduler.clone();
        assert!(wait_until(move || !check.is_active("camp-full"), Duration::from_secs(2)).await);
    }
}
