//! Background job queue and the worker that drains it

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use harbor_core::{Job, JobError, JobMessage, JobPublisher};

use crate::documents::DocumentService;

/// Publishing side of the in-process job queue
#[derive(Clone)]
pub struct JobQueue {
    sender: mpsc::Sender<JobMessage>,
}

impl JobQueue {
    /// Create a queue and the receiver a [`DocumentWorker`] drains
    pub fn channel(buffer_size: usize) -> (Self, mpsc::Receiver<JobMessage>) {
        let (sender, receiver) = mpsc::channel(buffer_size);
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl JobPublisher for JobQueue {
    async fn publish(&self, job: Job) -> Result<(), JobError> {
        let message = JobMessage::new(job);
        debug!(job_id = %message.id, kind = message.job.kind(), "Queueing job");
        self.sender.try_send(message).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => JobError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => JobError::QueueClosed,
        })
    }
}

/// Runs queued jobs one at a time until every publisher is dropped
pub struct DocumentWorker {
    service: DocumentService,
    receiver: mpsc::Receiver<JobMessage>,
}

impl DocumentWorker {
    pub fn new(service: DocumentService, receiver: mpsc::Receiver<JobMessage>) -> Self {
        Self { service, receiver }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    pub async fn run(mut self) {
        info!("Starting document worker");

        while let Some(message) = self.receiver.recv().await {
            self.handle(message).await;
        }

        info!("Document worker stopped");
    }

    async fn handle(&self, message: JobMessage) {
        let document_id = message.job.document_id();
        let kind = message.job.kind();

        let result = match message.job {
            Job::RecomputeStatus { document_id } => self
                .service
                .recompute_status(document_id)
                .await
                .map(|change| {
                    debug!(document_id = %document_id, changed = change.changed, "Status recomputed")
                }),
            Job::ReprocessDocument { document_id } => {
                self.service.reprocess_document(document_id).await.map(|_| ())
            }
        };

        match result {
            Ok(()) => debug!(job_id = %message.id, kind, "Job finished"),
            Err(e) if e.status_code() == 404 => {
                warn!(job_id = %message.id, kind, document_id = %document_id, "Job target no longer exists")
            }
            Err(e) => error!(
                job_id = %message.id,
                kind,
                document_id = %document_id,
                error = %e,
                "Job failed"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use harbor_core::DocumentId;

    #[test]
    fn test_publish_reports_full_and_closed() {
        let (queue, receiver) = JobQueue::channel(1);
        let job = Job::RecomputeStatus {
            document_id: DocumentId::new(),
        };

        tokio_test::assert_ok!(tokio_test::block_on(queue.publish(job.clone())));
        assert_eq!(
            tokio_test::block_on(queue.publish(job.clone())),
            Err(JobError::QueueFull)
        );

        drop(receiver);
        assert_eq!(
            tokio_test::block_on(queue.publish(job)),
            Err(JobError::QueueClosed)
        );
    }

    #[tokio::test]
    async fn test_messages_arrive_in_order() {
        let (queue, mut receiver) = JobQueue::channel(8);
        let first = DocumentId::new();
        let second = DocumentId::new();

        queue
            .publish(Job::RecomputeStatus { document_id: first })
            .await
            .unwrap();
        queue
            .publish(Job::ReprocessDocument { document_id: second })
            .await
            .unwrap();

        assert_eq!(receiver.recv().await.unwrap().job.document_id(), first);
        assert_eq!(receiver.recv().await.unwrap().job.document_id(), second);
    }
}
