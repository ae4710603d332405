use super::messages::CoordinatorMessage;
use crate::pipeline::Pipeline;
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};

pub struct JobCoordinator {
    inbox: mpsc::Receiver<CoordinatorMessage>,
    pipeline: Pipeline,
    slots: Arc<Semaphore>,
}

impl JobCoordinator {
    pub fn spawn(
        inbox: mpsc::Receiver<CoordinatorMessage>,
        pipeline: Pipeline,
        max_running: usize,
    ) {
        let actor = Self {
            inbox,
            pipeline,
            slots: Arc::new(Semaphore::new(max_running.max(1))),
        };
        tokio::spawn(async move { actor.run().await });
    }

    async fn run(mut self) {
        use self::CoordinatorMessage::*;
        loop {
            // hold a slot before taking the next job, so waiting jobs stay in the bounded inbox
            let permit = match self.slots.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => return,
            };
            let msg = match self.inbox.recv().await {
                Some(msg) => msg,
                None => return, // every handle dropped
            };
            match msg {
                Execute { job, response } => {
                    let pipeline = self.pipeline.clone();
                    // runs to completion even if the caller stopped waiting
                    tokio::spawn(async move {
                        let report = pipeline.execute(job).await;
                        drop(permit);
                        let _ = response.send(report);
                    });
                }
            }
        }
    }
}
