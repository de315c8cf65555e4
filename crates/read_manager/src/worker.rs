use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, Sender, bounded};
use engine::{ChannelError, FrontendMessageSender};
use protocol::{TileReadEndMessage, TileReadStartMessage};

use crate::builder::{BuildOutput, CancelToken, TileBuildError, TileBuildRequest, TileBuilder};

#[derive(Debug, Clone)]
pub(crate) struct ReadJob {
    pub request: TileBuildRequest,
    pub cancel: CancelToken,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum JobOutcome {
    /// Cancelled before it started. Nothing was sent.
    Skipped,
    Completed { flushed: usize },
    Cancelled { flushed: usize },
    Failed { flushed: usize },
}

/// Fixed set of named worker threads pulling build jobs from one queue.
pub struct ReadWorkerPool {
    job_sender: Option<Sender<ReadJob>>,
    workers: Vec<JoinHandle<()>>,
}

impl ReadWorkerPool {
    pub fn start<B, T>(
        worker_count: usize,
        job_capacity: usize,
        builder: Arc<T>,
        message_sender: FrontendMessageSender<B>,
    ) -> Self
    where
        B: Send + 'static,
        T: TileBuilder<B>,
    {
        assert!(worker_count > 0, "read worker count must be greater than zero");
        assert!(job_capacity > 0, "read job capacity must be greater than zero");

        let (job_sender, job_receiver) = bounded(job_capacity);
        let workers = (0..worker_count)
            .map(|index| {
                let jobs = job_receiver.clone();
                let builder = Arc::clone(&builder);
                let sender = message_sender.clone();
                std::thread::Builder::new()
                    .name(format!("read_worker_{index}"))
                    .spawn(move || worker_loop(index, builder.as_ref(), &sender, jobs))
                    .expect("spawn read worker thread")
            })
            .collect();

        Self {
            job_sender: Some(job_sender),
            workers,
        }
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    pub(crate) fn submit(&self, job: ReadJob) -> Result<(), ChannelError> {
        let Some(job_sender) = &self.job_sender else {
            return Err(ChannelError::Disconnected);
        };
        job_sender
            .send(job)
            .map_err(|_| ChannelError::Disconnected)
    }

    /// Closes the job queue and joins every worker. Queued jobs still run, so
    /// callers cancel them first.
    pub fn shutdown(&mut self) {
        self.job_sender.take();
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                log::error!("read worker: thread panicked");
            }
        }
    }
}

impl Drop for ReadWorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop<B, T>(
    index: usize,
    builder: &T,
    sender: &FrontendMessageSender<B>,
    jobs: Receiver<ReadJob>,
) where
    T: TileBuilder<B>,
{
    for job in jobs.iter() {
        if let Err(err) = run_job(builder, sender, &job) {
            log::error!("read worker {index}: {err}, stopping");
            break;
        }
    }
    log::debug!("read worker {index}: job queue closed");
}

/// Runs one build: start, flushes, end. A job cancelled before it starts
/// sends nothing.
pub(crate) fn run_job<B, T>(
    builder: &T,
    sender: &FrontendMessageSender<B>,
    job: &ReadJob,
) -> Result<JobOutcome, ChannelError>
where
    T: TileBuilder<B>,
{
    let build = job.request.build;
    if job.cancel.is_cancelled() {
        log::trace!(
            "read worker: skipping cancelled {:?} generation {}",
            build.key,
            build.generation.0
        );
        return Ok(JobOutcome::Skipped);
    }

    sender.send(TileReadStartMessage::new(build.key, build.generation))?;
    let mut output = BuildOutput::new(sender, build, &job.cancel);
    let result = builder.build(&job.request, &mut output);
    let flushed = output.flushed();
    let outcome = match result {
        Ok(()) => JobOutcome::Completed { flushed },
        Err(TileBuildError::Cancelled) => {
            log::debug!(
                "read worker: {:?} generation {} cancelled after {} flushes",
                build.key,
                build.generation.0,
                flushed
            );
            JobOutcome::Cancelled { flushed }
        }
        Err(TileBuildError::Channel(err)) => return Err(err),
        Err(err) => {
            log::warn!(
                "read worker: build of {:?} generation {} failed: {}",
                build.key,
                build.generation.0,
                err
            );
            JobOutcome::Failed { flushed }
        }
    };
    sender.send(TileReadEndMessage::new(build.key, build.generation))?;
    Ok(outcome)
}
