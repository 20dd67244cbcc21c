use super::SyncFeeder;
use crate::{blob::BlobSet, common::*};

/// The life cycle of the producer thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeederState {
    Stopped,
    Running,
    Stopping,
}

/// Builds minibatches on a separate thread and hands them over through a
/// bounded channel.
///
/// The producer thread owns its sampler, builder random state and a shared
/// reference to the immutable example store. Dropping the feeder stops the
/// thread and waits for it to exit.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct PrefetchFeeder {
    state: FeederState,
    capacity: usize,
    #[derivative(Debug = "ignore")]
    rx: Option<flume::Receiver<Result<BlobSet>>>,
    stop: Arc<AtomicBool>,
    worker: Option<thread::JoinHandle<()>>,
}

impl PrefetchFeeder {
    /// Moves the feeder onto a new producer thread and starts prefetching.
    pub fn start(feeder: SyncFeeder, capacity: NonZeroUsize) -> Result<Self> {
        let capacity = capacity.get();
        let (tx, rx) = flume::bounded(capacity);
        let stop = Arc::new(AtomicBool::new(false));

        let worker = {
            let stop = stop.clone();
            thread::Builder::new()
                .name("blob-fetcher".to_string())
                .spawn(move || blob_fetcher(feeder, tx, stop))
                .context("failed to spawn the blob fetcher thread")?
        };
        info!("blob fetcher started with capacity {}", capacity);

        Ok(Self {
            state: FeederState::Running,
            capacity,
            rx: Some(rx),
            stop,
            worker: Some(worker),
        })
    }

    /// Takes the next minibatch, blocking until the producer delivers one.
    ///
    /// A failure of the producer is returned here, after which the feeder
    /// is stopped.
    pub fn next_minibatch(&mut self) -> Result<BlobSet> {
        let received = {
            let rx = self.receiver()?;
            rx.recv()
        };
        self.take_received(received.map_err(|flume::RecvError::Disconnected| ()))
    }

    /// Like [PrefetchFeeder::next_minibatch], but gives up after `timeout`
    /// and returns `None`.
    pub fn next_minibatch_timeout(&mut self, timeout: Duration) -> Result<Option<BlobSet>> {
        let received = {
            let rx = self.receiver()?;
            rx.recv_timeout(timeout)
        };
        match received {
            Err(flume::RecvTimeoutError::Timeout) => Ok(None),
            Ok(result) => self.take_received(Ok(result)).map(Some),
            Err(flume::RecvTimeoutError::Disconnected) => self.take_received(Err(())).map(Some),
        }
    }

    fn receiver(&self) -> Result<&flume::Receiver<Result<BlobSet>>> {
        self.rx
            .as_ref()
            .ok_or_else(|| format_err!("the prefetch feeder is stopped"))
    }

    fn take_received(&mut self, received: Result<Result<BlobSet>, ()>) -> Result<BlobSet> {
        let result = match received {
            Ok(Ok(blobs)) => return Ok(blobs),
            Ok(Err(err)) => Err(err.context("the blob fetcher failed to build a minibatch")),
            Err(()) => Err(format_err!("the blob fetcher terminated unexpectedly")),
        };
        self.shutdown();
        result
    }

    /// Signals the producer to stop, disconnects the channel and joins the
    /// thread. Calling it again has no effect.
    pub fn shutdown(&mut self) {
        if self.state == FeederState::Stopped {
            return;
        }
        self.state = FeederState::Stopping;
        info!("terminating blob fetcher");

        self.stop.store(true, Ordering::SeqCst);
        // a producer blocked on a full channel wakes up on disconnection
        drop(self.rx.take());

        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                error!("the blob fetcher panicked");
            }
        }
        self.state = FeederState::Stopped;
    }

    pub fn state(&self) -> FeederState {
        self.state
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Whether the producer thread is still alive.
    pub fn is_running(&self) -> bool {
        self.worker
            .as_ref()
            .map(|worker| !worker.is_finished())
            .unwrap_or(false)
    }

    /// The number of minibatches waiting in the channel.
    pub fn num_pending(&self) -> usize {
        self.rx.as_ref().map(|rx| rx.len()).unwrap_or(0)
    }
}

impl Drop for PrefetchFeeder {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// The producer loop. It runs until stopped, until the consumer goes away,
/// or right after delivering a failure.
fn blob_fetcher(
    mut feeder: SyncFeeder,
    tx: flume::Sender<Result<BlobSet>>,
    stop: Arc<AtomicBool>,
) {
    debug!("blob fetcher running");

    while !stop.load(Ordering::SeqCst) {
        let result = feeder.next_minibatch();
        let failed = result.is_err();

        if tx.send(result).is_err() {
            break;
        }
        if failed {
            break;
        }
    }

    debug!("blob fetcher exited");
}
