use std::future::Future;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::{Error, HardwareConfig, Instruction, Interface, Result};

/// Cloneable sender side of a [HardwareConnection].
#[derive(Debug, Clone)]
pub struct HardwareHandle {
    tx: mpsc::Sender<Instruction>,
}

impl HardwareHandle {
    /// Queue `instruction` without waiting. Dropped with an error log when
    /// the queue is full or the worker is gone.
    pub fn send_instruction(&self, instruction: Instruction) {
        match self.tx.try_send(instruction) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(instruction)) => {
                error!("hardware queue full, dropping {instruction:?}");
            }
            Err(mpsc::error::TrySendError::Closed(instruction)) => {
                error!("hardware worker stopped, dropping {instruction:?}");
            }
        }
    }
}

/// Owns the worker thread that executes queued instructions in order.
pub struct HardwareConnection {
    handle: HardwareHandle,
    cancel: CancellationToken,
    join_handle: Option<std::thread::JoinHandle<()>>,
    interface: &'static str,
}

impl HardwareConnection {
    /// Start a worker for the interface described by `cfg`.
    ///
    /// Blocks until the interface is open, so configuration errors such as
    /// a missing serial port are returned here.
    pub fn open(cfg: HardwareConfig, queue_len: usize) -> Result<Self> {
        Self::spawn(queue_len, move || async move { cfg.open_interface().await })
    }

    /// Start a worker around an already constructed interface.
    pub fn with_interface(interface: Box<dyn Interface>, queue_len: usize) -> Result<Self> {
        Self::spawn(queue_len, move || async move { Ok(interface) })
    }

    fn spawn<F, Fut>(queue_len: usize, make_interface: F) -> Result<Self>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<Box<dyn Interface>>>,
    {
        let (tx, rx) = mpsc::channel(queue_len.max(1));
        let cancel = CancellationToken::new();
        let (ready_tx, ready_rx) = std::sync::mpsc::sync_channel(1);

        let worker_cancel = cancel.clone();
        let join_handle = std::thread::Builder::new()
            .name("hardware-connection".to_string())
            .spawn(move || {
                let rt = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(rt) => rt,
                    Err(e) => {
                        let _ = ready_tx.send(Err(Error::Io(e)));
                        return;
                    }
                };
                rt.block_on(async move {
                    let interface = match make_interface().await {
                        Ok(interface) => {
                            let _ = ready_tx.send(Ok(interface.name()));
                            interface
                        }
                        Err(e) => {
                            let _ = ready_tx.send(Err(e));
                            return;
                        }
                    };
                    run_worker(interface, rx, worker_cancel).await;
                });
            })?;

        let opened = ready_rx.recv().map_err(|_| Error::WorkerGone);
        let interface = match opened.and_then(|r| r) {
            Ok(name) => name,
            Err(e) => {
                let _ = join_handle.join();
                return Err(e);
            }
        };
        info!("hardware interface {interface} opened");
        Ok(Self {
            handle: HardwareHandle { tx },
            cancel,
            join_handle: Some(join_handle),
            interface,
        })
    }

    pub fn handle(&self) -> HardwareHandle {
        self.handle.clone()
    }

    pub fn interface_name(&self) -> &'static str {
        self.interface
    }

    /// Run what is already queued, then stop the worker and wait for it.
    pub fn stop(&mut self) {
        let Some(join_handle) = self.join_handle.take() else {
            return;
        };
        self.cancel.cancel();
        if join_handle.join().is_err() {
            error!("hardware worker for {} panicked", self.interface);
        }
        info!("hardware interface {} closed", self.interface);
    }
}

impl Drop for HardwareConnection {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn run_worker(
    mut interface: Box<dyn Interface>,
    mut rx: mpsc::Receiver<Instruction>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            msg = rx.recv() => match msg {
                Some(instruction) => dispatch(interface.as_mut(), &instruction).await,
                None => break,
            },
        }
    }
    rx.close();
    while let Ok(instruction) = rx.try_recv() {
        dispatch(interface.as_mut(), &instruction).await;
    }
}

async fn dispatch(interface: &mut dyn Interface, instruction: &Instruction) {
    debug!("{}: {instruction:?}", interface.name());
    if let Err(e) = interface.send(instruction).await {
        error!("{} failed on {instruction:?}: {e}", interface.name());
    }
}
