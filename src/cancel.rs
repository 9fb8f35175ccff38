use tokio::sync::watch;

/// Caller-held side of a cancellation pair.
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

/// Observed before every page or entry fetch; cheap to clone.
#[derive(Clone, Debug)]
pub struct CancelSignal {
    rx: watch::Receiver<bool>,
}

pub fn cancel_pair() -> (CancelHandle, CancelSignal) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle { tx }, CancelSignal { rx })
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn signal(&self) -> CancelSignal {
        CancelSignal {
            rx: self.tx.subscribe(),
        }
    }
}

impl CancelSignal {
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }
}

pub(crate) fn is_cancelled(signal: Option<&CancelSignal>) -> bool {
    signal.map(CancelSignal::is_cancelled).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use crate::cancel::cancel_pair;

    #[test]
    fn signal_follows_handle() {
        let (handle, signal) = cancel_pair();
        let late = handle.signal();
        assert!(!signal.is_cancelled());
        handle.cancel();
        assert!(signal.is_cancelled());
        assert!(late.is_cancelled());
        assert!(signal.clone().is_cancelled());
    }

    #[test]
    fn cancel_after_signals_dropped() {
        let (handle, signal) = cancel_pair();
        drop(signal);
        handle.cancel();
        assert!(handle.signal().is_cancelled());
    }
}
