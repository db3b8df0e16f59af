use std::sync::mpsc::Receiver;
use crate::state::{ StateMutex, TrainingState };

pub struct Editor {
    pub rx: Receiver<TrainingState>,
    pub state: StateMutex,
}

impl Editor {
    /// Copies every received snapshot into the shared state until the sender is dropped.
    pub fn listen_and_update(&self) {
        while let Ok(received_state) = self.rx.recv() {
            match self.state.lock() {
                Ok(mut state) => {
                    *state = received_state;
                }
                Err(_) => {
                    tracing::warn!("dashboard state lock poisoned, dropping update");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{ mpsc, Arc, Mutex };

    #[test]
    fn keeps_last_snapshot_and_stops_on_close() {
        let (tx, rx) = mpsc::channel();
        let state = Arc::new(Mutex::new(TrainingState::default()));
        let editor = Editor { rx, state: Arc::clone(&state) };

        for epoch in 1..=3 {
            let mut snapshot = TrainingState::default();
            snapshot.progress.current_epoch = epoch;
            tx.send(snapshot).unwrap();
        }
        drop(tx);

        editor.listen_and_update();
        assert_eq!(state.lock().unwrap().progress.current_epoch, 3);
    }
}
