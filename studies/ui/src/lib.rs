use std::sync::{ mpsc::Receiver, Arc, Mutex };
use std::thread;

use color_eyre::Result;
use editor::Editor;
use state::TrainingState;
use ui::{ App, AppState };

pub mod ui;
pub mod state;
pub mod editor;

/// Spawns the editor thread feeding `rx` into a fresh shared state and runs the
/// dashboard on the calling thread until the user quits.
pub fn run_dashboard(rx: Receiver<TrainingState>) -> Result<()> {
    let state = Arc::new(Mutex::new(TrainingState::default()));
    let editor = Editor { rx, state: Arc::clone(&state) };

    thread::spawn(move || {
        editor.listen_and_update();
    });

    let terminal = ratatui::init();
    let app = App {
        state: AppState::default(),
        training: Arc::clone(&state),
        scroll_position: 0,
    };
    let app_result = app.run(terminal);
    ratatui::restore();
    app_result
}
