pub mod types;
pub mod settings;
pub mod terminal;
pub mod layout;
pub mod commands;
pub mod config;
pub mod shell;
pub mod line_editor;
pub mod input;
pub mod pane;
pub mod window_ops;
pub mod copy_mode;
pub mod reducer;
pub mod scenario;
pub mod help;
pub mod grading;
pub mod probe;
pub mod replay;

pub use grading::{evaluate, simulator_snapshot, EvaluationResult, Mission, Status};
pub use input::{resolve_simulator_input, resolve_simulator_input_at};
pub use reducer::{reduce, reduce_all};
pub use scenario::initial_state;
pub use settings::SimulatorSettings;
pub use types::{Action, SimulatorState};
