mod app;
mod state;

pub use app::{create_app, cors_layer};
pub use state::AppState;
