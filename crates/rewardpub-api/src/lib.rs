mod server;
mod handlers;
mod state;

pub use server::create_app;
pub use state::AppState;
