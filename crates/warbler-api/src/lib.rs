pub mod accounts;
pub mod auth;
pub mod credentials;
pub mod error;
pub mod graph;
pub mod messages;
pub mod middleware;
pub mod policy;
pub mod posts;
pub mod routes;
pub mod users;

pub use auth::{AppState, AppStateInner};
pub use error::ApiError;
pub use policy::Identity;
pub use routes::router;
