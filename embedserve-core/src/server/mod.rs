//! Request pipeline: handler model and mount router

mod handlers;
mod router;

pub use self::handlers::{Body, Handler, HandlerResponse, Outcome, Request, RespondHandler};
pub use self::router::{Mount, Router};
