//! Request handlers.

pub mod health;
pub mod preview;
pub mod session;
pub mod strokes;
pub mod upload;

pub use health::*;
pub use preview::*;
pub use session::*;
pub use strokes::*;
pub use upload::*;
