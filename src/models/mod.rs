pub mod pagination;
pub mod request_log;
pub mod user;

pub use pagination::*;
pub use request_log::*;
pub use user::*;
