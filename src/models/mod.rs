pub mod driver;
pub mod review;
pub mod submission;
pub mod user;

pub use driver::*;
pub use review::*;
pub use submission::*;
pub use user::*;
