mod performances;
mod recordings;
mod sessions;
mod segments;
mod tunes;
mod users;

pub use performances::*;
pub use recordings::*;
pub use segments::*;
pub use sessions::*;
pub use tunes::*;
pub use users::*;
