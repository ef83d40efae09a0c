mod performances;
mod users;
mod utils;

pub use utils::{test_db, test_utils};
