pub mod calendar;
pub mod schedule;
pub mod types;
pub mod vacancy;

pub use calendar::*;
pub use schedule::*;
pub use types::*;
pub use vacancy::*;
