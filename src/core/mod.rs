pub mod clock;
pub mod reminder;
pub mod score;
pub mod task;
