pub mod dispatch;
pub mod estimate;
