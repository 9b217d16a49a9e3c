pub mod extraction;
pub mod job;
pub mod review;
pub mod stamp;
