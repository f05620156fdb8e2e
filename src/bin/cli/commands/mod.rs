pub mod batch;
pub mod checkin;
pub mod clear_all;
pub mod explain;
pub mod image;
pub mod learn_batch;
pub mod review;
