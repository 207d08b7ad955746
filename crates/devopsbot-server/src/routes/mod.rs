pub mod automation;
pub mod health;
pub mod review;
