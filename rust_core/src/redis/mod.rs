//! Redis transport shared by the ranking cache and the job queue.

pub mod bus;

pub use bus::RedisBus;
