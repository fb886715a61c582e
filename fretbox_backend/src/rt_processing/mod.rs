pub mod callback;
pub mod performance;
