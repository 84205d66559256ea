pub mod capture_session;
pub mod manager;
pub mod reading_slot;
