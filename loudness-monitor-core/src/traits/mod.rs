pub mod capture_provider;
pub mod monitor_delegate;
pub mod sample_stream;
