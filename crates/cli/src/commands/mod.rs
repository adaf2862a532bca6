pub mod interop;
pub mod sign;
pub mod status;
pub mod telemetry;
