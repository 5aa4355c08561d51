pub mod enroll_identity_use_case;
pub mod frame_aggregator;
pub mod verification_logger;
pub mod verify_identity_use_case;
