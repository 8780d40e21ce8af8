pub mod error;
pub mod logging;
pub mod machine;
pub mod simulation;
