pub mod fit;
pub mod simulation;
