// gamehub-common: shared types and wire messages for the gamehub workspace

pub mod protocol;
pub mod types;
