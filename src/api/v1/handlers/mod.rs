pub mod health;
pub mod programming;
