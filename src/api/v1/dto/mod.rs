pub mod programming;
