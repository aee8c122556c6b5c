// src/services/mod.rs

pub mod normalizer;
pub mod trivia;
