// src/sessions/mod.rs

// Sessions chain the tuning systems for one concrete mooring setup.

pub mod mooring;
pub use mooring::*;
