//! # Ports Layer
//!
//! Trait definitions for the hexagonal architecture.
//! - **Inbound (Driving)**: API that external callers use
//! - **Outbound (Driven)**: Byte source and signature engine the core consumes

pub mod inbound;
pub mod outbound;
