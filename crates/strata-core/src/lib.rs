//! # Strata Core
//!
//! Core runtime library shared by the Strata simulation crates.
//!
//! This crate provides the foundational pieces every system builds on:
//! - **ECS**: hecs-backed entity storage plus the shared transform components
//! - **Math**: Bounding boxes and rays over glam vectors
//! - **Time**: Delta time wrappers and a fixed-step accumulator

pub mod ecs;
pub mod math;
pub mod time;

pub use ecs::{Entity, Position, Velocity, World};
pub use math::{Aabb, Ray};
pub use time::{DeltaTime, FixedTimeStep, StepAccumulator};
