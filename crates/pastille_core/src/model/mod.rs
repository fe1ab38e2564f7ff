//! Grading domain model: rubric, marks and overlay templates.
//!
//! # Responsibility
//! - Define canonical data structures used by the scoring and overlay engines.
//! - Keep validation rules next to the types they protect.
//!
//! # Invariants
//! - Rubric nodes are addressed by dot-path ids, marks by UUID.
//! - Marks never embed rubric nodes; they reference them by id.

pub mod mark;
pub mod overlay;
pub mod rubric;
