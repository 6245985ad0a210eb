//! Turns schema-valid [`BasicFinding`]s into identity-bearing [`Finding`]s.
//!
//! Ids come from random v4 UUIDs, which are safe to draw from any thread and
//! collision-resistant across process lifetimes. Colours are random hex and
//! purely cosmetic; repeats are fine.

use rand::Rng;
use uuid::Uuid;

use crate::schema::{BasicFinding, Finding, FindingId};

/// Issue a fresh, never-before-seen finding id.
pub fn next_id() -> FindingId {
    FindingId::from(Uuid::new_v4().to_string())
}

/// A random display colour as `#rrggbb`.
pub fn next_color() -> String {
    let rgb: u32 = rand::thread_rng().gen_range(0..=0x00FF_FFFF);
    format!("#{rgb:06x}")
}

/// Assign a fresh id and colour to each finding, preserving input order.
pub fn normalize(basics: &[BasicFinding]) -> Vec<Finding> {
    basics
        .iter()
        .map(|b| Finding::from_basic(b.clone(), next_id(), next_color()))
        .collect()
}
