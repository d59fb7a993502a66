//! Background loops.

pub mod online_alternatives_loop;
