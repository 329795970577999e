//! Crate-level test harness and behavioural scenarios.

pub(crate) mod support;
