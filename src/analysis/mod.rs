//! Structural analysis of the indicator parameter graph.
pub mod topology;
