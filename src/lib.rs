//! sonarscope - SonarQube portfolio snapshot collector
//!
//! Enumerates every project and branch on a server, collects metrics,
//! issues, hotspots and quality-gate history per branch, and assembles
//! one scored JSON snapshot for the dashboard renderer.

pub mod aggregate;
pub mod api;
pub mod cli;
pub mod collector;
pub mod config;
pub mod models;
pub mod pagination;
pub mod scoring;
pub mod snapshot;
