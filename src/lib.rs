//! l4lb-status: status and safety layer for Kubernetes L4 load balancer controllers
//!
//! This crate publishes per-resource conditions on load-balanced Services,
//! mirrors owned cloud resources into a ServiceLoadBalancerStatus object,
//! detects unexpected finalizer removal, answers "which Services does this
//! change affect" queries, and can run every mutation in read-only mode.

pub mod cloud;
pub mod controller;
pub mod crd;
pub mod error;

pub use crate::error::{Error, Result};
