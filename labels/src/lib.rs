// SPDX-License-Identifier: CC0-1.0

//! Address-label and background-job persistence. One relational store;
//! `address_labels` and `analysis_jobs` are the two tables in the core
//! contract, accessed through a transactional [`Store`].

pub mod model;
pub mod store;

pub use model::{AddressLabel, AnalysisJob, JobStatus, LabelCategory};
pub use store::{Store, StoreError};
