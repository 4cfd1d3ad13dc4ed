//! Leaf services of the batch-analysis workflow
//!
//! Pure decisions (column validation, balance guard) and collaborator
//! clients (validate, submit, billing, result endpoints) plus the bounded
//! result poller. Every service returns typed values; the orchestrator
//! owns all state transitions.

pub mod balance_guard;
pub mod billing_client;
pub mod column_validator;
pub mod result_poller;
pub mod submission_client;
pub mod validation_client;

pub use balance_guard::{check_affordability, AffordabilityCheck};
pub use billing_client::{BillingClient, FetchBalance};
pub use column_validator::{ColumnReport, ColumnValidator};
pub use result_poller::{FetchResult, PollResponse, ResultClient, ResultPoller};
pub use submission_client::{SubmissionClient, SubmitAnalysis};
pub use validation_client::{ValidateFile, ValidationClient};
