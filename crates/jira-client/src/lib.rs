//! Jira REST API adapter.
//!
//! One [`JiraClient`] per tenant, built from that tenant's credential bundle.
//! Every call authenticates with a bearer token, is bounded by a 30 second
//! timeout, and reports failures as [`RemoteApiError`] with Jira's error body
//! condensed into a single readable message.

mod client;
mod error;
mod requests;

pub use client::{JiraClient, REQUEST_TIMEOUT};
pub use error::{ApiResult, RemoteApiError};
pub use requests::{is_issue_ref, AddCommentRequest, CreateIssueRequest};
