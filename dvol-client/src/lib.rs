//! Client side of the dvol control service.
//!
//! [`ClusterClient`] is the capability set every caller programs against.
//! [`HttpClient`] talks to a running control service, [`FakeClient`] keeps
//! everything in memory and only converges when asked to, and
//! [`FastConvergingClient`] wraps a simulator so that every mutation is
//! immediately reflected in the observed state.

pub mod client;
pub mod error;
pub mod fake;
pub mod fast;
pub mod http;
pub mod wait;

pub use client::{ClusterClient, CreateDatasetRequest, SynchronizableClient, Versioned};
pub use error::{ClientError, Result};
pub use fake::FakeClient;
pub use fast::FastConvergingClient;
pub use http::HttpClient;
pub use wait::{wait_for, wait_for_dataset_state};
