//! Reusable test utilities:
//! - An in-memory cloud recording every remote call
//! - Mock AWS JSON endpoints for the SDK-backed collaborators
//! - Configuration and materializer builders

#![allow(dead_code)]
#![allow(unused_imports)]

pub mod fake_cloud;
pub mod mock_aws;

pub use fake_cloud::{Call, FakeCloud};
pub use mock_aws::{MockAwsServer, RuleXml};
pub use test_config::{fast_settle, TestConfigBuilder};
