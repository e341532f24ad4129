//! Testing utilities for webhook receivers
//!
//! Build deliveries with [`Scenario`], sign them the way a provider would
//! and assert on the response without starting a server.

mod scenario;

pub use scenario::{Scenario, ScenarioAssert, get, post, sign};
