//! HTTP route handlers.
//!
//! [`external`] serves the OpenAI-compatible surface; [`auth`], [`keys`],
//! and [`admin`] make up the `/internal` administration surface.

pub mod admin;
pub mod auth;
pub mod external;
pub mod keys;
