//! `adminconsole-core`: the backend wire contract.
//!
//! This crate contains **pure** types shared by every other crate: the response
//! envelope, paging DTOs and identifier newtypes. No IO lives here.

pub mod envelope;
pub mod error;
pub mod id;

pub use envelope::{ApiResponse, BatchDeleteRequest, PageRequest, PagedResult};
pub use error::{CoreError, CoreResult};
pub use id::{PermissionId, UserId};
