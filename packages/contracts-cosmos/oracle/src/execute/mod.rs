//! Execute handlers for the prophecy oracle.
//!
//! - `claim` - SubmitClaim and ExpireProphecies
//! - `admin` - validator rotation, token registry, config and prophecy review

mod admin;
mod claim;

pub use admin::*;
pub use claim::*;
