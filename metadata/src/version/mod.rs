//! Version specific metadata layouts. Each version decodes positionally from
//! the SCALE blob and is then converted into the unified [`Metadata`](crate::Metadata).

pub mod v12;
pub mod v13;
pub mod v14;
