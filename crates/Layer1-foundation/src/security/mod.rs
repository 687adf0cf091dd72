//! Security - callback message authentication

mod signature;

pub use signature::{SignatureScope, TaskSigner, SIGNATURE_HEADER};
