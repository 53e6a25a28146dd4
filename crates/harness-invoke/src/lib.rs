//! `SafeInvoker` (C1) and the independent source validator set (C2).

pub mod safe_invoker;
pub mod validator;

pub use safe_invoker::{ChildGuard, ExternalTool, PreparedCommand, SafeInvoker};
pub use validator::{default_validators, Validator};
