//! Declarative validation rules and the repository that holds them.

pub mod repository;
pub mod types;

pub use repository::RuleRepository;
pub use types::{Applicability, Priority, Rule, RuleCategory, RuleStatus, TermCategory};
