//! Data models for the circulation domain

pub mod book;
pub mod category;
pub mod entity;
pub mod enums;
pub mod loan;
pub mod member;

// Re-export commonly used types
pub use book::{Book, BookQuery};
pub use category::Category;
pub use entity::EntityMeta;
pub use enums::{BookStatus, LoanStatus, MemberStatus};
pub use loan::{Loan, LoanDetails, LoanPolicy};
pub use member::{Member, MemberQuery};
