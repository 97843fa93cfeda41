//! Module for application state owned outside the session.
//!
//! These stores hold role-dependent selections that the authentication flow
//! resets when a session ends.

pub mod scoped_state;

pub use scoped_state::{
    branch_list, business_context, Branch, BranchList, BusinessContext, BusinessSelection,
    RoleScopedStore, ScopedState,
};
