//! Frame context: where the host page lives.

pub mod parent;

pub use parent::ParentLocator;
