//! Core types and trait definitions for the evacuee-support case store.
//!
//! This crate is deliberately free of HTTP and database dependencies. It holds
//! the domain records, the validation and status policies that every backend
//! must honour, the [`store::CaseStore`] trait, and the tagged command/query
//! unions dispatched through it.

pub mod command;
pub mod error;
pub mod file;
pub mod query;
pub mod reference;
pub mod store;
pub mod support;

pub use error::{Error, ErrorKind, Result, StoreError};
