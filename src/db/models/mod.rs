#![allow(unused_imports)]

//! Database models split into separate files.
//! This module re-exports individual model modules so imports like
//! `use crate::db::models::*;` work across the crate.

pub mod appointment;
pub mod notification;

pub use self::appointment::*;
pub use self::notification::*;
