#![cfg_attr(not(feature = "std"), no_std)]

pub mod ecosystem;
pub mod operations;
pub mod selectors;

pub use ecosystem::*;
pub use operations::*;
pub use selectors::Selector;
