#![allow(clippy::collapsible_if, clippy::manual_range_contains)]

/// Use mimalloc as the global allocator.
/// Faster than glibc malloc for the small scratch reallocations the
/// relocation engine performs, with better thread-local caching.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

pub mod common;
pub mod sort;
