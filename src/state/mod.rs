//! Client-side state owned by the application shell.

pub mod auth;

#[cfg(test)]
pub(crate) mod test_helpers;
