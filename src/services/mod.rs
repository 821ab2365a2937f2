//! Background services that act on the auth store without user input.

pub mod poller;
