//! Domain types of the cohort saga and the port to the payment provider.

pub mod card;
pub mod customer;
pub mod order;
pub mod policy;
pub mod ports;
