//! OpenStack Provider Bindings
//!
//! `KeystoneManager` authenticates and hands out `NeutronSession`s; sessions
//! talk to the Neutron subnet API directly over reqwest.

pub mod keystone;
pub mod neutron;

pub use keystone::KeystoneManager;
pub use neutron::NeutronSession;
