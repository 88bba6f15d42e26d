pub(crate) mod auth;
pub(crate) mod error;
pub(crate) mod identity;
pub(crate) mod location;
pub(crate) mod locks;
pub(crate) mod shaping;
pub(crate) mod workflow;
