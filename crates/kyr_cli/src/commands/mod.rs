pub(crate) mod migrate;
pub(crate) mod pull;
pub(crate) mod show;
