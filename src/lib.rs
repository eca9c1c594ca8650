pub mod cli;
pub mod collect;
pub mod config;
pub mod layout;
pub mod ssh;

#[cfg(test)]
pub(crate) mod testing;
