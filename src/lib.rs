pub mod handle;
pub mod job;
pub mod monitor;
pub mod platform;
pub mod policy;
pub mod power;
pub mod protocol;
pub mod sim;
pub mod workload;

#[cfg(test)]
mod test;
