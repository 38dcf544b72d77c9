pub mod net;
pub mod queue;
pub mod sim;

#[cfg(test)]
mod test;
