mod clock;

pub use clock::{EpochClock, WEEK};

#[cfg(test)]
mod tests;
