pub mod evaluate;
pub mod quote;
pub mod watch;
