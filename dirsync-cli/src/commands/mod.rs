pub mod checksum;
pub mod sync;
pub mod watch;
