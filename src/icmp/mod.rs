//! ICMP echo through the platform `ping` binary.
//!
//! Raw ICMP sockets need elevated privileges on most hosts, while the system
//! `ping` is setuid or capability-enabled almost everywhere. Each echo is one
//! `ping -c 1` child process; its reported round trip is parsed from stdout.

pub mod echo;

pub use echo::{echo, parse_reply_seconds};
