pub mod access;

pub use access::SessionAccess;
