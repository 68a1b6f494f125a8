pub mod lockfile;
pub mod persistence;
pub mod spawn;
pub mod umask;
