pub mod dsar;
