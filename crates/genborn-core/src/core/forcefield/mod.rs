pub mod log_table;
pub mod params;
pub mod potentials;
pub mod table;
pub mod term;
