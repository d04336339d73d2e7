pub mod season;
