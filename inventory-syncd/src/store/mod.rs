pub mod db;
pub mod observed;
