pub mod db;
pub mod tiers;
pub mod types;
