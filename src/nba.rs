pub mod analysis;
pub mod batch;
pub mod db;
pub mod endpoints;
pub mod http;
pub mod params;
pub mod reference;
pub mod report;
pub mod season;
pub mod sportradar;
pub mod teams;
