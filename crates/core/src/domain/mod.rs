pub mod kpis;
pub mod peers;
pub mod report;
pub mod request;
pub mod table;
pub mod weights;
