pub mod chat;
pub mod doctor;
pub mod migrate;
pub mod serve;
